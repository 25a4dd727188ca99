//! Graph-related error types
//!
//! Raised while building a graph container or expanding its rows. Dangling
//! edges are tolerated by the graph builder and never surface here.

use thiserror::Error;

/// Graph-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The edge list contains a cycle
    #[error("Cycle detected in graph: {0}")]
    CycleDetected(String),

    /// A node reachable from a root carries no aggregated attributes
    #[error("Node '{0}' has no aggregated attributes")]
    MissingAttributes(String),

    /// Node not found by identifier
    #[error("Node '{0}' not found")]
    NodeNotFound(String),

    /// Invalid graph structure
    #[error("Invalid graph structure: {0}")]
    InvalidStructure(String),
}

impl GraphError {
    /// Structural errors mean the displayed hierarchy cannot be trusted.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            GraphError::CycleDetected(_)
                | GraphError::MissingAttributes(_)
                | GraphError::InvalidStructure(_)
        )
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::NodeNotFound(_))
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            GraphError::CycleDetected(_) => "CYCLE_DETECTED",
            GraphError::MissingAttributes(_) => "MISSING_ATTRIBUTES",
            GraphError::NodeNotFound(_) => "NOT_FOUND",
            GraphError::InvalidStructure(_) => "INVALID_STRUCTURE",
        }
    }
}
