//! Domain-specific error types for concept-graph
//!
//! # Error Categories
//!
//! - **GraphError**: graph construction, aggregation and row expansion faults
//! - **OptionsError**: display options and action validation at the interaction boundary
//! - **DataLoadError**: dataset and configuration ingestion (JSON, CSV, YAML)
//!
//! Data inconsistencies (edges or category members naming unknown concepts,
//! stale ids in display options) are not errors anywhere in this crate. They
//! are logged and ignored.
//!
//! # Examples
//!
//! ```rust
//! use concept_graph::errors::GraphError;
//!
//! let err = GraphError::CycleDetected("1 -> 2 -> 1".to_string());
//! assert!(err.is_structural());
//! assert_eq!(err.error_code(), "CYCLE_DETECTED");
//! ```

pub mod data;
pub mod graph;
pub mod options;

pub use data::DataLoadError;
pub use graph::GraphError;
pub use options::OptionsError;

/// Result type alias for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type alias for display option operations
pub type OptionsResult<T> = Result<T, OptionsError>;

/// Result type alias for loading datasets and configuration
pub type DataLoadResult<T> = Result<T, DataLoadError>;
