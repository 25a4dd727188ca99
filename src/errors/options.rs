//! Display option and action validation errors

use thiserror::Error;

/// Errors raised while translating user input into reducer actions
#[derive(Error, Debug)]
pub enum OptionsError {
    /// A node expand/collapse action named no node
    #[error("Node id cannot be empty")]
    EmptyNodeId,

    /// An option toggle named no category
    #[error("Category name cannot be empty")]
    EmptyCategory,

    /// Action payload could not be understood
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
