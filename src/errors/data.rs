//! Dataset and configuration loading errors

use thiserror::Error;

/// Errors raised at the data ingestion boundary
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required CSV column is absent from the header row
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A row carried a value that could not be parsed
    #[error("Invalid value in row {row}: {reason}")]
    InvalidValue {
        /// One-based data row number
        row: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Configuration is well-formed but contradictory
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_message() {
        let err = DataLoadError::InvalidValue {
            row: 3,
            reason: "total_cnt is not a number".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value in row 3: total_cnt is not a number"
        );
    }

    #[test]
    fn test_from_io() {
        let err: DataLoadError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, DataLoadError::Io(_)));
    }
}
