//! Error types for the riverbank adaptation pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, AdaptError>;

/// Main error type shared by training, persistence and inference
#[derive(Error, Debug)]
pub enum AdaptError {
    /// The training dataset could not be read or parsed. Fatal for a training run.
    #[error("Dataset load error: {0}")]
    DatasetLoad(String),

    /// A record or dataset does not carry exactly the registered feature set.
    #[error("Schema mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// A categorical value that was not observed when the encoders were fitted.
    #[error("Unknown category for {column}: {value:?}")]
    UnknownCategory { column: String, value: String },

    /// Training data carries a value outside the declared domain of a column.
    #[error("Category {value:?} is not declared for {column}")]
    UndeclaredCategory { column: String, value: String },

    /// A value has the wrong kind or lies outside the feature's bounds.
    #[error("Invalid value for {column}: {reason}")]
    InvalidFeatureValue { column: String, reason: String },

    #[error("Invalid target label: {0:?}")]
    InvalidTargetLabel(String),

    /// A class code outside the target encoder's range. Indicates corrupt artifacts.
    #[error("Invalid target code {code} (encoder has {n_classes} classes)")]
    InvalidTargetCode { code: usize, n_classes: usize },

    /// The persisted artifact bundle is missing, corrupt or inconsistent.
    #[error("Artifact load error: {0}")]
    ArtifactLoad(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AdaptError {
    /// Short machine-readable name used in structured error responses
    pub fn kind(&self) -> &'static str {
        match self {
            AdaptError::DatasetLoad(_) => "dataset_load",
            AdaptError::SchemaMismatch { .. } => "schema_mismatch",
            AdaptError::UnknownCategory { .. } => "unknown_category",
            AdaptError::UndeclaredCategory { .. } => "undeclared_category",
            AdaptError::InvalidFeatureValue { .. } => "invalid_feature_value",
            AdaptError::InvalidTargetLabel(_) => "invalid_target_label",
            AdaptError::InvalidTargetCode { .. } => "invalid_target_code",
            AdaptError::ArtifactLoad(_) => "artifact_load",
            AdaptError::Training(_) => "training",
            AdaptError::ShapeError { .. } => "shape",
            AdaptError::ModelNotFitted => "model_not_fitted",
            AdaptError::Io(_) => "io",
            AdaptError::Serialization(_) => "serialization",
        }
    }

    /// Whether the error was caused by the caller's input rather than server state
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AdaptError::SchemaMismatch { .. }
                | AdaptError::UnknownCategory { .. }
                | AdaptError::InvalidFeatureValue { .. }
        )
    }
}

impl From<polars::error::PolarsError> for AdaptError {
    fn from(err: polars::error::PolarsError) -> Self {
        AdaptError::DatasetLoad(err.to_string())
    }
}

impl From<serde_json::Error> for AdaptError {
    fn from(err: serde_json::Error) -> Self {
        AdaptError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AdaptError {
    fn from(err: ndarray::ShapeError) -> Self {
        AdaptError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AdaptError::UnknownCategory {
            column: "Gender".to_string(),
            value: "Other".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown category for Gender: \"Other\"");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AdaptError = io_err.into();
        assert!(matches!(err, AdaptError::Io(_)));
    }

    #[test]
    fn test_client_errors() {
        let err = AdaptError::SchemaMismatch {
            missing: vec!["Age".to_string()],
            unexpected: vec![],
        };
        assert!(err.is_client_error());
        assert_eq!(err.kind(), "schema_mismatch");
        assert!(!AdaptError::ModelNotFitted.is_client_error());
    }
}
