use thiserror::Error;

/// Result type for the clustering and similarity engine
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the table, preprocessing, clustering, search and
/// evaluation layers. None of them are retriable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A feature required for computation is absent from a table
    #[error("Feature not found: {0}")]
    MissingFeature(String),

    /// Wrong shape or type, or an empty dataset where rows are required
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Query features do not line up with what the model was trained on
    #[error("Model mismatch: {0}")]
    ModelMismatch(String),
}

impl EngineError {
    pub fn missing(feature: impl Into<String>) -> Self {
        Self::MissingFeature(feature.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
