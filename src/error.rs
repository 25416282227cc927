//! Error types for the learning engine

use thiserror::Error;

/// Errors produced by the engine and its components
#[derive(Error, Debug)]
pub enum EngineError {
    /// The example is malformed or incomplete. Recoverable: skip the example.
    #[error("Schema error on field '{field}': {reason}")]
    Schema { field: String, reason: String },

    /// Codec and model disagree on the feature vector shape.
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A snapshot was written by a newer format than this build understands.
    #[error("Incompatible snapshot version {found} (supported up to {supported})")]
    IncompatibleVersion { found: u32, supported: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A snapshot or checkpoint blob could not be decoded.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Ingestion queue closed")]
    IngestClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Shorthand for a schema violation on `field`
    pub fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Schema {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the stream can continue after this error.
    ///
    /// Only schema errors are isolated to a single example; everything else
    /// points at a configuration or environment problem.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::Schema { .. })
    }
}

impl From<bincode::Error> for EngineError {
    fn from(err: bincode::Error) -> Self {
        EngineError::Checkpoint(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::InvalidConfig(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
