//! Error types for the builder crate.

use thiserror::Error;

/// Errors that can occur while building an instruction sequence.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuilderError {
    /// The operation is not available on this builder tier.
    #[error("Operation '{operation}' is not available on this hardware model")]
    Unsupported {
        /// Name of the rejected operation.
        operation: String,
    },

    /// Malformed arguments.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error from the IR crate.
    #[error("IR error: {0}")]
    Ir(#[from] skadi_ir::IrError),

    /// Error from the hardware model.
    #[error("Hardware model error: {0}")]
    Hal(#[from] skadi_hal::HalError),

    /// Instruction (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BuilderError {
    /// Shorthand for [`BuilderError::Unsupported`].
    pub fn unsupported(operation: impl Into<String>) -> Self {
        BuilderError::Unsupported {
            operation: operation.into(),
        }
    }
}

/// Result type for builder operations.
pub type BuilderResult<T> = Result<T, BuilderError>;
