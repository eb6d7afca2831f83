//! Error types for the HAL crate.

use thiserror::Error;

/// Errors that can occur in hardware model operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HalError {
    /// Error from the IR crate (unknown qubit, missing channel, ...).
    #[error("IR error: {0}")]
    Ir(#[from] skadi_ir::IrError),

    /// No calibration exists for the requested gate.
    #[error("No calibration for {gate} on qubit {qubit}")]
    MissingCalibration {
        /// Gate name.
        gate: String,
        /// Qubit index.
        qubit: u32,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unsupported feature.
    #[error("Unsupported feature: {0}")]
    Unsupported(String),
}

/// Result type for HAL operations.
pub type HalResult<T> = Result<T, HalError>;
