//! Error types for the IR crate.

use crate::device::{ChannelId, ChannelType, ComponentRef, QubitId};
use thiserror::Error;

/// Errors that can occur in IR operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// Qubit not registered in the device graph.
    #[error("Qubit {0} not found in device graph")]
    QubitNotFound(QubitId),

    /// Pulse channel not registered in the device graph.
    #[error("Pulse channel {0} not found in device graph")]
    ChannelNotFound(ChannelId),

    /// Component referenced but never added.
    #[error("Component {0:?} not found in device graph")]
    ComponentNotFound(ComponentRef),

    /// A qubit has no pulse channel of the requested type.
    #[error("Qubit {qubit} has no {channel_type} channel{}", format_coupling(.coupled))]
    MissingChannel {
        /// The qubit that was queried.
        qubit: QubitId,
        /// The requested channel type.
        channel_type: ChannelType,
        /// Auxiliary qubits the channel should couple to.
        coupled: Vec<QubitId>,
    },

    /// Pulse channel does not belong to any qubit.
    #[error("Pulse channel {0} is not owned by a qubit")]
    OrphanChannel(ChannelId),

    /// Processing axis name not recognised.
    #[error("Wrong measure axis '{0}'")]
    InvalidAxis(String),

    /// A variable name is already taken.
    #[error("Name '{0}' is already in use")]
    DuplicateName(String),

    /// The same qubit appears twice where distinct qubits are required.
    #[error("Duplicate qubit {0} in operation")]
    DuplicateQubit(QubitId),
}

/// Helper function to format optional coupling context.
fn format_coupling(coupled: &[QubitId]) -> String {
    if coupled.is_empty() {
        return String::new();
    }
    let names: Vec<_> = coupled.iter().map(ToString::to_string).collect();
    format!(" coupled to [{}]", names.join(", "))
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
