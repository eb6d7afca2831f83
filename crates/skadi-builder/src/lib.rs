//! Skadi Instruction Builder
//!
//! This crate assembles pulse-level programs for a calibrated device. A
//! builder appends instructions in program order, tracks which qubits have
//! been coupled by earlier pulses, and keeps label names unique when builders
//! are nested or merged.
//!
//! # Overview
//!
//! - [`InstructionBuilder`]: the base tier; container, composition and
//!   classical control flow only
//! - [`QuantumInstructionBuilder`]: adds gates, measurements and direct pulse
//!   control on top of a [`HardwareModel`](skadi_hal::HardwareModel)
//! - [`BuilderBase`], [`GateOps`], [`MeasureOps`], [`PulseOps`]: the
//!   capability traits both tiers implement; operations a tier cannot
//!   perform return [`BuilderError::Unsupported`]
//! - [`EntanglementMap`]: qubits coupled by earlier pulses, shared between a
//!   builder and its children
//!
//! # Measurement blocks
//!
//! ```text
//! sync(entangled) → measure pulse → acquire → sync(qubit) → phase reset(entangled)
//! ```
//!
//! When a measurement directly follows a complete block, it is merged into
//! that block so consecutive readouts share one closing barrier and phase
//! reset.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use skadi_builder::prelude::*;
//! use skadi_builder::QuantumInstructionBuilder;
//! use skadi_hal::CalibratedModel;
//! use skadi_ir::QubitId;
//!
//! let model = Arc::new(CalibratedModel::linear(2).unwrap());
//! let mut builder = QuantumInstructionBuilder::new(model);
//!
//! builder
//!     .had(QubitId(0))
//!     .unwrap()
//!     .cnot(QubitId(0), QubitId(1))
//!     .unwrap();
//! let first = builder.measure_mean_z(QubitId(0), None, None).unwrap().acquire;
//! let second = builder.measure_mean_z(QubitId(1), None, None).unwrap().acquire;
//! builder.returns([first.output_variable, second.output_variable]);
//!
//! let json = builder.serialize().unwrap();
//! assert!(json.contains("measure_pulse"));
//! ```

pub mod builder;
pub mod capability;
pub mod entanglement;
pub mod error;
pub mod label;
pub mod measure;
pub mod quantum;

pub use builder::{BuilderBase, Component, InstructionBuilder};
pub use capability::{Acquired, Axis, Controls, GateOps, MeasureOps, PulseOps};
pub use entanglement::{EntanglementMap, SharedEntanglement};
pub use error::{BuilderError, BuilderResult};
pub use quantum::QuantumInstructionBuilder;

/// The builder traits, for glob import.
pub mod prelude {
    pub use crate::builder::BuilderBase;
    pub use crate::capability::{GateOps, MeasureOps, PulseOps};
}
