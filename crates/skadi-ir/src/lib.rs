//! Skadi Pulse-Level Intermediate Representation
//!
//! This crate provides the data structures exchanged by the Skadi instruction
//! builder: the device graph describing qubits and their control channels, and
//! the pulse-level instructions that target those channels.
//!
//! # Core Components
//!
//! - **Devices**: [`DeviceGraph`] owns [`Qubit`]s, resonators, physical lines and
//!   [`PulseChannel`]s, addressed by [`QubitId`] and [`ChannelId`]. The graph's
//!   edges are the `related_devices` relation used to route from a channel back
//!   to the qubits it touches.
//! - **Instructions**: [`Instruction`] is a closed enum of quantum variants
//!   (pulses, acquisitions, barriers, phase operations, post-processing) and
//!   classical variants (labels, jumps, assignments, sweeps). [`InstructionKind`]
//!   is its tag.
//!
//! # Example: Wiring a Qubit
//!
//! ```rust
//! use skadi_ir::{Baseband, ChannelType, DeviceGraph, QubitCalibration};
//!
//! let mut devices = DeviceGraph::new();
//! let band = Baseband { frequency: 5.5e9, if_frequency: 250e6 };
//! let drive_line = devices.add_physical_channel("CH1", 0.5e-9, band);
//! let readout_line = devices.add_physical_channel("CH2", 0.5e-9, band);
//! let resonator = devices.add_resonator(readout_line, 8.5e9, false).unwrap();
//! let q0 = devices
//!     .add_qubit(0, drive_line, resonator, QubitCalibration::default())
//!     .unwrap();
//! devices.add_pulse_channel(q0, ChannelType::Drive, 5.0e9, &[]).unwrap();
//!
//! // acquire, measure and drive
//! assert_eq!(devices.qubit_channels(q0).unwrap().len(), 3);
//! ```

pub mod device;
pub mod error;
pub mod instruction;

pub use device::{
    AcquireSettings, Baseband, ChannelId, ChannelType, ComponentRef, DeviceGraph,
    MeasurePulseSettings, PhysicalChannel, PhysicalChannelId, PulseChannel, Qubit,
    QubitCalibration, QubitId, Resonator, ResonatorId,
};
pub use error::{IrError, IrResult};
pub use instruction::{
    Acquire, AcquireMode, ChannelSet, InlineResultsProcessing, Instruction, InstructionKind,
    PhaseReset, PostProcessType, PostProcessing, ProcessAxis, Pulse, PulseShape, Synchronize,
};
