//! Skadi Hardware Model Layer
//!
//! This crate defines what the instruction builder needs from a device: a
//! [`HardwareModel`] that owns the device graph and synthesises calibrated
//! pulse sequences for rotations and cross-resonance interactions.
//!
//! # Overview
//!
//! - [`HardwareModel`]: the contract (`gate_x/y/z/u/zx`, `resolve_target`)
//! - [`Target`]: a qubit or an explicit pulse channel
//! - [`CalibratedModel`]: reference implementation built from a [`ModelConfig`]
//! - [`ModelConfig`]: calibration snapshot, loadable from YAML or JSON
//!
//! # Example
//!
//! ```rust
//! use skadi_hal::{CalibratedModel, HardwareModel, ModelConfig};
//! use skadi_ir::QubitId;
//!
//! let model = CalibratedModel::from_config(&ModelConfig::linear(2)).unwrap();
//! let pulses = model.gate_x(QubitId(0), std::f64::consts::PI, None).unwrap();
//! assert_eq!(pulses.len(), 1);
//! ```

pub mod calibrated;
pub mod config;
pub mod error;
pub mod model;

pub use calibrated::CalibratedModel;
pub use config::{CALIBRATION_ENV, CouplingConfig, ModelConfig, PulseCalibration, QubitConfig};
pub use error::{HalError, HalResult};
pub use model::{HardwareModel, Target};
