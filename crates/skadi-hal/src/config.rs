//! Calibration snapshot configuration.
//!
//! A [`ModelConfig`] describes a device: its qubits with their drive and
//! readout calibration, and the coupled pairs that get cross-resonance
//! channels. It can be loaded from:
//! 1. A YAML or JSON file (`.json` is parsed as JSON, anything else as YAML)
//! 2. The file named by the `SKADI_CALIBRATION` environment variable
//! 3. The built-in linear-chain defaults

use std::path::Path;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use skadi_ir::{Baseband, PulseShape, QubitCalibration};

use crate::error::{HalError, HalResult};

/// Environment variable naming a calibration file.
pub const CALIBRATION_ENV: &str = "SKADI_CALIBRATION";

/// Complete device calibration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Device name.
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Sample period of every physical line, in seconds.
    #[serde(default = "default_sample_time")]
    pub sample_time: f64,

    /// Qubit calibrations.
    pub qubits: Vec<QubitConfig>,

    /// Directed couplings (control → target) with cross-resonance calibration.
    #[serde(default)]
    pub couplings: Vec<CouplingConfig>,
}

/// Calibration of a single pulse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseCalibration {
    /// Envelope shape.
    pub shape: PulseShape,
    /// Width in seconds.
    pub width: f64,
    /// Amplitude.
    pub amp: f64,
    /// DRAG coefficient.
    #[serde(default)]
    pub drag: f64,
    /// Rise time for soft-edged shapes.
    #[serde(default)]
    pub rise: f64,
}

/// Calibration of one qubit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QubitConfig {
    /// Device index.
    pub index: u32,

    /// Drive frequency in Hz.
    pub drive_frequency: f64,

    /// Readout resonator frequency in Hz.
    pub measure_frequency: f64,

    /// Whether the readout intermediate frequency is fixed by the baseband.
    #[serde(default)]
    pub fixed_if: bool,

    /// Baseband oscillator shared by the qubit's lines.
    #[serde(default = "default_baseband")]
    pub baseband: Baseband,

    /// Calibrated π/2 rotation about X.
    pub x_pi_2: PulseCalibration,

    /// Readout calibration.
    #[serde(default)]
    pub readout: QubitCalibration,
}

/// Cross-resonance calibration of a control → target pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingConfig {
    /// Control qubit index.
    pub control: u32,

    /// Target qubit index.
    pub target: u32,

    /// Cross-resonance drive frequency (the target's frequency), in Hz.
    pub frequency: f64,

    /// Calibrated ZX(π/4) interaction pulse.
    pub zx_pi_4: PulseCalibration,

    /// Cancellation tone played alongside the interaction pulse.
    #[serde(default)]
    pub cancellation: Option<PulseCalibration>,
}

fn default_model_name() -> String {
    "skadi".to_string()
}

fn default_sample_time() -> f64 {
    0.5e-9
}

fn default_baseband() -> Baseband {
    Baseband {
        frequency: 5.5e9,
        if_frequency: 250e6,
    }
}

impl ModelConfig {
    /// Load configuration from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> HalResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| HalError::Configuration(format!("{}: {e}", path.display())))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config: ModelConfig = if is_json {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml_ng::from_str(&contents)
                .map_err(|e| HalError::Configuration(e.to_string()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml_str(contents: &str) -> HalResult<Self> {
        let config: ModelConfig =
            serde_yaml_ng::from_str(contents).map_err(|e| HalError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file named by `SKADI_CALIBRATION`, or fall back to a linear
    /// chain of `num_qubits` qubits.
    pub fn from_env_or_linear(num_qubits: u32) -> HalResult<Self> {
        match std::env::var(CALIBRATION_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) => Ok(Self::linear(num_qubits)),
        }
    }

    /// A chain of `num_qubits` qubits with couplings in both directions
    /// between neighbours.
    pub fn linear(num_qubits: u32) -> Self {
        let qubits = (0..num_qubits)
            .map(|i| QubitConfig {
                index: i,
                drive_frequency: 5.0e9 + 0.1e9 * f64::from(i),
                measure_frequency: 8.5e9 + 0.05e9 * f64::from(i),
                fixed_if: false,
                baseband: default_baseband(),
                x_pi_2: PulseCalibration {
                    shape: PulseShape::DragGaussian,
                    width: 100e-9,
                    amp: 0.25,
                    drag: 0.5,
                    rise: 0.0,
                },
                readout: QubitCalibration::default(),
            })
            .collect::<Vec<_>>();

        let mut couplings = vec![];
        for i in 1..num_qubits {
            for (control, target) in [(i - 1, i), (i, i - 1)] {
                couplings.push(CouplingConfig {
                    control,
                    target,
                    frequency: qubits[target as usize].drive_frequency,
                    zx_pi_4: PulseCalibration {
                        shape: PulseShape::SoftSquare,
                        width: 400e-9,
                        amp: 0.1,
                        drag: 0.0,
                        rise: 10e-9,
                    },
                    cancellation: Some(PulseCalibration {
                        shape: PulseShape::SoftSquare,
                        width: 400e-9,
                        amp: 0.02,
                        drag: 0.0,
                        rise: 10e-9,
                    }),
                });
            }
        }

        Self {
            name: format!("linear_{num_qubits}"),
            sample_time: default_sample_time(),
            qubits,
            couplings,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> HalResult<()> {
        if self.qubits.is_empty() {
            return Err(HalError::Configuration(
                "at least one qubit is required".into(),
            ));
        }
        if self.sample_time <= 0.0 {
            return Err(HalError::Configuration(
                "sample_time must be positive".into(),
            ));
        }

        let mut indices = FxHashSet::default();
        for qubit in &self.qubits {
            if !indices.insert(qubit.index) {
                return Err(HalError::Configuration(format!(
                    "duplicate qubit index {}",
                    qubit.index
                )));
            }
            if qubit.x_pi_2.width <= 0.0 {
                return Err(HalError::Configuration(format!(
                    "qubit {}: x_pi_2 width must be positive",
                    qubit.index
                )));
            }
        }

        let mut pairs = FxHashSet::default();
        for coupling in &self.couplings {
            if coupling.control == coupling.target {
                return Err(HalError::Configuration(format!(
                    "qubit {} cannot couple to itself",
                    coupling.control
                )));
            }
            for end in [coupling.control, coupling.target] {
                if !indices.contains(&end) {
                    return Err(HalError::Configuration(format!(
                        "coupling references unknown qubit {end}"
                    )));
                }
            }
            if !pairs.insert((coupling.control, coupling.target)) {
                return Err(HalError::Configuration(format!(
                    "duplicate coupling {} -> {}",
                    coupling.control, coupling.target
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_linear_config_is_valid() {
        let config = ModelConfig::linear(4);
        assert!(config.validate().is_ok());
        assert_eq!(config.qubits.len(), 4);
        assert_eq!(config.couplings.len(), 6);
    }

    #[test]
    fn test_yaml_parsing_with_defaults() {
        let yaml = r"
name: bench
qubits:
  - index: 0
    drive_frequency: 5.0e9
    measure_frequency: 8.5e9
    x_pi_2: { shape: gaussian, width: 1.0e-7, amp: 0.3 }
  - index: 1
    drive_frequency: 5.1e9
    measure_frequency: 8.6e9
    x_pi_2: { shape: gaussian, width: 1.0e-7, amp: 0.3 }
couplings:
  - control: 0
    target: 1
    frequency: 5.1e9
    zx_pi_4: { shape: soft_square, width: 4.0e-7, amp: 0.1, rise: 1.0e-8 }
";
        let config = ModelConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.name, "bench");
        assert_eq!(config.sample_time, 0.5e-9);
        assert!(config.qubits[0].readout.measure_acquire.sync);
        assert!(config.couplings[0].cancellation.is_none());
    }

    #[test]
    fn test_self_coupling_rejected() {
        let mut config = ModelConfig::linear(2);
        config.couplings[0].target = config.couplings[0].control;
        assert!(matches!(
            config.validate(),
            Err(HalError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_coupling_qubit_rejected() {
        let mut config = ModelConfig::linear(2);
        config.couplings[0].target = 7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_file_roundtrip() {
        let config = ModelConfig::linear(3);
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(serde_json::to_string(&config).unwrap().as_bytes())
            .unwrap();

        let loaded = ModelConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = ModelConfig::from_file("/nonexistent/calibration.yaml").unwrap_err();
        assert!(matches!(err, HalError::Configuration(_)));
    }
}
