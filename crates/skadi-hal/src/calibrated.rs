//! Reference hardware model driven by a calibration snapshot.
//!
//! Single-qubit rotations scale a calibrated π/2 drive pulse; Z rotations
//! are virtual phase shifts; Y rotations are X rotations framed by ±π/2
//! phase shifts. ZX interactions play the calibrated cross-resonance pulse
//! together with its cancellation tone, scaled to the requested angle.

use std::f64::consts::FRAC_PI_2;
use std::f64::consts::FRAC_PI_4;

use rustc_hash::FxHashMap;
use tracing::debug;

use skadi_ir::{ChannelId, ChannelType, DeviceGraph, Instruction, Pulse, QubitId};

use crate::config::{ModelConfig, PulseCalibration};
use crate::error::{HalError, HalResult};
use crate::model::HardwareModel;

#[derive(Debug, Clone)]
struct CrossResonance {
    interaction: ChannelId,
    cancellation: ChannelId,
    zx_pi_4: PulseCalibration,
    cancellation_pulse: Option<PulseCalibration>,
}

/// A [`HardwareModel`] built from a [`ModelConfig`].
#[derive(Debug, Clone)]
pub struct CalibratedModel {
    name: String,
    devices: DeviceGraph,
    x_pi_2: FxHashMap<QubitId, PulseCalibration>,
    cross_resonance: FxHashMap<(QubitId, QubitId), CrossResonance>,
}

impl CalibratedModel {
    /// Build the device graph and gate tables described by `config`.
    pub fn from_config(config: &ModelConfig) -> HalResult<Self> {
        config.validate()?;

        let mut devices = DeviceGraph::new();
        let mut by_index = FxHashMap::default();
        let mut x_pi_2 = FxHashMap::default();

        for qubit in &config.qubits {
            let drive_line = devices.add_physical_channel(
                format!("CH{}", 2 * qubit.index + 1),
                config.sample_time,
                qubit.baseband,
            );
            let readout_line = devices.add_physical_channel(
                format!("CH{}", 2 * qubit.index + 2),
                config.sample_time,
                qubit.baseband,
            );
            let resonator =
                devices.add_resonator(readout_line, qubit.measure_frequency, qubit.fixed_if)?;
            let id = devices.add_qubit(qubit.index, drive_line, resonator, qubit.readout.clone())?;
            devices.add_pulse_channel(id, ChannelType::Drive, qubit.drive_frequency, &[])?;

            by_index.insert(qubit.index, id);
            x_pi_2.insert(id, qubit.x_pi_2.clone());
        }

        let mut cross_resonance = FxHashMap::default();
        for coupling in &config.couplings {
            let lookup = |index: u32| {
                by_index.get(&index).copied().ok_or_else(|| {
                    HalError::Configuration(format!("coupling references unknown qubit {index}"))
                })
            };
            let control = lookup(coupling.control)?;
            let target = lookup(coupling.target)?;
            let interaction = devices.add_pulse_channel(
                control,
                ChannelType::CrossResonance,
                coupling.frequency,
                &[target],
            )?;
            let cancellation = devices.add_pulse_channel(
                control,
                ChannelType::CrossResonanceCancellation,
                coupling.frequency,
                &[target],
            )?;
            cross_resonance.insert(
                (control, target),
                CrossResonance {
                    interaction,
                    cancellation,
                    zx_pi_4: coupling.zx_pi_4.clone(),
                    cancellation_pulse: coupling.cancellation.clone(),
                },
            );
        }

        debug!(
            "Built calibrated model '{}' with {} qubits and {} couplings",
            config.name,
            devices.num_qubits(),
            cross_resonance.len()
        );

        Ok(Self {
            name: config.name.clone(),
            devices,
            x_pi_2,
            cross_resonance,
        })
    }

    /// A linear chain of `num_qubits` qubits with default calibration.
    pub fn linear(num_qubits: u32) -> HalResult<Self> {
        Self::from_config(&ModelConfig::linear(num_qubits))
    }

    /// Mutable access to the device graph, e.g. to adjust readout settings.
    pub fn devices_mut(&mut self) -> &mut DeviceGraph {
        &mut self.devices
    }

    fn qubit_index(&self, qubit: QubitId) -> HalResult<u32> {
        Ok(self.devices.qubit(qubit)?.index)
    }

    fn scaled_pulse(channel: ChannelId, cal: &PulseCalibration, scale: f64) -> Instruction {
        Instruction::Pulse(Pulse {
            channel,
            shape: cal.shape,
            width: cal.width,
            amp: cal.amp * scale,
            phase: 0.0,
            drag: cal.drag * scale,
            rise: cal.rise,
        })
    }
}

impl HardwareModel for CalibratedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn devices(&self) -> &DeviceGraph {
        &self.devices
    }

    fn gate_x(
        &self,
        qubit: QubitId,
        angle: f64,
        channel: Option<ChannelId>,
    ) -> HalResult<Vec<Instruction>> {
        let cal = self
            .x_pi_2
            .get(&qubit)
            .ok_or_else(|| HalError::MissingCalibration {
                gate: "x".into(),
                qubit: qubit.0,
            })?;
        let channel = match channel {
            Some(c) => c,
            None => self.devices.drive_channel(qubit)?,
        };
        Ok(vec![Self::scaled_pulse(channel, cal, angle / FRAC_PI_2)])
    }

    fn gate_y(
        &self,
        qubit: QubitId,
        angle: f64,
        channel: Option<ChannelId>,
    ) -> HalResult<Vec<Instruction>> {
        let channel = match channel {
            Some(c) => c,
            None => self.devices.drive_channel(qubit)?,
        };
        let mut sequence = vec![Instruction::PhaseShift {
            channel,
            phase: FRAC_PI_2,
        }];
        sequence.extend(self.gate_x(qubit, angle, Some(channel))?);
        sequence.push(Instruction::PhaseShift {
            channel,
            phase: -FRAC_PI_2,
        });
        Ok(sequence)
    }

    fn gate_z(
        &self,
        qubit: QubitId,
        angle: f64,
        channel: Option<ChannelId>,
    ) -> HalResult<Vec<Instruction>> {
        let channel = match channel {
            Some(c) => c,
            None => self.devices.drive_channel(qubit)?,
        };
        Ok(vec![Instruction::PhaseShift {
            channel,
            phase: -angle,
        }])
    }

    fn gate_zx(
        &self,
        control: QubitId,
        angle: f64,
        target: QubitId,
    ) -> HalResult<Vec<Instruction>> {
        let cr = self.cross_resonance.get(&(control, target)).ok_or_else(|| {
            HalError::MissingCalibration {
                gate: format!("zx towards Q{}", target.0),
                qubit: self.qubit_index(control).unwrap_or(control.0),
            }
        })?;
        let scale = angle / FRAC_PI_4;
        let mut sequence = vec![Self::scaled_pulse(cr.interaction, &cr.zx_pi_4, scale)];
        if let Some(cal) = &cr.cancellation_pulse {
            sequence.push(Self::scaled_pulse(cr.cancellation, cal, scale));
        }
        Ok(sequence)
    }
}
