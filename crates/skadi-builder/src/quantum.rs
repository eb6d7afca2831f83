//! The quantum builder tier.
//!
//! Gates are resolved against the hardware model and appended as calibrated
//! pulse sequences. `cnot` is built from an echoed cross-resonance (ECR)
//! followed by single-qubit corrections.

use std::collections::BTreeMap;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::sync::Arc;

use skadi_hal::{HardwareModel, Target};
use skadi_ir::{
    Acquire, AcquireMode, ChannelId, ChannelSet, ChannelType, Instruction, IrError, Pulse,
    QubitId, Synchronize,
};

use crate::builder::{BuilderBase, Component, InstructionBuilder};
use crate::capability::{Acquired, Axis, Controls, GateOps, PulseOps};
use crate::error::{BuilderError, BuilderResult};

/// Builder tier backed by a calibrated hardware model.
#[derive(Debug)]
pub struct QuantumInstructionBuilder {
    inner: InstructionBuilder,
}

impl QuantumInstructionBuilder {
    /// Create an empty builder bound to `model`.
    pub fn new(model: Arc<dyn HardwareModel>) -> Self {
        Self {
            inner: InstructionBuilder::new(model),
        }
    }

    /// A fresh quantum builder for a nested scope, sharing the entanglement map.
    pub fn child_builder(&self, inherit: bool) -> Self {
        Self {
            inner: self.inner.child_builder(inherit),
        }
    }

    /// Rebuild a builder from serialized instructions.
    pub fn deserialize(blob: &str, model: Arc<dyn HardwareModel>) -> BuilderResult<Self> {
        Ok(Self {
            inner: InstructionBuilder::deserialize(blob, model)?,
        })
    }

    /// The base builder.
    pub fn into_inner(self) -> InstructionBuilder {
        self.inner
    }

    /// Consume the builder and return its instructions.
    pub fn into_instructions(self) -> Vec<Instruction> {
        self.inner.into_instructions()
    }

    fn resolve(&self, target: Target) -> BuilderResult<(QubitId, ChannelId)> {
        Ok(self.model().resolve_target(target)?)
    }
}

impl From<QuantumInstructionBuilder> for InstructionBuilder {
    fn from(builder: QuantumInstructionBuilder) -> Self {
        builder.inner
    }
}

impl From<QuantumInstructionBuilder> for Component {
    fn from(builder: QuantumInstructionBuilder) -> Self {
        Component::Builder(builder.inner)
    }
}

impl BuilderBase for QuantumInstructionBuilder {
    fn core(&self) -> &InstructionBuilder {
        &self.inner
    }

    fn core_mut(&mut self) -> &mut InstructionBuilder {
        &mut self.inner
    }
}

impl GateOps for QuantumInstructionBuilder {
    fn r(&mut self, axis: Axis, target: Target, angle: Option<f64>) -> BuilderResult<&mut Self> {
        let (qubit, channel) = self.resolve(target)?;
        let angle = angle.unwrap_or(PI);
        let model = self.model();
        let sequence = match axis {
            Axis::X => model.gate_x(qubit, angle, Some(channel))?,
            Axis::Y => model.gate_y(qubit, angle, Some(channel))?,
            Axis::Z => model.gate_z(qubit, angle, Some(channel))?,
        };
        Ok(self.add(sequence))
    }

    fn u(
        &mut self,
        target: impl Into<Target>,
        theta: f64,
        phi: f64,
        lambda: f64,
    ) -> BuilderResult<&mut Self> {
        let (qubit, channel) = self.resolve(target.into())?;
        let sequence = self
            .model()
            .gate_u(qubit, theta, phi, lambda, Some(channel))?;
        Ok(self.add(sequence))
    }

    fn cnot(&mut self, control: impl Into<Controls>, target: QubitId) -> BuilderResult<&mut Self> {
        let controls = control.into();
        let &[control] = controls.as_slice() else {
            return Err(BuilderError::InvalidInput(format!(
                "CNOT requires one control qubit, got {}",
                controls.len()
            )));
        };

        self.ecr(control, target)?
            .x(control, None)?
            .z(control, Some(-FRAC_PI_2))?
            .x(target, Some(-FRAC_PI_2))
    }

    fn ecr(&mut self, control: QubitId, target: QubitId) -> BuilderResult<&mut Self> {
        if control == target {
            return Err(IrError::DuplicateQubit(control).into());
        }
        let model = self.model();
        let devices = model.devices();
        let barrier = Instruction::Synchronize(Synchronize::new([
            devices.drive_channel(control)?,
            devices.pulse_channel(control, ChannelType::CrossResonance, &[target])?,
            devices.pulse_channel(control, ChannelType::CrossResonanceCancellation, &[target])?,
            devices.drive_channel(target)?,
        ]));

        let mut sequence = vec![barrier.clone()];
        sequence.extend(model.gate_zx(control, FRAC_PI_4, target)?);
        sequence.push(barrier.clone());
        sequence.extend(model.gate_x(control, PI, None)?);
        sequence.push(barrier.clone());
        sequence.extend(model.gate_zx(control, -FRAC_PI_4, target)?);
        sequence.push(barrier);

        Ok(self.add(sequence))
    }
}

impl PulseOps for QuantumInstructionBuilder {
    fn sweep(
        &mut self,
        variables: BTreeMap<String, Vec<serde_json::Value>>,
    ) -> BuilderResult<&mut Self> {
        Ok(self.add([Instruction::Sweep { variables }]))
    }

    fn pulse(&mut self, pulse: Pulse) -> BuilderResult<&mut Self> {
        Ok(self.add([Instruction::Pulse(pulse)]))
    }

    fn acquire(
        &mut self,
        channel: ChannelId,
        time: f64,
        mode: AcquireMode,
        output_variable: Option<&str>,
        delay: Option<f64>,
    ) -> BuilderResult<Acquired<'_, Self>> {
        let delay = match delay {
            Some(delay) => delay,
            None => {
                let devices = self.model().devices();
                let qubit = devices.owning_qubit(channel)?;
                devices.qubit(qubit)?.calibration.measure_acquire.delay
            }
        };
        let output = self.core().output_variable(output_variable)?;
        let acquire = Acquire::new(channel, time, mode, output, delay);
        self.add([Instruction::Acquire(acquire.clone())]);
        Ok(Acquired {
            builder: self,
            acquire,
        })
    }

    fn delay(&mut self, target: impl Into<Target>, time: f64) -> BuilderResult<&mut Self> {
        let (_, channel) = self.resolve(target.into())?;
        Ok(self.add([Instruction::Delay { channel, time }]))
    }

    fn synchronize(&mut self, targets: &[Target]) -> BuilderResult<&mut Self> {
        let devices = self.model().devices();
        let mut channels = ChannelSet::new();
        for target in targets {
            match *target {
                Target::Channel(channel) => {
                    channels.insert(channel);
                }
                Target::Qubit(qubit) => channels.extend(devices.qubit_channels(qubit)?),
            }
        }
        Ok(self.add([Instruction::Synchronize(Synchronize { channels })]))
    }

    fn phase_shift(&mut self, target: impl Into<Target>, phase: f64) -> BuilderResult<&mut Self> {
        if phase == 0.0 {
            return Ok(self);
        }
        let (_, channel) = self.resolve(target.into())?;
        Ok(self.add([Instruction::PhaseShift { channel, phase }]))
    }
}
