//! The hardware model contract consumed by the instruction builder.
//!
//! A [`HardwareModel`] owns the [`DeviceGraph`] of one device and turns
//! logical rotations into calibrated pulse sequences. It must be
//! deterministic for a given calibration snapshot: the same call always
//! yields the same instructions.

use serde::{Deserialize, Serialize};

use skadi_ir::{ChannelId, DeviceGraph, Instruction, QubitId};

use crate::error::{HalError, HalResult};

/// Something a single-qubit gate can be aimed at.
///
/// A bare qubit resolves to its drive channel; an explicit channel resolves
/// to the qubit owning it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// A qubit, addressed through its drive channel.
    Qubit(QubitId),
    /// A specific pulse channel.
    Channel(ChannelId),
}

impl From<QubitId> for Target {
    fn from(q: QubitId) -> Self {
        Target::Qubit(q)
    }
}

impl From<ChannelId> for Target {
    fn from(c: ChannelId) -> Self {
        Target::Channel(c)
    }
}

/// Calibrated gate synthesis for one device.
///
/// `Send + Sync` so a single model can back builders on several threads;
/// builders only ever read from it.
pub trait HardwareModel: Send + Sync {
    /// Name of the device.
    fn name(&self) -> &str;

    /// The device graph.
    fn devices(&self) -> &DeviceGraph;

    /// Rotation about X by `angle` radians.
    fn gate_x(
        &self,
        qubit: QubitId,
        angle: f64,
        channel: Option<ChannelId>,
    ) -> HalResult<Vec<Instruction>>;

    /// Rotation about Y by `angle` radians.
    fn gate_y(
        &self,
        qubit: QubitId,
        angle: f64,
        channel: Option<ChannelId>,
    ) -> HalResult<Vec<Instruction>>;

    /// Rotation about Z by `angle` radians.
    fn gate_z(
        &self,
        qubit: QubitId,
        angle: f64,
        channel: Option<ChannelId>,
    ) -> HalResult<Vec<Instruction>>;

    /// Euler rotation U(θ, φ, λ) = Z(λ) · Y(θ) · Z(φ), emitted in that order.
    fn gate_u(
        &self,
        qubit: QubitId,
        theta: f64,
        phi: f64,
        lambda: f64,
        channel: Option<ChannelId>,
    ) -> HalResult<Vec<Instruction>> {
        let mut sequence = self.gate_z(qubit, lambda, channel)?;
        sequence.extend(self.gate_y(qubit, theta, channel)?);
        sequence.extend(self.gate_z(qubit, phi, channel)?);
        Ok(sequence)
    }

    /// Cross-resonance ZX interaction of `control` towards `target`.
    fn gate_zx(
        &self,
        control: QubitId,
        angle: f64,
        target: QubitId,
    ) -> HalResult<Vec<Instruction>> {
        let _ = (control, angle, target);
        Err(HalError::Unsupported(format!(
            "ZX interaction on {}",
            self.name()
        )))
    }

    /// Resolve a gate target into the (qubit, channel) pair it addresses.
    fn resolve_target(&self, target: Target) -> HalResult<(QubitId, ChannelId)> {
        let devices = self.devices();
        match target {
            Target::Qubit(q) => Ok((q, devices.drive_channel(q)?)),
            Target::Channel(c) => Ok((devices.owning_qubit(c)?, c)),
        }
    }
}
