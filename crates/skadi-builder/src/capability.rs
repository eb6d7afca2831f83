//! Capability traits of the builder tiers.
//!
//! Each trait groups one family of operations. Default bodies report
//! [`BuilderError::Unsupported`] (or derive the operation from another one
//! of the same family), so the base tier gets a complete but refusing
//! implementation for free, and a hardware tier overrides what it supports.

use std::collections::BTreeMap;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::fmt;

use num_complex::Complex64;

use skadi_hal::Target;
use skadi_ir::{Acquire, AcquireMode, ChannelId, PostProcessType, ProcessAxis, Pulse, QubitId};

use crate::builder::{BuilderBase, InstructionBuilder};
use crate::error::{BuilderError, BuilderResult};

/// Rotation axis of a single-qubit gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// X axis.
    X,
    /// Y axis.
    Y,
    /// Z axis.
    Z,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => f.write_str("X"),
            Axis::Y => f.write_str("Y"),
            Axis::Z => f.write_str("Z"),
        }
    }
}

/// Control qubits of a controlled gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controls(Vec<QubitId>);

impl Controls {
    /// The control qubits.
    pub fn as_slice(&self) -> &[QubitId] {
        &self.0
    }

    /// Number of controls.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no controls.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<QubitId> for Controls {
    fn from(qubit: QubitId) -> Self {
        Controls(vec![qubit])
    }
}

impl From<Vec<QubitId>> for Controls {
    fn from(qubits: Vec<QubitId>) -> Self {
        Controls(qubits)
    }
}

impl From<&[QubitId]> for Controls {
    fn from(qubits: &[QubitId]) -> Self {
        Controls(qubits.to_vec())
    }
}

impl<const N: usize> From<[QubitId; N]> for Controls {
    fn from(qubits: [QubitId; N]) -> Self {
        Controls(qubits.to_vec())
    }
}

/// A builder handle together with the acquisition an operation created.
///
/// Keep chaining through `builder`; pass `acquire` to post-processing.
#[derive(Debug)]
pub struct Acquired<'a, B: ?Sized> {
    /// The builder the acquisition was added to.
    pub builder: &'a mut B,
    /// The new acquisition.
    pub acquire: Acquire,
}

/// Gate decomposition.
pub trait GateOps: BuilderBase {
    /// Rotate `target` about `axis` by `angle` (π when `None`).
    fn r(&mut self, axis: Axis, target: Target, angle: Option<f64>) -> BuilderResult<&mut Self> {
        let _ = (target, angle);
        Err(BuilderError::unsupported(format!("R{axis}")))
    }

    /// Rotation about X.
    fn x(&mut self, target: impl Into<Target>, angle: Option<f64>) -> BuilderResult<&mut Self> {
        self.r(Axis::X, target.into(), angle)
    }

    /// Rotation about Y.
    fn y(&mut self, target: impl Into<Target>, angle: Option<f64>) -> BuilderResult<&mut Self> {
        self.r(Axis::Y, target.into(), angle)
    }

    /// Rotation about Z.
    fn z(&mut self, target: impl Into<Target>, angle: Option<f64>) -> BuilderResult<&mut Self> {
        self.r(Axis::Z, target.into(), angle)
    }

    /// Euler rotation, applied as Z(λ), then Y(θ), then Z(φ).
    fn u(
        &mut self,
        target: impl Into<Target>,
        theta: f64,
        phi: f64,
        lambda: f64,
    ) -> BuilderResult<&mut Self> {
        let target = target.into();
        self.z(target, Some(lambda))?;
        self.y(target, Some(theta))?;
        self.z(target, Some(phi))
    }

    /// √X.
    fn sx(&mut self, target: impl Into<Target>) -> BuilderResult<&mut Self> {
        self.x(target, Some(FRAC_PI_2))
    }

    /// √X†.
    fn sxdg(&mut self, target: impl Into<Target>) -> BuilderResult<&mut Self> {
        self.x(target, Some(-FRAC_PI_2))
    }

    /// S gate.
    fn s(&mut self, target: impl Into<Target>) -> BuilderResult<&mut Self> {
        self.z(target, Some(FRAC_PI_2))
    }

    /// S† gate.
    fn sdg(&mut self, target: impl Into<Target>) -> BuilderResult<&mut Self> {
        self.z(target, Some(-FRAC_PI_2))
    }

    /// T gate.
    fn t(&mut self, target: impl Into<Target>) -> BuilderResult<&mut Self> {
        self.z(target, Some(FRAC_PI_4))
    }

    /// T† gate.
    fn tdg(&mut self, target: impl Into<Target>) -> BuilderResult<&mut Self> {
        self.z(target, Some(-FRAC_PI_4))
    }

    /// Hadamard, as Z(π) followed by Y(π/2).
    fn had(&mut self, qubit: QubitId) -> BuilderResult<&mut Self> {
        self.z(qubit, None)?;
        self.y(qubit, Some(FRAC_PI_2))
    }

    /// Swap two qubits.
    fn swap(&mut self, target: QubitId, destination: QubitId) -> BuilderResult<&mut Self> {
        let _ = (target, destination);
        Err(BuilderError::unsupported("swap"))
    }

    /// Controlled rotation.
    fn c_r(
        &mut self,
        axis: Axis,
        controls: impl Into<Controls>,
        target: QubitId,
        angle: Option<f64>,
    ) -> BuilderResult<&mut Self> {
        let _ = (controls, target, angle);
        Err(BuilderError::unsupported(format!("cR{axis}")))
    }

    /// Controlled X rotation.
    fn c_x(
        &mut self,
        controls: impl Into<Controls>,
        target: QubitId,
        angle: Option<f64>,
    ) -> BuilderResult<&mut Self> {
        self.c_r(Axis::X, controls, target, angle)
    }

    /// Controlled Y rotation.
    fn c_y(
        &mut self,
        controls: impl Into<Controls>,
        target: QubitId,
        angle: Option<f64>,
    ) -> BuilderResult<&mut Self> {
        self.c_r(Axis::Y, controls, target, angle)
    }

    /// Controlled Z rotation.
    fn c_z(
        &mut self,
        controls: impl Into<Controls>,
        target: QubitId,
        angle: Option<f64>,
    ) -> BuilderResult<&mut Self> {
        self.c_r(Axis::Z, controls, target, angle)
    }

    /// Controlled NOT.
    fn cnot(&mut self, control: impl Into<Controls>, target: QubitId) -> BuilderResult<&mut Self> {
        self.c_x(control, target, Some(PI))
    }

    /// Toffoli.
    fn ccnot(
        &mut self,
        first: QubitId,
        second: QubitId,
        target: QubitId,
    ) -> BuilderResult<&mut Self> {
        self.c_x([first, second], target, Some(PI))
    }

    /// Controlled swap.
    fn cswap(
        &mut self,
        controls: impl Into<Controls>,
        target: QubitId,
        destination: QubitId,
    ) -> BuilderResult<&mut Self> {
        let _ = (controls, target, destination);
        Err(BuilderError::unsupported("cswap"))
    }

    /// Echoed cross-resonance between `control` and `target`.
    fn ecr(&mut self, control: QubitId, target: QubitId) -> BuilderResult<&mut Self> {
        let _ = (control, target);
        Err(BuilderError::unsupported("ECR"))
    }
}

/// Measurement and post-processing.
///
/// The `measure_*` family is `measure` followed by a fixed post-processing
/// chain; it fails wherever `measure` does.
pub trait MeasureOps: BuilderBase {
    /// Measure `qubit`.
    ///
    /// `axis` selects the acquisition mode: [`ProcessAxis::Sequence`] (the
    /// default) integrates each shot, [`ProcessAxis::Time`] keeps the trace.
    fn measure(
        &mut self,
        qubit: QubitId,
        axis: Option<ProcessAxis>,
        output_variable: Option<&str>,
    ) -> BuilderResult<Acquired<'_, Self>> {
        let _ = (qubit, axis, output_variable);
        Err(BuilderError::unsupported("measure"))
    }

    /// Post-process the data of `acquire`.
    ///
    /// Missing or all-zero `args` are derived from the device where the
    /// process has a calibrated default.
    fn post_processing(
        &mut self,
        acquire: &Acquire,
        process: PostProcessType,
        axes: &[ProcessAxis],
        qubit: Option<QubitId>,
        args: Option<Vec<Complex64>>,
    ) -> BuilderResult<&mut Self> {
        let _ = (acquire, process, axes, qubit, args);
        Err(BuilderError::unsupported("post_processing"))
    }

    /// Single-shot Z expectation values.
    fn measure_single_shot_z(
        &mut self,
        qubit: QubitId,
        axis: Option<ProcessAxis>,
        output_variable: Option<&str>,
    ) -> BuilderResult<Acquired<'_, Self>> {
        let acquire = self.measure(qubit, axis, output_variable)?.acquire;
        post_process_chain(self, &acquire, qubit, &[DOWN_CONVERT, MEAN_TIME, LINEAR_MAP])?;
        Ok(Acquired { builder: self, acquire })
    }

    /// Single-shot IQ signal.
    fn measure_single_shot_signal(
        &mut self,
        qubit: QubitId,
        axis: Option<ProcessAxis>,
        output_variable: Option<&str>,
    ) -> BuilderResult<Acquired<'_, Self>> {
        let acquire = self.measure(qubit, axis, output_variable)?.acquire;
        post_process_chain(self, &acquire, qubit, &[DOWN_CONVERT, MEAN_TIME])?;
        Ok(Acquired { builder: self, acquire })
    }

    /// Z expectation averaged over shots.
    fn measure_mean_z(
        &mut self,
        qubit: QubitId,
        axis: Option<ProcessAxis>,
        output_variable: Option<&str>,
    ) -> BuilderResult<Acquired<'_, Self>> {
        let acquire = self.measure(qubit, axis, output_variable)?.acquire;
        post_process_chain(
            self,
            &acquire,
            qubit,
            &[DOWN_CONVERT, MEAN_TIME, MEAN_SEQUENCE, LINEAR_MAP],
        )?;
        Ok(Acquired { builder: self, acquire })
    }

    /// IQ signal averaged over shots.
    fn measure_mean_signal(
        &mut self,
        qubit: QubitId,
        output_variable: Option<&str>,
    ) -> BuilderResult<Acquired<'_, Self>> {
        let acquire = self
            .measure(qubit, Some(ProcessAxis::Sequence), output_variable)?
            .acquire;
        post_process_chain(self, &acquire, qubit, &[DOWN_CONVERT, MEAN_TIME, MEAN_SEQUENCE])?;
        Ok(Acquired { builder: self, acquire })
    }

    /// Readout trace averaged over shots.
    fn measure_scope_mode(
        &mut self,
        qubit: QubitId,
        output_variable: Option<&str>,
    ) -> BuilderResult<Acquired<'_, Self>> {
        let acquire = self
            .measure(qubit, Some(ProcessAxis::Time), output_variable)?
            .acquire;
        post_process_chain(self, &acquire, qubit, &[DOWN_CONVERT, MEAN_SEQUENCE])?;
        Ok(Acquired { builder: self, acquire })
    }

    /// Single-shot outcomes discriminated into bins.
    fn measure_single_shot_binned(
        &mut self,
        qubit: QubitId,
        axis: Option<ProcessAxis>,
        output_variable: Option<&str>,
    ) -> BuilderResult<Acquired<'_, Self>> {
        let axis = axis.or(Some(ProcessAxis::Sequence));
        let acquire = self.measure(qubit, axis, output_variable)?.acquire;
        post_process_chain(
            self,
            &acquire,
            qubit,
            &[DOWN_CONVERT, MEAN_TIME, LINEAR_MAP, DISCRIMINATE],
        )?;
        Ok(Acquired { builder: self, acquire })
    }
}

type Step = (PostProcessType, &'static [ProcessAxis]);

const DOWN_CONVERT: Step = (PostProcessType::DownConvert, &[ProcessAxis::Time]);
const MEAN_TIME: Step = (PostProcessType::Mean, &[ProcessAxis::Time]);
const MEAN_SEQUENCE: Step = (PostProcessType::Mean, &[ProcessAxis::Sequence]);
const LINEAR_MAP: Step = (PostProcessType::LinearMapComplexToReal, &[]);
const DISCRIMINATE: Step = (PostProcessType::Discriminate, &[]);

fn post_process_chain<B: MeasureOps + ?Sized>(
    builder: &mut B,
    acquire: &Acquire,
    qubit: QubitId,
    steps: &[Step],
) -> BuilderResult<()> {
    for (process, axes) in steps {
        builder.post_processing(acquire, *process, axes, Some(qubit), None)?;
    }
    Ok(())
}

/// Direct pulse-level control.
pub trait PulseOps: BuilderBase {
    /// Sweep variables over value lists.
    fn sweep(
        &mut self,
        variables: BTreeMap<String, Vec<serde_json::Value>>,
    ) -> BuilderResult<&mut Self> {
        let _ = variables;
        Err(BuilderError::unsupported("sweep"))
    }

    /// Play a pulse.
    fn pulse(&mut self, pulse: Pulse) -> BuilderResult<&mut Self> {
        let _ = pulse;
        Err(BuilderError::unsupported("pulse"))
    }

    /// Open an acquisition window on `channel`.
    ///
    /// Without a `delay`, the owning qubit's calibrated acquire delay is used.
    fn acquire(
        &mut self,
        channel: ChannelId,
        time: f64,
        mode: AcquireMode,
        output_variable: Option<&str>,
        delay: Option<f64>,
    ) -> BuilderResult<Acquired<'_, Self>> {
        let _ = (channel, time, mode, output_variable, delay);
        Err(BuilderError::unsupported("acquire"))
    }

    /// Idle `target` for `time` seconds.
    fn delay(&mut self, target: impl Into<Target>, time: f64) -> BuilderResult<&mut Self> {
        let _ = (target, time);
        Err(BuilderError::unsupported("delay"))
    }

    /// Align `targets`; a qubit stands for all of its channels.
    fn synchronize(&mut self, targets: &[Target]) -> BuilderResult<&mut Self> {
        let _ = targets;
        Err(BuilderError::unsupported("synchronize"))
    }

    /// Shift the phase of `target` by `phase` radians.
    fn phase_shift(&mut self, target: impl Into<Target>, phase: f64) -> BuilderResult<&mut Self> {
        let _ = (target, phase);
        Err(BuilderError::unsupported("phase_shift"))
    }
}

impl GateOps for InstructionBuilder {}
impl MeasureOps for InstructionBuilder {}
impl PulseOps for InstructionBuilder {}
