//! Pulse-level instructions.
//!
//! An [`Instruction`] is either a *quantum* instruction that acts on one or
//! more pulse channels, or a *classical* one (labels, jumps, assignments...)
//! that only affects control flow and variables.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::device::{ChannelId, MeasurePulseSettings};
use crate::error::IrError;

/// Discriminant of an [`Instruction`], used for pattern matching over
/// instruction sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InstructionKind {
    /// Drive pulse.
    Pulse,
    /// Readout stimulus pulse.
    MeasurePulse,
    /// Readout capture window.
    Acquire,
    /// Timing barrier across channels.
    Synchronize,
    /// Virtual phase change.
    PhaseShift,
    /// Reset of phase tracking.
    PhaseReset,
    /// Idle period.
    Delay,
    /// Classical transform of acquired data.
    PostProcessing,
    /// Active qubit reset.
    Reset,
    /// Runtime update of a device attribute.
    DeviceUpdate,
    /// Jump target.
    Label,
    /// Conditional or unconditional jump.
    Jump,
    /// Shot repetition header.
    Repeat,
    /// Variable assignment.
    Assign,
    /// Program return.
    Return,
    /// Parameter sweep.
    Sweep,
    /// Result formatting directive.
    ResultsProcessing,
}

impl InstructionKind {
    /// Whether instructions of this kind act on pulse channels.
    #[inline]
    pub fn is_quantum(self) -> bool {
        matches!(
            self,
            InstructionKind::Pulse
                | InstructionKind::MeasurePulse
                | InstructionKind::Acquire
                | InstructionKind::Synchronize
                | InstructionKind::PhaseShift
                | InstructionKind::PhaseReset
                | InstructionKind::Delay
                | InstructionKind::PostProcessing
                | InstructionKind::Reset
                | InstructionKind::DeviceUpdate
        )
    }

    /// Whether instructions of this kind emit a waveform.
    #[inline]
    pub fn is_pulse(self) -> bool {
        matches!(self, InstructionKind::Pulse | InstructionKind::MeasurePulse)
    }

    /// Lower-case name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            InstructionKind::Pulse => "pulse",
            InstructionKind::MeasurePulse => "measure_pulse",
            InstructionKind::Acquire => "acquire",
            InstructionKind::Synchronize => "synchronize",
            InstructionKind::PhaseShift => "phase_shift",
            InstructionKind::PhaseReset => "phase_reset",
            InstructionKind::Delay => "delay",
            InstructionKind::PostProcessing => "post_processing",
            InstructionKind::Reset => "reset",
            InstructionKind::DeviceUpdate => "device_update",
            InstructionKind::Label => "label",
            InstructionKind::Jump => "jump",
            InstructionKind::Repeat => "repeat",
            InstructionKind::Assign => "assign",
            InstructionKind::Return => "return",
            InstructionKind::Sweep => "sweep",
            InstructionKind::ResultsProcessing => "results_processing",
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pulse envelope shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseShape {
    /// Constant amplitude.
    Square,
    /// Gaussian envelope.
    Gaussian,
    /// Gaussian with DRAG correction.
    DragGaussian,
    /// Square with smoothed edges.
    SoftSquare,
}

/// A waveform played on one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pulse {
    /// Target channel.
    pub channel: ChannelId,
    /// Envelope shape.
    pub shape: PulseShape,
    /// Duration in seconds.
    pub width: f64,
    /// Amplitude.
    pub amp: f64,
    /// Phase offset in radians.
    pub phase: f64,
    /// DRAG coefficient.
    pub drag: f64,
    /// Rise time for soft-edged shapes.
    pub rise: f64,
}

impl Pulse {
    /// Create a pulse with zero phase, drag and rise.
    pub fn new(channel: ChannelId, shape: PulseShape, width: f64, amp: f64) -> Self {
        Self {
            channel,
            shape,
            width,
            amp,
            phase: 0.0,
            drag: 0.0,
            rise: 0.0,
        }
    }

    /// Create a readout pulse from a qubit's measurement settings.
    pub fn from_measure_settings(channel: ChannelId, settings: &MeasurePulseSettings) -> Self {
        Self {
            channel,
            shape: settings.shape,
            width: settings.width,
            amp: settings.amp,
            phase: settings.phase,
            drag: settings.drag,
            rise: settings.rise,
        }
    }
}

/// How an acquisition window is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquireMode {
    /// Every sample of every shot.
    Raw,
    /// Time trace averaged over shots.
    Scope,
    /// One integrated value per shot.
    Integrator,
}

/// A readout capture window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acquire {
    /// Capture channel.
    pub channel: ChannelId,
    /// Window length in seconds.
    pub time: f64,
    /// Recording mode.
    pub mode: AcquireMode,
    /// Variable receiving the captured data.
    pub output_variable: String,
    /// Delay after the start of the readout pulse.
    pub delay: f64,
}

impl Acquire {
    /// Create an acquisition window.
    pub fn new(
        channel: ChannelId,
        time: f64,
        mode: AcquireMode,
        output_variable: impl Into<String>,
        delay: f64,
    ) -> Self {
        Self {
            channel,
            time,
            mode,
            output_variable: output_variable.into(),
            delay,
        }
    }
}

/// An ordered, duplicate-free list of channels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelSet(Vec<ChannelId>);

impl ChannelSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a channel, keeping first-insertion order.
    pub fn insert(&mut self, channel: ChannelId) -> bool {
        if self.0.contains(&channel) {
            return false;
        }
        self.0.push(channel);
        true
    }

    /// Whether the set contains `channel`.
    pub fn contains(&self, channel: ChannelId) -> bool {
        self.0.contains(&channel)
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The channels as a slice.
    pub fn as_slice(&self) -> &[ChannelId] {
        &self.0
    }

    /// Iterate over the channels.
    pub fn iter(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<ChannelId> for ChannelSet {
    fn from_iter<T: IntoIterator<Item = ChannelId>>(iter: T) -> Self {
        let mut set = ChannelSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<ChannelId> for ChannelSet {
    fn extend<T: IntoIterator<Item = ChannelId>>(&mut self, iter: T) {
        for channel in iter {
            self.insert(channel);
        }
    }
}

/// Timing barrier: every listed channel waits for the slowest one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Synchronize {
    /// Channels aligned by the barrier.
    pub channels: ChannelSet,
}

impl Synchronize {
    /// Create a barrier over `channels`.
    pub fn new(channels: impl IntoIterator<Item = ChannelId>) -> Self {
        Self {
            channels: channels.into_iter().collect(),
        }
    }

    /// Widen this barrier in place.
    pub fn add_channels(&mut self, channels: impl IntoIterator<Item = ChannelId>) {
        self.channels.extend(channels);
    }

    /// A new barrier spanning this one's channels plus `channels`.
    #[must_use]
    pub fn merged_with(&self, channels: impl IntoIterator<Item = ChannelId>) -> Self {
        let mut merged = self.clone();
        merged.add_channels(channels);
        merged
    }
}

/// Reset of the phase tracking of the listed channels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseReset {
    /// Channels whose phase is reset.
    pub channels: ChannelSet,
}

impl PhaseReset {
    /// Create a phase reset over `channels`.
    pub fn new(channels: impl IntoIterator<Item = ChannelId>) -> Self {
        Self {
            channels: channels.into_iter().collect(),
        }
    }

    /// A new phase reset spanning this one's channels plus `channels`.
    #[must_use]
    pub fn merged_with(&self, channels: impl IntoIterator<Item = ChannelId>) -> Self {
        let mut merged = self.clone();
        merged.channels.extend(channels);
        merged
    }
}

/// Classical transforms applied to acquired data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostProcessType {
    /// Demodulate from the intermediate frequency.
    DownConvert,
    /// Average along the given axes.
    Mean,
    /// Map complex IQ values onto a real expectation value.
    LinearMapComplexToReal,
    /// Threshold into binary outcomes.
    Discriminate,
}

/// Data axis a post-processing step acts along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessAxis {
    /// Samples within one acquisition window.
    Time,
    /// Shots of the program.
    Sequence,
}

impl FromStr for ProcessAxis {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "time" => Ok(ProcessAxis::Time),
            "sequence" => Ok(ProcessAxis::Sequence),
            _ => Err(IrError::InvalidAxis(s.to_string())),
        }
    }
}

impl fmt::Display for ProcessAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessAxis::Time => f.write_str("time"),
            ProcessAxis::Sequence => f.write_str("sequence"),
        }
    }
}

/// A classical transform of one acquisition's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostProcessing {
    /// Channel of the processed acquisition.
    pub channel: ChannelId,
    /// Output variable of the processed acquisition.
    pub output_variable: String,
    /// The transform.
    pub process: PostProcessType,
    /// Axes the transform acts along.
    pub axes: Vec<ProcessAxis>,
    /// Numeric arguments of the transform.
    pub args: Vec<Complex64>,
}

impl PostProcessing {
    /// Create a post-processing step for `acquire`.
    pub fn new(
        acquire: &Acquire,
        process: PostProcessType,
        axes: Vec<ProcessAxis>,
        args: Vec<Complex64>,
    ) -> Self {
        Self {
            channel: acquire.channel,
            output_variable: acquire.output_variable.clone(),
            process,
            axes,
            args,
        }
    }
}

/// How the results of a variable are returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InlineResultsProcessing {
    /// Return the data as captured.
    Raw,
    /// Collapse to binary outcomes.
    Binary,
    /// Experiment-level aggregation.
    Experiment,
    /// Program-level aggregation.
    Program,
}

/// A pulse-level instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    /// Drive pulse.
    Pulse(Pulse),
    /// Readout stimulus pulse.
    MeasurePulse(Pulse),
    /// Readout capture window.
    Acquire(Acquire),
    /// Timing barrier.
    Synchronize(Synchronize),
    /// Virtual Z rotation on a channel.
    PhaseShift {
        /// Target channel.
        channel: ChannelId,
        /// Phase in radians.
        phase: f64,
    },
    /// Phase tracking reset.
    PhaseReset(PhaseReset),
    /// Idle period on a channel.
    Delay {
        /// Target channel.
        channel: ChannelId,
        /// Duration in seconds.
        time: f64,
    },
    /// Post-processing of acquired data.
    PostProcessing(PostProcessing),
    /// Active reset of the qubits driven through `channels`.
    Reset {
        /// Drive channels of the reset qubits.
        channels: ChannelSet,
    },
    /// Runtime update of a channel attribute.
    DeviceUpdate {
        /// Updated channel.
        target: ChannelId,
        /// Attribute name, e.g. `"frequency"`.
        attribute: String,
        /// New value or variable reference.
        value: serde_json::Value,
    },
    /// Jump target.
    Label {
        /// Unique label name.
        name: String,
    },
    /// Jump to a label, optionally guarded by a condition.
    Jump {
        /// Target label name.
        target: String,
        /// Condition expression.
        condition: Option<String>,
    },
    /// Repeat the program.
    Repeat {
        /// Number of shots.
        count: u64,
        /// Repetition period in seconds.
        repetition_period: Option<f64>,
    },
    /// Assign a value to a variable.
    Assign {
        /// Variable name.
        name: String,
        /// Value.
        value: serde_json::Value,
    },
    /// Return variables to the caller.
    Return {
        /// Returned variables.
        variables: Vec<String>,
    },
    /// Sweep variables over value lists.
    Sweep {
        /// Variable name to values.
        variables: BTreeMap<String, Vec<serde_json::Value>>,
    },
    /// Result formatting for a variable.
    ResultsProcessing {
        /// Processed variable.
        variable: String,
        /// Format.
        format: InlineResultsProcessing,
    },
}

impl Instruction {
    /// Create a label instruction.
    pub fn label(name: impl Into<String>) -> Self {
        Instruction::Label { name: name.into() }
    }

    /// Get the kind of this instruction.
    pub fn kind(&self) -> InstructionKind {
        match self {
            Instruction::Pulse(_) => InstructionKind::Pulse,
            Instruction::MeasurePulse(_) => InstructionKind::MeasurePulse,
            Instruction::Acquire(_) => InstructionKind::Acquire,
            Instruction::Synchronize(_) => InstructionKind::Synchronize,
            Instruction::PhaseShift { .. } => InstructionKind::PhaseShift,
            Instruction::PhaseReset(_) => InstructionKind::PhaseReset,
            Instruction::Delay { .. } => InstructionKind::Delay,
            Instruction::PostProcessing(_) => InstructionKind::PostProcessing,
            Instruction::Reset { .. } => InstructionKind::Reset,
            Instruction::DeviceUpdate { .. } => InstructionKind::DeviceUpdate,
            Instruction::Label { .. } => InstructionKind::Label,
            Instruction::Jump { .. } => InstructionKind::Jump,
            Instruction::Repeat { .. } => InstructionKind::Repeat,
            Instruction::Assign { .. } => InstructionKind::Assign,
            Instruction::Return { .. } => InstructionKind::Return,
            Instruction::Sweep { .. } => InstructionKind::Sweep,
            Instruction::ResultsProcessing { .. } => InstructionKind::ResultsProcessing,
        }
    }

    /// Check if this is a quantum instruction.
    pub fn is_quantum(&self) -> bool {
        self.kind().is_quantum()
    }

    /// Check if this instruction emits a waveform.
    pub fn is_pulse(&self) -> bool {
        self.kind().is_pulse()
    }

    /// Channels this instruction acts on. Empty for classical instructions.
    pub fn quantum_targets(&self) -> Vec<ChannelId> {
        match self {
            Instruction::Pulse(p) | Instruction::MeasurePulse(p) => vec![p.channel],
            Instruction::Acquire(a) => vec![a.channel],
            Instruction::Synchronize(s) => s.channels.as_slice().to_vec(),
            Instruction::PhaseReset(r) => r.channels.as_slice().to_vec(),
            Instruction::Reset { channels } => channels.as_slice().to_vec(),
            Instruction::PhaseShift { channel, .. } | Instruction::Delay { channel, .. } => {
                vec![*channel]
            }
            Instruction::PostProcessing(pp) => vec![pp.channel],
            Instruction::DeviceUpdate { target, .. } => vec![*target],
            Instruction::Label { .. }
            | Instruction::Jump { .. }
            | Instruction::Repeat { .. }
            | Instruction::Assign { .. }
            | Instruction::Return { .. }
            | Instruction::Sweep { .. }
            | Instruction::ResultsProcessing { .. } => vec![],
        }
    }

    /// The label name if this is a label.
    pub fn label_name(&self) -> Option<&str> {
        match self {
            Instruction::Label { name } => Some(name),
            _ => None,
        }
    }

    /// The acquisition if this is an acquire.
    pub fn as_acquire(&self) -> Option<&Acquire> {
        match self {
            Instruction::Acquire(a) => Some(a),
            _ => None,
        }
    }

    /// The barrier if this is a synchronize.
    pub fn as_synchronize(&self) -> Option<&Synchronize> {
        match self {
            Instruction::Synchronize(s) => Some(s),
            _ => None,
        }
    }

    /// Get the name of the instruction.
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}

impl From<Pulse> for Instruction {
    fn from(pulse: Pulse) -> Self {
        Instruction::Pulse(pulse)
    }
}

impl From<Acquire> for Instruction {
    fn from(acquire: Acquire) -> Self {
        Instruction::Acquire(acquire)
    }
}

impl From<Synchronize> for Instruction {
    fn from(sync: Synchronize) -> Self {
        Instruction::Synchronize(sync)
    }
}

impl From<PhaseReset> for Instruction {
    fn from(reset: PhaseReset) -> Self {
        Instruction::PhaseReset(reset)
    }
}

impl From<PostProcessing> for Instruction {
    fn from(pp: PostProcessing) -> Self {
        Instruction::PostProcessing(pp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let pulse = Instruction::Pulse(Pulse::new(ChannelId(0), PulseShape::Gaussian, 1e-7, 0.3));
        assert!(pulse.is_quantum());
        assert!(pulse.is_pulse());
        assert_eq!(pulse.name(), "pulse");

        let sync = Instruction::Synchronize(Synchronize::new([ChannelId(0), ChannelId(1)]));
        assert!(sync.is_quantum());
        assert!(!sync.is_pulse());

        let label = Instruction::label("loop");
        assert!(!label.is_quantum());
        assert_eq!(label.label_name(), Some("loop"));
        assert!(label.quantum_targets().is_empty());
    }

    #[test]
    fn test_synchronize_merge_keeps_order_without_duplicates() {
        let mut sync = Synchronize::new([ChannelId(2), ChannelId(0)]);
        sync.add_channels([ChannelId(0), ChannelId(5)]);
        assert_eq!(
            sync.channels.as_slice(),
            &[ChannelId(2), ChannelId(0), ChannelId(5)]
        );

        let merged = sync.merged_with([ChannelId(7)]);
        assert_eq!(merged.channels.len(), 4);
        assert_eq!(sync.channels.len(), 3);
    }

    #[test]
    fn test_process_axis_parsing() {
        assert_eq!("TIME".parse::<ProcessAxis>().unwrap(), ProcessAxis::Time);
        assert_eq!(
            "sequence".parse::<ProcessAxis>().unwrap(),
            ProcessAxis::Sequence
        );
        assert!(matches!(
            "frequency".parse::<ProcessAxis>(),
            Err(IrError::InvalidAxis(_))
        ));
    }

    #[test]
    fn test_instruction_serde_roundtrip() {
        let inst = Instruction::Jump {
            target: "loop".into(),
            condition: Some("i < 10".into()),
        };
        let json = serde_json::to_string(&inst).unwrap();
        let back: Instruction = serde_json::from_str(&json).unwrap();
        assert_eq!(inst, back);
    }
}
