//! Measurement insertion and measurement block merging.
//!
//! A measurement is normally emitted as a fresh block:
//!
//! ```text
//! sync(entangled) → measure pulse → acquire → sync(qubit) → phase reset(entangled)
//! ```
//!
//! followed by its post-processing. When the instructions just before a new
//! measurement already form such a block, the new measurement is spliced
//! into it instead: the old closing barrier and phase reset are widened to
//! cover the new qubit and moved after the new pulse and acquisition, so
//! consecutive measurements share one closing barrier.

use std::collections::BTreeSet;

use num_complex::Complex64;
use tracing::debug;

use skadi_ir::{
    Acquire, AcquireMode, ChannelId, DeviceGraph, Instruction, InstructionKind, PhaseReset,
    PostProcessType, PostProcessing, ProcessAxis, Pulse, QubitId, Synchronize,
};

use crate::builder::BuilderBase;
use crate::capability::{Acquired, MeasureOps};
use crate::error::{BuilderError, BuilderResult};
use crate::quantum::QuantumInstructionBuilder;

/// Kinds a measurement block alternates between, most recent first.
const BLOCK_CYCLE: [InstructionKind; 2] = [InstructionKind::Acquire, InstructionKind::MeasurePulse];

/// Kinds accepted anywhere inside a block.
const OPTIONAL_KINDS: [InstructionKind; 3] = [
    InstructionKind::PostProcessing,
    InstructionKind::Synchronize,
    InstructionKind::PhaseReset,
];

/// The instructions that immediately precede a new measurement and look
/// like a measurement block. All index lists are most recent first.
#[derive(Debug, Default)]
pub(crate) struct MeasurementBlock {
    kinds: BTreeSet<InstructionKind>,
    syncs: Vec<usize>,
    phase_resets: Vec<usize>,
    post_processing: Vec<usize>,
}

impl MeasurementBlock {
    /// Scan `instructions` backwards for a trailing measurement block.
    ///
    /// Classical instructions are skipped. The expected kind cycles through
    /// acquire and measure pulse; it only advances on a mismatch, and a
    /// second mismatch in a row ends the block.
    pub(crate) fn scan(instructions: &[Instruction]) -> Self {
        let mut block = Self::default();
        let mut cursor = 0;

        for (index, inst) in instructions.iter().enumerate().rev() {
            let kind = inst.kind();
            if !kind.is_quantum() {
                continue;
            }
            if !Self::accepts(kind, BLOCK_CYCLE[cursor]) {
                cursor = (cursor + 1) % BLOCK_CYCLE.len();
                if !Self::accepts(kind, BLOCK_CYCLE[cursor]) {
                    break;
                }
            }
            block.record(index, kind);
        }
        block
    }

    fn accepts(kind: InstructionKind, expected: InstructionKind) -> bool {
        kind == expected || OPTIONAL_KINDS.contains(&kind)
    }

    fn record(&mut self, index: usize, kind: InstructionKind) {
        self.kinds.insert(kind);
        match kind {
            InstructionKind::Synchronize => self.syncs.push(index),
            InstructionKind::PhaseReset => self.phase_resets.push(index),
            InstructionKind::PostProcessing => self.post_processing.push(index),
            _ => {}
        }
    }

    /// Whether every block kind is present, with an opening and a closing
    /// barrier and at least one phase reset.
    pub(crate) fn is_full(&self) -> bool {
        self.kinds.len() == BLOCK_CYCLE.len() + OPTIONAL_KINDS.len()
            && self.syncs.len() >= 2
            && !self.phase_resets.is_empty()
    }

    fn opening_sync(&self) -> Option<usize> {
        self.syncs.last().copied()
    }

    fn closing_sync(&self) -> Option<usize> {
        self.syncs.first().copied()
    }

    fn closing_reset(&self) -> Option<usize> {
        self.phase_resets.first().copied()
    }
}

/// Everything a new measurement appends.
struct Readout {
    measure_pulse: Instruction,
    acquire: Acquire,
    qubit_channels: Vec<ChannelId>,
    entangled_channels: Vec<ChannelId>,
}

/// Splice a new readout into the trailing block of `instructions`.
///
/// The opening barrier is widened in place; the closing barrier and phase
/// reset are pulled out, widened and returned together with the block's
/// post-processing in chronological order. Returns `None`, leaving
/// `instructions` untouched, if the block is not full.
fn take_block_tail(
    instructions: &mut Vec<Instruction>,
    block: &MeasurementBlock,
    readout: &Readout,
) -> Option<(Synchronize, PhaseReset, Vec<Instruction>)> {
    let (opening, closing, reset) = (
        block.opening_sync()?,
        block.closing_sync()?,
        block.closing_reset()?,
    );
    let (Some(Instruction::Synchronize(closing_sync)), Some(Instruction::PhaseReset(closing_reset))) =
        (instructions.get(closing), instructions.get(reset))
    else {
        return None;
    };
    let final_sync = closing_sync.merged_with(readout.qubit_channels.iter().copied());
    let final_reset = closing_reset.merged_with(readout.entangled_channels.iter().copied());

    if let Some(Instruction::Synchronize(sync)) = instructions.get_mut(opening) {
        sync.add_channels(readout.entangled_channels.iter().copied());
    }

    let mut post_processing = vec![];
    let mut kept = Vec::with_capacity(instructions.len());
    for (index, inst) in std::mem::take(instructions).into_iter().enumerate() {
        if index == closing || index == reset {
            continue;
        }
        if block.post_processing.contains(&index) {
            post_processing.push(inst);
        } else {
            kept.push(inst);
        }
    }
    *instructions = kept;

    Some((final_sync, final_reset, post_processing))
}

/// Every channel of each qubit, in order, without duplicates.
fn channels_of(devices: &DeviceGraph, qubits: &BTreeSet<QubitId>) -> BuilderResult<Vec<ChannelId>> {
    let mut channels = vec![];
    for &qubit in qubits {
        for channel in devices.qubit_channels(qubit)? {
            if !channels.contains(&channel) {
                channels.push(channel);
            }
        }
    }
    Ok(channels)
}

/// Calibrated arguments for `process` when the caller supplied none.
fn default_args(
    devices: &DeviceGraph,
    acquire: &Acquire,
    process: PostProcessType,
    qubit: Option<QubitId>,
) -> BuilderResult<Vec<Complex64>> {
    let calibration = move |process: PostProcessType| {
        let qubit = qubit.ok_or_else(|| {
            BuilderError::InvalidInput(format!(
                "Need a qubit to infer {process:?} arguments; pass either args or a qubit"
            ))
        })?;
        Ok::<_, BuilderError>(&devices.qubit(qubit)?.calibration)
    };

    match process {
        PostProcessType::LinearMapComplexToReal => Ok(calibration(process)?.mean_z_map_args.to_vec()),
        PostProcessType::Discriminate => {
            Ok(vec![Complex64::new(calibration(process)?.discriminator, 0.0)])
        }
        PostProcessType::DownConvert => {
            let physical = devices.physical_channel(devices.channel(acquire.channel)?.physical_channel)?;
            let resonator = physical.resonator.ok_or_else(|| {
                BuilderError::InvalidInput(format!(
                    "Acquire channel {} is not on a readout line",
                    acquire.channel
                ))
            })?;
            let measure = devices.channel(devices.resonator(resonator)?.measure_channel)?;
            let offset = if measure.fixed_if {
                physical.baseband.if_frequency
            } else {
                measure.frequency - physical.baseband.frequency
            };
            Ok(vec![
                Complex64::new(offset, 0.0),
                Complex64::new(physical.sample_time, 0.0),
            ])
        }
        PostProcessType::Mean => Ok(vec![]),
    }
}

impl MeasureOps for QuantumInstructionBuilder {
    fn measure(
        &mut self,
        qubit: QubitId,
        axis: Option<ProcessAxis>,
        output_variable: Option<&str>,
    ) -> BuilderResult<Acquired<'_, Self>> {
        let mode = match axis.unwrap_or(ProcessAxis::Sequence) {
            ProcessAxis::Sequence => AcquireMode::Integrator,
            ProcessAxis::Time => AcquireMode::Scope,
        };

        let model = std::sync::Arc::clone(self.model());
        let devices = model.devices();
        let calibration = &devices.qubit(qubit)?.calibration;
        let entangled = self.entanglement().entangled_with(qubit);

        let width = if calibration.measure_acquire.sync {
            calibration.pulse_measure.width
        } else {
            calibration.measure_acquire.width
        };
        let acquire = Acquire::new(
            devices.acquire_channel(qubit)?,
            width,
            mode,
            self.core().output_variable(output_variable)?,
            calibration.measure_acquire.delay,
        );
        let readout = Readout {
            measure_pulse: Instruction::MeasurePulse(Pulse::from_measure_settings(
                devices.measure_channel(qubit)?,
                &calibration.pulse_measure,
            )),
            acquire: acquire.clone(),
            qubit_channels: devices.qubit_channels(qubit)?,
            entangled_channels: channels_of(devices, &entangled)?,
        };

        let block = MeasurementBlock::scan(self.instructions());
        let merged = if block.is_full() {
            take_block_tail(self.core_mut().instructions_mut(), &block, &readout)
        } else {
            None
        };

        match merged {
            Some((final_sync, final_reset, post_processing)) => {
                debug!(
                    "Merging measurement of {} into preceding block ({} post-processing steps moved)",
                    qubit,
                    post_processing.len()
                );
                self.add([
                    readout.measure_pulse,
                    Instruction::Acquire(readout.acquire),
                    Instruction::Synchronize(final_sync),
                    Instruction::PhaseReset(final_reset),
                ])
                .add(post_processing);
            }
            None => {
                debug!("Emitting fresh measurement block for {}", qubit);
                self.add([
                    Instruction::Synchronize(Synchronize::new(readout.entangled_channels.iter().copied())),
                    readout.measure_pulse,
                    Instruction::Acquire(readout.acquire),
                    Instruction::Synchronize(Synchronize::new(readout.qubit_channels)),
                    Instruction::PhaseReset(PhaseReset::new(readout.entangled_channels)),
                ]);
            }
        }

        Ok(Acquired {
            builder: self,
            acquire,
        })
    }

    fn post_processing(
        &mut self,
        acquire: &Acquire,
        process: PostProcessType,
        axes: &[ProcessAxis],
        qubit: Option<QubitId>,
        args: Option<Vec<Complex64>>,
    ) -> BuilderResult<&mut Self> {
        let args = match args {
            Some(args) if args.iter().any(|a| *a != Complex64::new(0.0, 0.0)) => args,
            _ => default_args(self.model().devices(), acquire, process, qubit)?,
        };
        let step = PostProcessing::new(acquire, process, axes.to_vec(), args);
        Ok(self.add([Instruction::PostProcessing(step)]))
    }
}
