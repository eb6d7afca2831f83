//! The instruction container and composition engine.
//!
//! [`InstructionBuilder`] owns an ordered list of instructions, the set of
//! label names present in it and a handle on the (possibly shared)
//! entanglement map. Everything that appends goes through
//! [`BuilderBase::add`], which keeps the name set and the entanglement map in
//! step with the list.

use std::cell::{Ref, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::{instrument, trace, warn};

use skadi_hal::HardwareModel;
use skadi_ir::{
    ChannelId, ChannelSet, InlineResultsProcessing, Instruction, IrError, PhaseReset, QubitId,
};

use crate::entanglement::{self, EntanglementMap, SharedEntanglement};
use crate::error::BuilderResult;
use crate::label::{self, OUTPUT_PREFIX};

/// Something that can be added to a builder.
#[derive(Debug)]
pub enum Component {
    /// A single instruction, appended as is.
    Instruction(Instruction),
    /// A nested builder, merged on encounter.
    Builder(InstructionBuilder),
}

impl From<Instruction> for Component {
    fn from(inst: Instruction) -> Self {
        Component::Instruction(inst)
    }
}

impl From<InstructionBuilder> for Component {
    fn from(builder: InstructionBuilder) -> Self {
        Component::Builder(builder)
    }
}

/// The base builder tier.
///
/// It supports composition and classical control flow; every gate, pulse and
/// measurement operation reports [`BuilderError::Unsupported`]. Hardware
/// tiers such as [`QuantumInstructionBuilder`] wrap it and override those.
///
/// [`BuilderError::Unsupported`]: crate::BuilderError::Unsupported
/// [`QuantumInstructionBuilder`]: crate::QuantumInstructionBuilder
pub struct InstructionBuilder {
    model: Arc<dyn HardwareModel>,
    instructions: Vec<Instruction>,
    /// Names of the labels in `instructions`.
    existing_names: FxHashSet<String>,
    /// Names inherited from a parent; avoided but not owned.
    reserved_names: FxHashSet<String>,
    entanglement: SharedEntanglement,
}

impl std::fmt::Debug for InstructionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstructionBuilder")
            .field("model", &self.model.name())
            .field("instructions", &self.instructions.len())
            .field("existing_names", &self.existing_names)
            .finish()
    }
}

impl InstructionBuilder {
    /// Create an empty builder bound to `model`.
    pub fn new(model: Arc<dyn HardwareModel>) -> Self {
        Self {
            model,
            instructions: vec![],
            existing_names: FxHashSet::default(),
            reserved_names: FxHashSet::default(),
            entanglement: Rc::new(RefCell::new(EntanglementMap::new())),
        }
    }

    /// A fresh builder for a nested scope.
    ///
    /// The child shares this builder's entanglement map. With `inherit`, the
    /// child also avoids every name already used here when generating names.
    pub fn child_builder(&self, inherit: bool) -> Self {
        let mut child = Self::new(Arc::clone(&self.model));
        child.entanglement = Rc::clone(&self.entanglement);
        if inherit {
            child.reserved_names = self
                .existing_names
                .union(&self.reserved_names)
                .cloned()
                .collect();
        }
        child
    }

    /// Rebuild a builder from [`BuilderBase::serialize`] output.
    ///
    /// The instructions are re-added one by one, so the name set and the
    /// entanglement map are restored along with them.
    pub fn deserialize(blob: &str, model: Arc<dyn HardwareModel>) -> BuilderResult<Self> {
        let instructions: Vec<Instruction> = serde_json::from_str(blob)?;
        let mut builder = Self::new(model);
        builder.add(instructions);
        Ok(builder)
    }

    /// Consume the builder and return its instructions.
    pub fn into_instructions(self) -> Vec<Instruction> {
        self.instructions
    }

    pub(crate) fn instructions_mut(&mut self) -> &mut Vec<Instruction> {
        &mut self.instructions
    }

    /// Append one instruction, updating names and entanglement.
    fn push(&mut self, inst: Instruction) {
        let group = entanglement::co_occurrence(self.model.devices(), &inst);
        if !group.is_empty() {
            trace!("Pulse on {:?} couples qubits {:?}", inst.quantum_targets(), group);
            self.entanglement.borrow_mut().record(&group);
        }
        if let Some(name) = inst.label_name() {
            self.existing_names.insert(name.to_string());
        }
        self.instructions.push(inst);
    }

    fn is_taken(&self, name: &str) -> bool {
        self.existing_names.contains(name) || self.reserved_names.contains(name)
    }

    fn fresh_name(&self) -> String {
        label::generate_name(&[&self.existing_names, &self.reserved_names])
    }

    /// Output variable for a new acquisition.
    ///
    /// Neither a requested nor a generated name may be a name of this
    /// builder or the output variable of an earlier acquisition.
    pub(crate) fn output_variable(&self, requested: Option<&str>) -> BuilderResult<String> {
        let outputs: FxHashSet<&str> = self
            .instructions
            .iter()
            .filter_map(|inst| inst.as_acquire())
            .map(|acquire| acquire.output_variable.as_str())
            .collect();

        if let Some(name) = requested {
            if self.is_taken(name) || outputs.contains(name) {
                return Err(IrError::DuplicateName(name.to_string()).into());
            }
            return Ok(name.to_string());
        }

        Ok(label::generate_name_with(OUTPUT_PREFIX, outputs.len(), |name| {
            self.is_taken(name) || outputs.contains(name)
        }))
    }
}

/// Container, composition and classical control flow, shared by all tiers.
///
/// Implementors only provide access to the underlying [`InstructionBuilder`];
/// every operation returns the implementor itself so chains stay on the
/// caller's tier.
pub trait BuilderBase {
    /// The underlying base builder.
    fn core(&self) -> &InstructionBuilder;

    /// The underlying base builder, mutably.
    fn core_mut(&mut self) -> &mut InstructionBuilder;

    /// The hardware model this builder is bound to.
    fn model(&self) -> &Arc<dyn HardwareModel> {
        &self.core().model
    }

    /// The instructions added so far.
    fn instructions(&self) -> &[Instruction] {
        &self.core().instructions
    }

    /// Number of instructions.
    fn len(&self) -> usize {
        self.core().instructions.len()
    }

    /// Whether no instruction has been added.
    fn is_empty(&self) -> bool {
        self.core().instructions.is_empty()
    }

    /// Names of the labels in this builder.
    fn existing_names(&self) -> &FxHashSet<String> {
        &self.core().existing_names
    }

    /// The entanglement map, shared with parent and child builders.
    fn entanglement(&self) -> Ref<'_, EntanglementMap> {
        self.core().entanglement.borrow()
    }

    /// Add instructions and nested builders, in order.
    ///
    /// Nested builders are merged through [`BuilderBase::merge_builder`] as
    /// they are encountered. An empty input leaves the builder unchanged.
    fn add<I>(&mut self, components: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Component>,
    {
        for component in components {
            match component.into() {
                Component::Instruction(inst) => self.core_mut().push(inst),
                Component::Builder(other) => {
                    self.merge_builder(other);
                }
            }
        }
        self
    }

    /// Merge another builder's instructions into this one.
    ///
    /// Label names present in both builders are renamed in `other` before its
    /// instructions are appended; a warning is logged for each. Never fails.
    #[instrument(skip_all, fields(incoming = other.instructions.len()))]
    fn merge_builder(&mut self, mut other: InstructionBuilder) -> &mut Self {
        let core = self.core_mut();
        let clashes: BTreeSet<String> = other
            .existing_names
            .intersection(&core.existing_names)
            .cloned()
            .collect();
        core.existing_names.extend(other.existing_names.drain());

        if !clashes.is_empty() {
            let renamed = label::rename_clashes(&mut other.instructions, &clashes, || {
                let name = core.fresh_name();
                core.existing_names.insert(name.clone());
                name
            });
            for old in &clashes {
                match renamed.get(old) {
                    Some(new) => warn!("Label name '{old}' already exists, renamed to '{new}'"),
                    None => warn!("Label name '{old}' already exists"),
                }
            }
        }

        let incoming = std::mem::take(&mut other.instructions);
        self.add(incoming)
    }

    /// A label instruction with a unique name, not yet added.
    ///
    /// A requested name that is already in use is replaced by a generated
    /// one and a warning is logged.
    fn create_label(&self, name: Option<&str>) -> Instruction {
        let core = self.core();
        match name {
            None => Instruction::label(core.fresh_name()),
            Some(requested) if core.is_taken(requested) => {
                let replacement = core.fresh_name();
                warn!("Label name '{requested}' already exists, replacing with '{replacement}'");
                Instruction::label(replacement)
            }
            Some(requested) => Instruction::label(requested),
        }
    }

    /// A free name for this builder, without creating a label.
    fn create_name(&self) -> String {
        self.core().fresh_name()
    }

    /// Jump to `target`, optionally guarded by `condition`.
    fn jump(&mut self, target: impl Into<String>, condition: Option<String>) -> &mut Self {
        self.add([Instruction::Jump {
            target: target.into(),
            condition,
        }])
    }

    /// Repeat the program `count` times.
    fn repeat(&mut self, count: u64, repetition_period: Option<f64>) -> &mut Self {
        self.add([Instruction::Repeat {
            count,
            repetition_period,
        }])
    }

    /// Assign `value` to the variable `name`.
    fn assign(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> &mut Self {
        self.add([Instruction::Assign {
            name: name.into(),
            value: value.into(),
        }])
    }

    /// Return `variables` to the caller.
    fn returns<S: Into<String>>(&mut self, variables: impl IntoIterator<Item = S>) -> &mut Self {
        self.add([Instruction::Return {
            variables: variables.into_iter().map(Into::into).collect(),
        }])
    }

    /// Format the results of `variable`.
    fn results_processing(
        &mut self,
        variable: impl Into<String>,
        format: InlineResultsProcessing,
    ) -> &mut Self {
        self.add([Instruction::ResultsProcessing {
            variable: variable.into(),
            format,
        }])
    }

    /// Update `attribute` of a channel at runtime.
    fn device_assign(
        &mut self,
        target: ChannelId,
        attribute: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> &mut Self {
        self.add([Instruction::DeviceUpdate {
            target,
            attribute: attribute.into(),
            value: value.into(),
        }])
    }

    /// Actively reset `qubits`, then reset their phase tracking.
    fn reset(&mut self, qubits: &[QubitId]) -> BuilderResult<&mut Self> {
        let devices = self.core().model.devices();
        let drives = qubits
            .iter()
            .map(|&q| devices.drive_channel(q))
            .collect::<Result<ChannelSet, _>>()?;
        let mut channels = ChannelSet::new();
        for &qubit in qubits {
            channels.extend(devices.qubit_channels(qubit)?);
        }
        Ok(self.add([
            Instruction::Reset { channels: drives },
            PhaseReset { channels }.into(),
        ]))
    }

    /// Take the instructions out and reset the builder.
    fn splice(&mut self) -> Vec<Instruction> {
        let instructions = std::mem::take(&mut self.core_mut().instructions);
        self.clear();
        instructions
    }

    /// Reset instructions, names and entanglement.
    ///
    /// The hardware model binding is kept. Child builders created earlier keep
    /// the old entanglement map.
    fn clear(&mut self) {
        let core = self.core_mut();
        core.instructions.clear();
        core.existing_names.clear();
        core.reserved_names.clear();
        core.entanglement = Rc::new(RefCell::new(EntanglementMap::new()));
    }

    /// The instruction sequence as JSON.
    fn serialize(&self) -> BuilderResult<String> {
        Ok(serde_json::to_string_pretty(&self.core().instructions)?)
    }
}

impl BuilderBase for InstructionBuilder {
    fn core(&self) -> &InstructionBuilder {
        self
    }

    fn core_mut(&mut self) -> &mut InstructionBuilder {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skadi_hal::CalibratedModel;
    use skadi_ir::{Pulse, PulseShape};

    fn model(num_qubits: u32) -> Arc<dyn HardwareModel> {
        Arc::new(CalibratedModel::linear(num_qubits).unwrap())
    }

    fn drive_pulse(model: &Arc<dyn HardwareModel>, qubit: u32) -> Instruction {
        let channel = model.devices().drive_channel(QubitId(qubit)).unwrap();
        Instruction::Pulse(Pulse::new(channel, PulseShape::Square, 1e-7, 0.1))
    }

    #[test]
    fn test_add_tracks_label_names() {
        let mut builder = InstructionBuilder::new(model(1));
        builder.add([Instruction::label("start"), Instruction::label("end")]);
        assert_eq!(builder.len(), 2);
        assert!(builder.existing_names().contains("start"));
        assert!(builder.existing_names().contains("end"));
    }

    #[test]
    fn test_add_nothing_is_noop() {
        let mut builder = InstructionBuilder::new(model(1));
        builder.add(Vec::<Instruction>::new());
        assert!(builder.is_empty());
        assert!(builder.existing_names().is_empty());
    }

    #[test]
    fn test_add_records_entanglement_for_pulses_only() {
        let model = model(2);
        let mut builder = InstructionBuilder::new(Arc::clone(&model));
        let d0 = model.devices().drive_channel(QubitId(0)).unwrap();
        let d1 = model.devices().drive_channel(QubitId(1)).unwrap();

        builder.add([Instruction::Synchronize(skadi_ir::Synchronize::new([d0, d1]))]);
        assert!(builder.entanglement().is_empty());

        builder.add([drive_pulse(&model, 0)]);
        assert!(builder.entanglement().contains(QubitId(0), QubitId(0)));
        assert!(!builder.entanglement().contains(QubitId(0), QubitId(1)));
    }

    #[test]
    fn test_nested_builder_is_merged_in_place() {
        let model = model(1);
        let mut parent = InstructionBuilder::new(Arc::clone(&model));
        let mut child = parent.child_builder(false);
        child.add([Instruction::label("inner")]);

        parent.add([
            Component::from(Instruction::label("before")),
            Component::from(child),
            Component::from(Instruction::label("after")),
        ]);

        let names: Vec<_> = parent
            .instructions()
            .iter()
            .filter_map(Instruction::label_name)
            .collect();
        assert_eq!(names, ["before", "inner", "after"]);
    }

    #[test]
    fn test_merge_renames_clashing_labels() {
        let model = model(1);
        let mut a = InstructionBuilder::new(Arc::clone(&model));
        a.add([Instruction::label("q0")]);
        let mut b = InstructionBuilder::new(Arc::clone(&model));
        b.add([Instruction::label("q0")]);
        b.jump("q0", None);
        let b_names = b.existing_names().clone();

        a.merge_builder(b);

        let labels: Vec<_> = a
            .instructions()
            .iter()
            .filter_map(Instruction::label_name)
            .collect();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0], "q0");
        assert_ne!(labels[1], "q0");
        assert!(!b_names.contains(labels[1]));
        assert!(matches!(
            &a.instructions()[2],
            Instruction::Jump { target, .. } if target == labels[1]
        ));
        assert_eq!(a.existing_names().len(), 2);
    }

    #[test]
    fn test_child_shares_entanglement() {
        let model = model(2);
        let parent = InstructionBuilder::new(Arc::clone(&model));
        let mut child = parent.child_builder(false);
        child.add([drive_pulse(&model, 1)]);
        assert!(parent.entanglement().contains(QubitId(1), QubitId(1)));
    }

    #[test]
    fn test_inherited_names_are_avoided() {
        let mut parent = InstructionBuilder::new(model(1));
        let label = parent.create_label(None);
        parent.add([label]);

        let child = parent.child_builder(true);
        let name = child.create_name();
        assert!(!parent.existing_names().contains(&name));
        assert!(child.existing_names().is_empty());
    }

    #[test]
    fn test_create_label_replaces_existing_name() {
        let mut builder = InstructionBuilder::new(model(1));
        builder.add([Instruction::label("loop")]);
        let label = builder.create_label(Some("loop"));
        let name = label.label_name().unwrap();
        assert_ne!(name, "loop");
        assert!(!builder.existing_names().contains(name));
    }

    #[test]
    fn test_requested_output_variable_must_be_free() {
        let mut builder = InstructionBuilder::new(model(1));
        builder.add([Instruction::label("taken")]);
        assert!(builder.output_variable(Some("taken")).is_err());
        assert_eq!(builder.output_variable(Some("free")).unwrap(), "free");
        assert!(builder.output_variable(None).unwrap().starts_with(OUTPUT_PREFIX));
    }

    #[test]
    fn test_splice_returns_and_clears() {
        let model = model(1);
        let mut builder = InstructionBuilder::new(Arc::clone(&model));
        builder.add([Instruction::label("l"), drive_pulse(&model, 0)]);
        let taken = builder.splice();
        assert_eq!(taken.len(), 2);
        assert!(builder.is_empty());
        assert!(builder.existing_names().is_empty());
        assert!(builder.entanglement().is_empty());
    }

    #[test]
    fn test_reset_emits_reset_then_phase_reset() {
        let mut builder = InstructionBuilder::new(model(2));
        builder.reset(&[QubitId(0), QubitId(1)]).unwrap();
        assert_eq!(builder.len(), 2);
        assert!(matches!(&builder.instructions()[0], Instruction::Reset { channels } if channels.len() == 2));
        assert!(matches!(builder.instructions()[1], Instruction::PhaseReset(_)));
    }

    #[test]
    fn test_serialize_roundtrip_restores_state() {
        let model = model(2);
        let mut builder = InstructionBuilder::new(Arc::clone(&model));
        builder
            .repeat(1000, Some(100e-6))
            .add([Instruction::label("top"), drive_pulse(&model, 1)])
            .assign("count", 3)
            .jump("top", Some("count > 0".into()))
            .returns(["count"]);

        let blob = builder.serialize().unwrap();
        let restored = InstructionBuilder::deserialize(&blob, Arc::clone(&model)).unwrap();
        assert_eq!(restored.instructions(), builder.instructions());
        assert_eq!(restored.existing_names(), builder.existing_names());
        assert_eq!(*restored.entanglement(), *builder.entanglement());
    }
}
