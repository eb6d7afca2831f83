//! Integration tests for builder composition.
//!
//! These tests cover nesting and merging of builders: label names stay
//! unique, clashes are renamed and reported, and the entanglement map is
//! shared between a parent and its children.

use std::io;
use std::sync::{Arc, Mutex};

use skadi_builder::prelude::*;
use skadi_builder::{BuilderError, Component, InstructionBuilder, QuantumInstructionBuilder};
use skadi_hal::{CalibratedModel, HardwareModel};
use skadi_ir::{Instruction, QubitId};

fn model(num_qubits: u32) -> Arc<dyn HardwareModel> {
    Arc::new(CalibratedModel::linear(num_qubits).unwrap())
}

/// Helper: label names in program order.
fn labels(instructions: &[Instruction]) -> Vec<String> {
    instructions
        .iter()
        .filter_map(|inst| inst.label_name().map(str::to_string))
        .collect()
}

/// Helper: jump targets in program order.
fn jump_targets(instructions: &[Instruction]) -> Vec<String> {
    instructions
        .iter()
        .filter_map(|inst| match inst {
            Instruction::Jump { target, .. } => Some(target.clone()),
            _ => None,
        })
        .collect()
}

/// In-memory sink for formatted log output.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a subscriber writing warnings into a buffer.
fn capture_warnings(f: impl FnOnce()) -> String {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    buffer.contents()
}

#[test]
fn test_add_keeps_presented_order() {
    let m = model(2);
    let mut parent = InstructionBuilder::new(Arc::clone(&m));
    let mut child = parent.child_builder(false);
    child.assign("b", 2);

    parent.assign("a", 1);
    parent.add([
        Component::from(child),
        Component::from(Instruction::Assign {
            name: "c".into(),
            value: 3.into(),
        }),
    ]);

    let names: Vec<_> = parent
        .instructions()
        .iter()
        .map(|inst| match inst {
            Instruction::Assign { name, .. } => name.as_str(),
            _ => "",
        })
        .collect();
    assert_eq!(names, ["a", "b", "c"]);
}

#[test]
fn test_add_empty_is_noop() {
    let mut builder = InstructionBuilder::new(model(1));
    builder.add(Vec::<Instruction>::new());
    assert!(builder.is_empty());
    assert!(builder.existing_names().is_empty());
}

#[test]
fn test_merge_renames_clashing_labels_and_jumps() {
    let m = model(1);
    let mut parent = InstructionBuilder::new(Arc::clone(&m));
    parent.add([Instruction::label("loop")]);

    let mut child = InstructionBuilder::new(Arc::clone(&m));
    child
        .add([Instruction::label("loop")])
        .jump("loop", Some("x < 10".into()));

    let log = capture_warnings(|| {
        parent.add([child]);
    });

    let names = labels(parent.instructions());
    assert_eq!(names.len(), 2);
    assert_eq!(names[0], "loop");
    assert_ne!(names[1], "loop");
    assert_eq!(jump_targets(parent.instructions()), [names[1].clone()]);

    assert_eq!(log.matches("already exists").count(), 1);
    assert!(log.contains("'loop'"));
}

#[test]
fn test_merge_warns_once_per_clash() {
    let m = model(1);
    let mut parent = InstructionBuilder::new(Arc::clone(&m));
    parent.add([Instruction::label("a"), Instruction::label("b")]);

    let mut child = InstructionBuilder::new(Arc::clone(&m));
    child.add([
        Instruction::label("a"),
        Instruction::label("b"),
        Instruction::label("c"),
    ]);

    let log = capture_warnings(|| {
        parent.merge_builder(child);
    });

    assert_eq!(log.matches("already exists").count(), 2);
    let names = labels(parent.instructions());
    assert_eq!(names.len(), 5);
    let unique: std::collections::BTreeSet<_> = names.iter().collect();
    assert_eq!(unique.len(), 5);
    assert_eq!(parent.existing_names().len(), 5);
}

#[test]
fn test_merge_without_clash_is_silent() {
    let m = model(1);
    let mut parent = InstructionBuilder::new(Arc::clone(&m));
    parent.add([Instruction::label("start")]);
    let mut child = InstructionBuilder::new(Arc::clone(&m));
    child.add([Instruction::label("end")]);

    let log = capture_warnings(|| {
        parent.add([child]);
    });
    assert!(log.is_empty());
    assert_eq!(labels(parent.instructions()), ["start", "end"]);
}

#[test]
fn test_inheriting_child_avoids_parent_names() {
    let m = model(1);
    let mut parent = InstructionBuilder::new(Arc::clone(&m));
    let first = parent.create_label(None);
    parent.add([first]);

    let mut child = parent.child_builder(true);
    let label = child.create_label(None);
    child.add([label]);

    let log = capture_warnings(|| {
        parent.add([child]);
    });
    assert!(log.is_empty());
    assert_eq!(parent.existing_names().len(), 2);
}

#[test]
fn test_create_label_replaces_taken_name() {
    let mut builder = InstructionBuilder::new(model(1));
    builder.add([Instruction::label("exit")]);

    let mut label = None;
    let log = capture_warnings(|| {
        label = Some(builder.create_label(Some("exit")));
    });
    let name = label.unwrap().label_name().unwrap().to_string();
    assert_ne!(name, "exit");
    assert!(log.contains("'exit'"));

    // Creating a label does not register it.
    assert_eq!(builder.existing_names().len(), 1);
}

#[test]
fn test_child_shares_entanglement() {
    let m = model(2);
    let parent = QuantumInstructionBuilder::new(Arc::clone(&m));
    let mut child = parent.child_builder(false);
    child.cnot(QubitId(0), QubitId(1)).unwrap();

    assert!(parent.entanglement().contains(QubitId(0), QubitId(1)));
}

#[test]
fn test_clear_detaches_entanglement_from_children() {
    let m = model(2);
    let mut parent = QuantumInstructionBuilder::new(Arc::clone(&m));
    let mut child = parent.child_builder(false);
    parent.clear();

    child.cnot(QubitId(0), QubitId(1)).unwrap();
    assert!(parent.entanglement().is_empty());
    assert!(child.entanglement().contains(QubitId(1), QubitId(0)));
}

#[test]
fn test_splice_empties_builder() {
    let m = model(2);
    let mut qb = QuantumInstructionBuilder::new(m);
    qb.x(QubitId(0), None).unwrap();
    qb.add([Instruction::label("end")]);

    let taken = qb.splice();
    assert_eq!(taken.len(), 2);
    assert!(qb.is_empty());
    assert!(qb.existing_names().is_empty());
    assert!(qb.entanglement().is_empty());
}

#[test]
fn test_serialize_roundtrip_restores_state() {
    let m = model(2);
    let mut qb = QuantumInstructionBuilder::new(Arc::clone(&m));
    qb.cnot(QubitId(0), QubitId(1)).unwrap();
    qb.add([Instruction::label("done")]).repeat(1000, Some(1e-4));

    let blob = qb.serialize().unwrap();
    let restored = QuantumInstructionBuilder::deserialize(&blob, m).unwrap();

    assert_eq!(restored.instructions(), qb.instructions());
    assert_eq!(restored.existing_names(), qb.existing_names());
    assert_eq!(*restored.entanglement(), *qb.entanglement());
}

#[test]
fn test_deserialize_rejects_garbage() {
    let err = InstructionBuilder::deserialize("not json", model(1)).unwrap_err();
    assert!(matches!(err, BuilderError::Serialization(_)));
}

#[test]
fn test_quantum_builder_nests_into_base() {
    let m = model(2);
    let mut base = InstructionBuilder::new(Arc::clone(&m));
    let mut qb = QuantumInstructionBuilder::new(Arc::clone(&m));
    qb.x(QubitId(1), None).unwrap();

    base.add([qb]);
    assert_eq!(base.len(), 1);
    assert!(base.entanglement().contains(QubitId(1), QubitId(1)));
}

#[test]
fn test_reset_targets_drive_then_all_channels() {
    let m = model(2);
    let mut qb = QuantumInstructionBuilder::new(Arc::clone(&m));
    qb.reset(&[QubitId(0), QubitId(1)]).unwrap();

    let devices = m.devices();
    match qb.instructions() {
        [Instruction::Reset { channels }, Instruction::PhaseReset(reset)] => {
            assert_eq!(channels.len(), 2);
            assert!(channels.contains(devices.drive_channel(QubitId(0)).unwrap()));
            for qubit in [QubitId(0), QubitId(1)] {
                for channel in devices.qubit_channels(qubit).unwrap() {
                    assert!(reset.channels.contains(channel));
                }
            }
        }
        other => panic!("unexpected reset sequence: {other:?}"),
    }
}
