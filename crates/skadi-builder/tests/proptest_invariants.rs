//! Property-based tests for builder invariants.
//!
//! Random programs are assembled from gates, labels, jumps and nested
//! builders, then checked for:
//! - label names matching the name set, with no duplicates
//! - the entanglement map only ever growing
//! - merging being associative in the resulting instruction kinds

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use skadi_builder::prelude::*;
use skadi_builder::{EntanglementMap, QuantumInstructionBuilder};
use skadi_hal::{CalibratedModel, HardwareModel};
use skadi_ir::{Instruction, InstructionKind, QubitId};

const NUM_QUBITS: u32 = 3;

fn model() -> Arc<dyn HardwareModel> {
    Arc::new(CalibratedModel::linear(NUM_QUBITS).unwrap())
}

/// Operations that can be applied to a builder.
#[derive(Debug, Clone)]
enum Op {
    X(u32),
    Had(u32),
    Cnot(u32, u32),
    Label(u8),
    Jump(u8),
    MeasureMeanZ(u32),
    Nested(Vec<Op>),
}

impl Op {
    fn apply(&self, builder: &mut QuantumInstructionBuilder) {
        match self {
            Op::X(q) => {
                let _ = builder.x(QubitId(*q), None);
            }
            Op::Had(q) => {
                let _ = builder.had(QubitId(*q));
            }
            Op::Cnot(c, t) => {
                let _ = builder.cnot(QubitId(*c), QubitId(*t));
            }
            Op::Label(n) => {
                // Small name space so clashes are common.
                let name = format!("l{n}");
                let label = builder.create_label(Some(name.as_str()));
                builder.add([label]);
            }
            Op::Jump(n) => {
                builder.jump(format!("l{n}"), None);
            }
            Op::MeasureMeanZ(q) => {
                let _ = builder.measure_mean_z(QubitId(*q), None, None);
            }
            Op::Nested(ops) => {
                let mut child = builder.child_builder(false);
                for op in ops {
                    op.apply(&mut child);
                }
                builder.add([child]);
            }
        }
    }
}

fn arb_leaf_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..NUM_QUBITS).prop_map(Op::X),
        (0..NUM_QUBITS).prop_map(Op::Had),
        // Only neighbours are coupled on a linear device.
        (0..NUM_QUBITS - 1).prop_map(|q| Op::Cnot(q, q + 1)),
        (0_u8..4).prop_map(Op::Label),
        (0_u8..4).prop_map(Op::Jump),
        (0..NUM_QUBITS).prop_map(Op::MeasureMeanZ),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    arb_leaf_op().prop_recursive(2, 24, 6, |inner| {
        prop_oneof![
            3 => arb_leaf_op(),
            1 => prop::collection::vec(inner, 0..6).prop_map(Op::Nested),
        ]
    })
}

fn arb_program() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(arb_op(), 0..12)
}

fn build(ops: &[Op]) -> QuantumInstructionBuilder {
    let mut builder = QuantumInstructionBuilder::new(model());
    for op in ops {
        op.apply(&mut builder);
    }
    builder
}

fn kinds(builder: &QuantumInstructionBuilder) -> Vec<InstructionKind> {
    builder.instructions().iter().map(Instruction::kind).collect()
}

proptest! {
    /// The name set always equals the set of label names, and no label
    /// name appears twice.
    #[test]
    fn test_names_match_labels(ops in arb_program()) {
        let builder = build(&ops);

        let labels: Vec<&str> = builder
            .instructions()
            .iter()
            .filter_map(Instruction::label_name)
            .collect();
        let unique: BTreeSet<&str> = labels.iter().copied().collect();
        prop_assert_eq!(unique.len(), labels.len(), "duplicate label names");

        let names: BTreeSet<&str> = builder.existing_names().iter().map(String::as_str).collect();
        prop_assert_eq!(names, unique);
    }

    /// Recorded couplings are never dropped while a program grows.
    #[test]
    fn test_entanglement_only_grows(ops in arb_program()) {
        let mut builder = QuantumInstructionBuilder::new(model());
        let mut previous = EntanglementMap::new();
        for op in &ops {
            op.apply(&mut builder);
            let current = builder.entanglement().clone();
            prop_assert!(previous.is_subset_of(&current));
            previous = current;
        }
    }

    /// (a + b) + c and a + (b + c) produce the same instruction kinds and
    /// the same number of labels.
    #[test]
    fn test_merge_is_associative(a in arb_program(), b in arb_program(), c in arb_program()) {
        let mut left = build(&a);
        left.add([build(&b)]);
        left.add([build(&c)]);

        let mut right_tail = build(&b);
        right_tail.add([build(&c)]);
        let mut right = build(&a);
        right.add([right_tail]);

        prop_assert_eq!(kinds(&left), kinds(&right));
        prop_assert_eq!(left.existing_names().len(), right.existing_names().len());
    }
}
