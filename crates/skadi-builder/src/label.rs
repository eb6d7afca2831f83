//! Unique names for labels and output variables.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::{FxHashMap, FxHashSet};
use skadi_ir::Instruction;

/// Prefix of generated label names.
pub const LABEL_PREFIX: &str = "label";

/// Prefix of generated acquisition output variables.
pub const OUTPUT_PREFIX: &str = "out";

/// Generate a label name that is in none of `taken`.
pub fn generate_name(taken: &[&FxHashSet<String>]) -> String {
    let start = taken.iter().map(|set| set.len()).sum();
    generate_name_with(LABEL_PREFIX, start, |name| {
        taken.iter().any(|set| set.contains(name))
    })
}

/// Generate `{prefix}_{n}` for the first `n >= start` that is not taken.
///
/// Starting from the size of the taken set keeps the search short when
/// names were generated by this function in the first place.
pub fn generate_name_with(prefix: &str, start: usize, is_taken: impl Fn(&str) -> bool) -> String {
    let mut counter = start;
    loop {
        let candidate = format!("{prefix}_{counter}");
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Rename every label (and jump referring to it) whose name is in `clashes`.
///
/// `fresh` is called once per distinct clashing name; all occurrences of that
/// name receive the same replacement. Returns the replacements made.
pub(crate) fn rename_clashes(
    instructions: &mut [Instruction],
    clashes: &BTreeSet<String>,
    mut fresh: impl FnMut() -> String,
) -> BTreeMap<String, String> {
    let mut cache: FxHashMap<String, String> = FxHashMap::default();
    let mut replacement = |old: &str| -> Option<String> {
        if !clashes.contains(old) {
            return None;
        }
        Some(cache.entry(old.to_string()).or_insert_with(&mut fresh).clone())
    };

    let mut renamed = BTreeMap::new();
    for inst in instructions.iter_mut() {
        match inst {
            Instruction::Label { name } => {
                if let Some(new) = replacement(name) {
                    renamed.insert(std::mem::replace(name, new.clone()), new);
                }
            }
            Instruction::Jump { target, .. } => {
                if let Some(new) = replacement(target) {
                    *target = new;
                }
            }
            _ => {}
        }
    }
    renamed
}
