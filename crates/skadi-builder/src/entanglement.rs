//! Tracking of qubits coupled by earlier pulses.
//!
//! Every pulse added to a builder is traced through the device graph back to
//! the qubits it touches. Those qubits form one *co-occurrence group*, and
//! each member of the group is linked to every other member. Groups from
//! separate pulses are not closed transitively: if one pulse couples A and B
//! and another couples B and C, A and C stay unlinked.
//!
//! The map only ever grows.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use skadi_ir::{ChannelId, ComponentRef, DeviceGraph, Instruction, QubitId};

/// Entanglement map shared between a builder and its children.
///
/// The builders of one parent/child group must be driven from a single
/// thread, one at a time.
pub type SharedEntanglement = Rc<RefCell<EntanglementMap>>;

/// Qubit → qubits it has been coupled with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntanglementMap {
    links: FxHashMap<QubitId, BTreeSet<QubitId>>,
}

impl EntanglementMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Link every qubit of `group` with every other member (and itself).
    pub fn record(&mut self, group: &BTreeSet<QubitId>) {
        for qubit in group {
            self.links
                .entry(*qubit)
                .or_default()
                .extend(group.iter().copied());
        }
    }

    /// Qubits linked with `qubit`, if any were recorded.
    pub fn get(&self, qubit: QubitId) -> Option<&BTreeSet<QubitId>> {
        self.links.get(&qubit)
    }

    /// Qubits linked with `qubit`; empty if none were recorded.
    pub fn entangled_with(&self, qubit: QubitId) -> BTreeSet<QubitId> {
        self.links.get(&qubit).cloned().unwrap_or_default()
    }

    /// Whether `a` has been linked with `b`.
    pub fn contains(&self, a: QubitId, b: QubitId) -> bool {
        self.links.get(&a).is_some_and(|set| set.contains(&b))
    }

    /// Number of qubits with an entry.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Iterate over the entries.
    pub fn iter(&self) -> impl Iterator<Item = (QubitId, &BTreeSet<QubitId>)> {
        self.links.iter().map(|(q, set)| (*q, set))
    }

    /// Whether every entry of `self` is contained in the matching entry of `other`.
    pub fn is_subset_of(&self, other: &EntanglementMap) -> bool {
        self.links.iter().all(|(qubit, set)| {
            other
                .links
                .get(qubit)
                .is_some_and(|theirs| set.is_subset(theirs))
        })
    }
}

/// The co-occurrence group of an instruction: the qubits reached from its
/// channels. Only pulses produce a group; everything else yields an empty set.
pub fn co_occurrence(devices: &DeviceGraph, inst: &Instruction) -> BTreeSet<QubitId> {
    if !inst.is_pulse() {
        return BTreeSet::new();
    }
    co_occurring_qubits(devices, &inst.quantum_targets())
}

/// Walk `related_devices` outward from `channels` and collect the qubits
/// reached. Qubits end the walk; they are not expanded further.
///
/// Components missing from the graph contribute nothing.
pub fn co_occurring_qubits(devices: &DeviceGraph, channels: &[ChannelId]) -> BTreeSet<QubitId> {
    let mut qubits = BTreeSet::new();
    let mut visited: FxHashSet<ComponentRef> = FxHashSet::default();
    let mut stack: Vec<ComponentRef> = channels.iter().map(|&c| c.into()).collect();

    while let Some(component) = stack.pop() {
        if !visited.insert(component) {
            continue;
        }
        if let ComponentRef::Qubit(qubit) = component {
            qubits.insert(qubit);
            continue;
        }
        if let Ok(related) = devices.related_devices(component) {
            stack.extend(related.filter(|c| !visited.contains(c)));
        }
    }
    qubits
}

#[cfg(test)]
mod tests {
    use super::*;
    use skadi_hal::{CalibratedModel, HardwareModel};
    use skadi_ir::{ChannelType, Pulse, PulseShape, Synchronize};

    fn group(qubits: &[u32]) -> BTreeSet<QubitId> {
        qubits.iter().map(|&q| QubitId(q)).collect()
    }

    #[test]
    fn test_record_links_group_members() {
        let mut map = EntanglementMap::new();
        map.record(&group(&[0, 1]));
        assert!(map.contains(QubitId(0), QubitId(1)));
        assert!(map.contains(QubitId(1), QubitId(0)));
        assert!(map.contains(QubitId(0), QubitId(0)));
    }

    #[test]
    fn test_separate_groups_are_not_closed_transitively() {
        let mut map = EntanglementMap::new();
        map.record(&group(&[0, 1]));
        map.record(&group(&[1, 2]));

        assert_eq!(map.entangled_with(QubitId(1)), group(&[0, 1, 2]));
        assert!(!map.contains(QubitId(0), QubitId(2)));
        assert!(!map.contains(QubitId(2), QubitId(0)));
    }

    #[test]
    fn test_unknown_qubit_is_empty() {
        let map = EntanglementMap::new();
        assert!(map.entangled_with(QubitId(4)).is_empty());
        assert!(map.get(QubitId(4)).is_none());
    }

    #[test]
    fn test_drive_channel_reaches_its_qubit_only() {
        let model = CalibratedModel::linear(3).unwrap();
        let devices = model.devices();
        let drive = devices.drive_channel(QubitId(1)).unwrap();
        assert_eq!(co_occurring_qubits(devices, &[drive]), group(&[1]));
    }

    #[test]
    fn test_cross_resonance_reaches_both_qubits() {
        let model = CalibratedModel::linear(3).unwrap();
        let devices = model.devices();
        let cr = devices
            .pulse_channel(QubitId(1), ChannelType::CrossResonance, &[QubitId(2)])
            .unwrap();
        assert_eq!(co_occurring_qubits(devices, &[cr]), group(&[1, 2]));
    }

    #[test]
    fn test_readout_channels_reach_their_qubit() {
        let model = CalibratedModel::linear(2).unwrap();
        let devices = model.devices();
        let measure = devices.measure_channel(QubitId(0)).unwrap();
        let acquire = devices.acquire_channel(QubitId(0)).unwrap();
        assert_eq!(co_occurring_qubits(devices, &[measure, acquire]), group(&[0]));
    }

    #[test]
    fn test_only_pulses_form_groups() {
        let model = CalibratedModel::linear(2).unwrap();
        let devices = model.devices();
        let d0 = devices.drive_channel(QubitId(0)).unwrap();
        let d1 = devices.drive_channel(QubitId(1)).unwrap();

        let sync = Instruction::Synchronize(Synchronize::new([d0, d1]));
        assert!(co_occurrence(devices, &sync).is_empty());

        let pulse = Instruction::Pulse(Pulse::new(d0, PulseShape::Square, 1e-7, 0.1));
        assert_eq!(co_occurrence(devices, &pulse), group(&[0]));
    }

    #[test]
    fn test_unknown_channel_contributes_nothing() {
        let model = CalibratedModel::linear(1).unwrap();
        assert!(co_occurring_qubits(model.devices(), &[ChannelId(999)]).is_empty());
    }
}
