//! Device components and the relationship graph that connects them.
//!
//! Qubits, resonators, physical lines and pulse channels are stored in a
//! [`DeviceGraph`] arena and addressed by typed ids. Identity is by id, so
//! instructions can refer to channels without owning them.

use std::fmt;

use num_complex::Complex64;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::instruction::PulseShape;

/// Unique identifier for a qubit within a device graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QubitId(pub u32);

impl fmt::Display for QubitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.0)
    }
}

impl From<u32> for QubitId {
    fn from(id: u32) -> Self {
        QubitId(id)
    }
}

/// Unique identifier for a pulse channel within a device graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CH{}", self.0)
    }
}

/// Unique identifier for a readout resonator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResonatorId(pub u32);

/// Unique identifier for a physical control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhysicalChannelId(pub u32);

/// The role a pulse channel plays for its qubit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    /// Single-qubit drive line.
    Drive,
    /// Readout stimulus line.
    Measure,
    /// Readout capture line.
    Acquire,
    /// Cross-resonance drive towards a coupled qubit.
    CrossResonance,
    /// Cancellation tone accompanying a cross-resonance drive.
    CrossResonanceCancellation,
    /// Drive addressing the second excited state.
    SecondState,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelType::Drive => "drive",
            ChannelType::Measure => "measure",
            ChannelType::Acquire => "acquire",
            ChannelType::CrossResonance => "cross_resonance",
            ChannelType::CrossResonanceCancellation => "cross_resonance_cancellation",
            ChannelType::SecondState => "second_state",
        };
        f.write_str(name)
    }
}

/// A reference to any node of the device graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentRef {
    /// A qubit.
    Qubit(QubitId),
    /// A readout resonator.
    Resonator(ResonatorId),
    /// A physical control line.
    PhysicalChannel(PhysicalChannelId),
    /// A logical pulse channel.
    PulseChannel(ChannelId),
}

impl From<QubitId> for ComponentRef {
    fn from(id: QubitId) -> Self {
        ComponentRef::Qubit(id)
    }
}

impl From<ChannelId> for ComponentRef {
    fn from(id: ChannelId) -> Self {
        ComponentRef::PulseChannel(id)
    }
}

/// Baseband oscillator feeding a physical line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseband {
    /// Local oscillator frequency in Hz.
    pub frequency: f64,
    /// Intermediate frequency in Hz.
    pub if_frequency: f64,
}

/// A physical control line (one AWG output or digitiser input).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalChannel {
    /// Identifier.
    pub id: PhysicalChannelId,
    /// Human-readable name, e.g. `"CH1"`.
    pub name: String,
    /// Sample period in seconds.
    pub sample_time: f64,
    /// Baseband oscillator.
    pub baseband: Baseband,
    /// Resonator read out through this line, if any.
    pub resonator: Option<ResonatorId>,
}

/// A logical pulse channel multiplexed onto a physical line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseChannel {
    /// Identifier.
    pub id: ChannelId,
    /// Role of the channel.
    pub channel_type: ChannelType,
    /// Physical line carrying this channel.
    pub physical_channel: PhysicalChannelId,
    /// Carrier frequency in Hz.
    pub frequency: f64,
    /// Whether the intermediate frequency is fixed by the baseband.
    pub fixed_if: bool,
    /// Complex amplitude scale applied to every pulse.
    pub scale: Complex64,
    /// Qubit or resonator owning the channel.
    pub owner: ComponentRef,
    /// Other qubits this channel couples to (cross-resonance targets).
    pub auxiliary_qubits: Vec<QubitId>,
}

/// A readout resonator coupled to one qubit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resonator {
    /// Identifier.
    pub id: ResonatorId,
    /// Physical line driving the resonator.
    pub physical_channel: PhysicalChannelId,
    /// Readout stimulus channel.
    pub measure_channel: ChannelId,
    /// Readout capture channel.
    pub acquire_channel: ChannelId,
    /// The qubit read out by this resonator.
    pub qubit: Option<QubitId>,
}

/// Shape parameters of a qubit's readout pulse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurePulseSettings {
    /// Envelope shape.
    pub shape: PulseShape,
    /// Pulse width in seconds.
    pub width: f64,
    /// Amplitude.
    pub amp: f64,
    /// Phase offset in radians.
    #[serde(default)]
    pub phase: f64,
    /// DRAG coefficient.
    #[serde(default)]
    pub drag: f64,
    /// Rise time for soft-edged shapes.
    #[serde(default)]
    pub rise: f64,
}

impl Default for MeasurePulseSettings {
    fn default() -> Self {
        Self {
            shape: PulseShape::Square,
            width: 1.0e-6,
            amp: 0.25,
            phase: 0.0,
            drag: 0.0,
            rise: 0.0,
        }
    }
}

/// Acquisition window configuration of a qubit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquireSettings {
    /// Integration width in seconds.
    pub width: f64,
    /// Delay between measure pulse start and acquisition start.
    pub delay: f64,
    /// Use the measure pulse width instead of `width`.
    pub sync: bool,
    /// Apply integration weights.
    #[serde(default)]
    pub use_weights: bool,
}

impl Default for AcquireSettings {
    fn default() -> Self {
        Self {
            width: 1.0e-6,
            delay: 180.0e-9,
            sync: true,
            use_weights: false,
        }
    }
}

/// Per-qubit readout calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QubitCalibration {
    /// Readout pulse.
    pub pulse_measure: MeasurePulseSettings,
    /// Acquisition window.
    pub measure_acquire: AcquireSettings,
    /// Coefficients mapping a mean IQ value onto the Z expectation.
    pub mean_z_map_args: [Complex64; 2],
    /// Single-shot discrimination threshold.
    pub discriminator: f64,
}

impl Default for QubitCalibration {
    fn default() -> Self {
        Self {
            pulse_measure: MeasurePulseSettings::default(),
            measure_acquire: AcquireSettings::default(),
            mean_z_map_args: [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            discriminator: 0.0,
        }
    }
}

/// A physical qubit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qubit {
    /// Identifier.
    pub id: QubitId,
    /// Device index, e.g. `0` for `Q0`.
    pub index: u32,
    /// Readout resonator.
    pub resonator: ResonatorId,
    /// Physical line carrying the qubit's drive channels.
    pub physical_channel: PhysicalChannelId,
    /// Pulse channels owned by this qubit, in creation order.
    pub pulse_channels: Vec<ChannelId>,
    /// Readout calibration.
    pub calibration: QubitCalibration,
}

/// Arena of device components plus their `related_devices` adjacency.
#[derive(Debug, Clone, Default)]
pub struct DeviceGraph {
    graph: DiGraph<ComponentRef, ()>,
    nodes: FxHashMap<ComponentRef, NodeIndex>,
    qubits: Vec<Qubit>,
    resonators: Vec<Resonator>,
    physical_channels: Vec<PhysicalChannel>,
    pulse_channels: Vec<PulseChannel>,
}

impl DeviceGraph {
    /// Create an empty device graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a physical control line.
    pub fn add_physical_channel(
        &mut self,
        name: impl Into<String>,
        sample_time: f64,
        baseband: Baseband,
    ) -> PhysicalChannelId {
        let id = PhysicalChannelId(self.physical_channels.len() as u32);
        self.physical_channels.push(PhysicalChannel {
            id,
            name: name.into(),
            sample_time,
            baseband,
            resonator: None,
        });
        self.node(ComponentRef::PhysicalChannel(id));
        id
    }

    /// Add a readout resonator on `physical`, creating its measure and
    /// acquire channels.
    pub fn add_resonator(
        &mut self,
        physical: PhysicalChannelId,
        measure_frequency: f64,
        fixed_if: bool,
    ) -> IrResult<ResonatorId> {
        self.physical_channel(physical)?;
        let id = ResonatorId(self.resonators.len() as u32);
        let owner = ComponentRef::Resonator(id);
        let measure_channel =
            self.push_channel(ChannelType::Measure, physical, measure_frequency, fixed_if, owner, vec![]);
        let acquire_channel =
            self.push_channel(ChannelType::Acquire, physical, measure_frequency, fixed_if, owner, vec![]);
        self.resonators.push(Resonator {
            id,
            physical_channel: physical,
            measure_channel,
            acquire_channel,
            qubit: None,
        });
        self.physical_channels[physical.0 as usize].resonator = Some(id);

        self.relate(owner, ComponentRef::PhysicalChannel(physical));
        self.relate(ComponentRef::PhysicalChannel(physical), owner);
        self.relate(owner, ComponentRef::PulseChannel(measure_channel));
        self.relate(owner, ComponentRef::PulseChannel(acquire_channel));
        Ok(id)
    }

    /// Add a qubit driven through `physical` and read out by `resonator`.
    pub fn add_qubit(
        &mut self,
        index: u32,
        physical: PhysicalChannelId,
        resonator: ResonatorId,
        calibration: QubitCalibration,
    ) -> IrResult<QubitId> {
        self.physical_channel(physical)?;
        self.resonator(resonator)?;
        let id = QubitId(self.qubits.len() as u32);
        self.qubits.push(Qubit {
            id,
            index,
            resonator,
            physical_channel: physical,
            pulse_channels: vec![],
            calibration,
        });
        self.resonators[resonator.0 as usize].qubit = Some(id);

        let node = ComponentRef::Qubit(id);
        self.relate(node, ComponentRef::Resonator(resonator));
        self.relate(node, ComponentRef::PhysicalChannel(physical));
        self.relate(ComponentRef::Resonator(resonator), node);
        Ok(id)
    }

    /// Add a pulse channel owned by `qubit`, optionally coupled to other qubits.
    pub fn add_pulse_channel(
        &mut self,
        qubit: QubitId,
        channel_type: ChannelType,
        frequency: f64,
        auxiliary: &[QubitId],
    ) -> IrResult<ChannelId> {
        let physical = self.qubit(qubit)?.physical_channel;
        for aux in auxiliary {
            if *aux == qubit {
                return Err(IrError::DuplicateQubit(qubit));
            }
            self.qubit(*aux)?;
        }

        let owner = ComponentRef::Qubit(qubit);
        let mut auxiliary = auxiliary.to_vec();
        auxiliary.sort_unstable();
        let id = self.push_channel(channel_type, physical, frequency, false, owner, auxiliary.clone());
        self.qubits[qubit.0 as usize].pulse_channels.push(id);

        let channel = ComponentRef::PulseChannel(id);
        self.relate(owner, channel);
        for aux in auxiliary {
            self.relate(channel, ComponentRef::Qubit(aux));
        }
        Ok(id)
    }

    fn push_channel(
        &mut self,
        channel_type: ChannelType,
        physical: PhysicalChannelId,
        frequency: f64,
        fixed_if: bool,
        owner: ComponentRef,
        auxiliary_qubits: Vec<QubitId>,
    ) -> ChannelId {
        let id = ChannelId(self.pulse_channels.len() as u32);
        self.pulse_channels.push(PulseChannel {
            id,
            channel_type,
            physical_channel: physical,
            frequency,
            fixed_if,
            scale: Complex64::new(1.0, 0.0),
            owner,
            auxiliary_qubits,
        });
        let channel = ComponentRef::PulseChannel(id);
        self.relate(channel, ComponentRef::PhysicalChannel(physical));
        self.relate(channel, owner);
        id
    }

    fn node(&mut self, component: ComponentRef) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(&component) {
            return idx;
        }
        let idx = self.graph.add_node(component);
        self.nodes.insert(component, idx);
        idx
    }

    fn relate(&mut self, from: ComponentRef, to: ComponentRef) {
        let a = self.node(from);
        let b = self.node(to);
        self.graph.update_edge(a, b, ());
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Get a qubit.
    pub fn qubit(&self, id: QubitId) -> IrResult<&Qubit> {
        self.qubits
            .get(id.0 as usize)
            .ok_or(IrError::QubitNotFound(id))
    }

    /// Get a mutable qubit, e.g. to adjust its calibration.
    pub fn qubit_mut(&mut self, id: QubitId) -> IrResult<&mut Qubit> {
        self.qubits
            .get_mut(id.0 as usize)
            .ok_or(IrError::QubitNotFound(id))
    }

    /// Find a qubit by its device index.
    pub fn qubit_by_index(&self, index: u32) -> Option<&Qubit> {
        self.qubits.iter().find(|q| q.index == index)
    }

    /// Iterate over all qubits.
    pub fn qubits(&self) -> impl Iterator<Item = &Qubit> {
        self.qubits.iter()
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.qubits.len()
    }

    /// Get a pulse channel.
    pub fn channel(&self, id: ChannelId) -> IrResult<&PulseChannel> {
        self.pulse_channels
            .get(id.0 as usize)
            .ok_or(IrError::ChannelNotFound(id))
    }

    /// Get a resonator.
    pub fn resonator(&self, id: ResonatorId) -> IrResult<&Resonator> {
        self.resonators
            .get(id.0 as usize)
            .ok_or(IrError::ComponentNotFound(ComponentRef::Resonator(id)))
    }

    /// Get a physical channel.
    pub fn physical_channel(&self, id: PhysicalChannelId) -> IrResult<&PhysicalChannel> {
        self.physical_channels
            .get(id.0 as usize)
            .ok_or(IrError::ComponentNotFound(ComponentRef::PhysicalChannel(id)))
    }

    /// Find the pulse channel of `qubit` with the given role and coupling.
    pub fn pulse_channel(
        &self,
        qubit: QubitId,
        channel_type: ChannelType,
        coupled: &[QubitId],
    ) -> IrResult<ChannelId> {
        let mut wanted = coupled.to_vec();
        wanted.sort_unstable();
        self.qubit(qubit)?
            .pulse_channels
            .iter()
            .copied()
            .find(|id| {
                let channel = &self.pulse_channels[id.0 as usize];
                channel.channel_type == channel_type && channel.auxiliary_qubits == wanted
            })
            .ok_or(IrError::MissingChannel {
                qubit,
                channel_type,
                coupled: wanted,
            })
    }

    /// The qubit's drive channel.
    pub fn drive_channel(&self, qubit: QubitId) -> IrResult<ChannelId> {
        self.pulse_channel(qubit, ChannelType::Drive, &[])
    }

    /// The readout stimulus channel of the qubit's resonator.
    pub fn measure_channel(&self, qubit: QubitId) -> IrResult<ChannelId> {
        let resonator = self.qubit(qubit)?.resonator;
        Ok(self.resonator(resonator)?.measure_channel)
    }

    /// The readout capture channel of the qubit's resonator.
    pub fn acquire_channel(&self, qubit: QubitId) -> IrResult<ChannelId> {
        let resonator = self.qubit(qubit)?.resonator;
        Ok(self.resonator(resonator)?.acquire_channel)
    }

    /// Every channel addressing `qubit`: acquire, measure, then its own pulse channels.
    pub fn qubit_channels(&self, qubit: QubitId) -> IrResult<Vec<ChannelId>> {
        let mut channels = vec![self.acquire_channel(qubit)?, self.measure_channel(qubit)?];
        channels.extend(self.qubit(qubit)?.pulse_channels.iter().copied());
        Ok(channels)
    }

    /// The qubit a channel belongs to, directly or through its resonator.
    pub fn owning_qubit(&self, channel: ChannelId) -> IrResult<QubitId> {
        match self.channel(channel)?.owner {
            ComponentRef::Qubit(q) => Ok(q),
            ComponentRef::Resonator(r) => self
                .resonator(r)?
                .qubit
                .ok_or(IrError::OrphanChannel(channel)),
            _ => Err(IrError::OrphanChannel(channel)),
        }
    }

    /// Components directly related to `component`.
    pub fn related_devices(
        &self,
        component: ComponentRef,
    ) -> IrResult<impl Iterator<Item = ComponentRef> + '_> {
        let idx = self
            .nodes
            .get(&component)
            .copied()
            .ok_or(IrError::ComponentNotFound(component))?;
        Ok(self.graph.neighbors(idx).map(|n| self.graph[n]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_qubit_device() -> (DeviceGraph, QubitId, QubitId) {
        let mut devices = DeviceGraph::new();
        let band = Baseband {
            frequency: 5.5e9,
            if_frequency: 250e6,
        };
        let mut qubits = vec![];
        for index in 0..2 {
            let drive = devices.add_physical_channel(format!("CH{}", 2 * index), 0.5e-9, band);
            let readout = devices.add_physical_channel(format!("CH{}", 2 * index + 1), 0.5e-9, band);
            let resonator = devices.add_resonator(readout, 8.5e9, false).unwrap();
            let q = devices
                .add_qubit(index, drive, resonator, QubitCalibration::default())
                .unwrap();
            devices
                .add_pulse_channel(q, ChannelType::Drive, 5.0e9, &[])
                .unwrap();
            qubits.push(q);
        }
        (devices, qubits[0], qubits[1])
    }

    #[test]
    fn test_channel_lookup() {
        let (mut devices, q0, q1) = two_qubit_device();
        let cr = devices
            .add_pulse_channel(q0, ChannelType::CrossResonance, 5.1e9, &[q1])
            .unwrap();

        assert_eq!(
            devices
                .pulse_channel(q0, ChannelType::CrossResonance, &[q1])
                .unwrap(),
            cr
        );
        assert!(devices.drive_channel(q1).is_ok());
        assert!(matches!(
            devices.pulse_channel(q1, ChannelType::CrossResonance, &[q0]),
            Err(IrError::MissingChannel { .. })
        ));
    }

    #[test]
    fn test_qubit_channels_order() {
        let (devices, q0, _) = two_qubit_device();
        let channels = devices.qubit_channels(q0).unwrap();
        assert_eq!(channels[0], devices.acquire_channel(q0).unwrap());
        assert_eq!(channels[1], devices.measure_channel(q0).unwrap());
        assert_eq!(channels[2], devices.drive_channel(q0).unwrap());
        assert_eq!(channels.len(), 3);
    }

    #[test]
    fn test_owning_qubit_through_resonator() {
        let (devices, _, q1) = two_qubit_device();
        let acquire = devices.acquire_channel(q1).unwrap();
        assert_eq!(devices.owning_qubit(acquire).unwrap(), q1);
    }

    #[test]
    fn test_cross_resonance_relates_to_both_qubits() {
        let (mut devices, q0, q1) = two_qubit_device();
        let cr = devices
            .add_pulse_channel(q0, ChannelType::CrossResonance, 5.1e9, &[q1])
            .unwrap();
        let related: Vec<_> = devices.related_devices(cr.into()).unwrap().collect();
        assert!(related.contains(&ComponentRef::Qubit(q0)));
        assert!(related.contains(&ComponentRef::Qubit(q1)));
    }

    #[test]
    fn test_self_coupling_rejected() {
        let (mut devices, q0, _) = two_qubit_device();
        assert!(matches!(
            devices.add_pulse_channel(q0, ChannelType::CrossResonance, 5.1e9, &[q0]),
            Err(IrError::DuplicateQubit(_))
        ));
    }
}
