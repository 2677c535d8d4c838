use std::fmt;

use fxhash::FxHashMap;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::circuit::delay::GateKind;
use crate::circuit::gates::{Gate, GateId};
use crate::circuit::signal::Signal;
use crate::circuit::wire::{Wire, WireId};
use crate::config::SimConfig;
use crate::error::{CircuitError, Result};
use crate::sim::SimulationReport;

/// Which capacity limit rejected an insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitKind {
    /// Maximum number of gates
    Gates,
    /// Maximum number of wires
    Wires,
}

/// Notification sent when an insertion is rejected because of a capacity limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitReached {
    /// Limit that was hit
    pub kind: LimitKind,
    /// Value of the limit
    pub limit: usize,
    /// Human-readable message
    pub message: String,
}

impl LimitReached {
    fn new(kind: LimitKind, limit: usize) -> LimitReached {
        let what = match kind {
            LimitKind::Gates => "gates",
            LimitKind::Wires => "wires",
        };
        LimitReached {
            kind,
            limit,
            message: format!(
                "Circuit limit: Maximum {limit} {what} allowed for stable performance."
            ),
        }
    }
}

impl fmt::Display for LimitReached {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Outcome of an insertion that is subject to a capacity limit
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Admission<T> {
    /// The element was added with this handle
    Accepted(T),
    /// The element was not added
    Rejected(LimitReached),
}

impl<T> Admission<T> {
    /// Handle of the added element, if any
    pub fn accepted(self) -> Option<T> {
        match self {
            Admission::Accepted(t) => Some(t),
            Admission::Rejected(_) => None,
        }
    }

    /// Whether the element was rejected
    pub fn is_rejected(&self) -> bool {
        matches!(self, Admission::Rejected(_))
    }

    /// Turn a rejection into an error, for callers that cannot degrade gracefully
    pub fn into_result(self) -> Result<T> {
        match self {
            Admission::Accepted(t) => Ok(t),
            Admission::Rejected(l) => Err(CircuitError::LimitReached(l)),
        }
    }
}

/// Saved description of a gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedGate {
    /// Handle at save time
    pub id: GateId,
    /// Kind of the gate
    #[serde(rename = "type")]
    pub kind: GateKind,
    /// Horizontal position
    pub x: f64,
    /// Vertical position
    pub y: f64,
    /// Optional label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Saved description of a wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedWire {
    /// Handle at save time
    pub id: WireId,
    /// Driving gate
    pub from: GateId,
    /// Output pin of the driving gate
    #[serde(rename = "fromPin")]
    pub from_pin: usize,
    /// Driven gate
    pub to: GateId,
    /// Input pin of the driven gate
    #[serde(rename = "toPin")]
    pub to_pin: usize,
}

/// Plain description of a circuit, handed to persistence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedCircuit {
    /// Gates, in insertion order
    pub gates: Vec<SavedGate>,
    /// Wires, in insertion order
    pub wires: Vec<SavedWire>,
}

/// A circuit of gates connected by wires
///
/// Gates and wires live in insertion-ordered arenas addressed by stable handles.
/// Handles are never reused within a circuit until it is cleared.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    pub(crate) config: SimConfig,
    pub(crate) gates: IndexMap<GateId, Gate>,
    pub(crate) wires: IndexMap<WireId, Wire>,
    inputs: Vec<GateId>,
    outputs: Vec<GateId>,
    gate_counter: u32,
    wire_counter: u32,
    pub(crate) now_ns: u64,
    pub(crate) report: SimulationReport,
}

impl Circuit {
    /// Create an empty circuit with the default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty circuit with the given limits
    pub fn with_config(config: SimConfig) -> Self {
        Circuit {
            config,
            ..Default::default()
        }
    }

    /// Limits of the circuit
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Return the number of gates
    pub fn nb_gates(&self) -> usize {
        self.gates.len()
    }

    /// Return the number of wires
    pub fn nb_wires(&self) -> usize {
        self.wires.len()
    }

    /// Return the number of input terminals, clocks included
    pub fn nb_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Return the number of output terminals
    pub fn nb_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Get a gate by handle
    pub fn gate(&self, id: GateId) -> Option<&Gate> {
        self.gates.get(&id)
    }

    /// Get a gate by handle, for direct manipulation of its state
    pub fn gate_mut(&mut self, id: GateId) -> Option<&mut Gate> {
        self.gates.get_mut(&id)
    }

    /// Get a wire by handle
    pub fn wire(&self, id: WireId) -> Option<&Wire> {
        self.wires.get(&id)
    }

    /// All gates, in insertion order
    pub fn gates(&self) -> impl Iterator<Item = &Gate> {
        self.gates.values()
    }

    /// All wires, in insertion order
    pub fn wires(&self) -> impl Iterator<Item = &Wire> {
        self.wires.values()
    }

    /// Input terminals and clocks, in insertion order
    pub fn input_ids(&self) -> &[GateId] {
        &self.inputs
    }

    /// Output terminals, in insertion order
    pub fn output_ids(&self) -> &[GateId] {
        &self.outputs
    }

    /// Report of the last simulation
    pub fn last_report(&self) -> &SimulationReport {
        &self.report
    }

    /// Remove all gates and wires and restart handle numbering
    pub fn clear(&mut self) {
        self.gates.clear();
        self.wires.clear();
        self.inputs.clear();
        self.outputs.clear();
        self.gate_counter = 0;
        self.wire_counter = 0;
        self.now_ns = 0;
        self.report = SimulationReport::default();
    }

    /// Add a gate of the given kind at a position
    pub fn add_gate(&mut self, kind: GateKind, x: f64, y: f64) -> Admission<GateId> {
        if self.gates.len() >= self.config.max_gates {
            let limit = LimitReached::new(LimitKind::Gates, self.config.max_gates);
            warn!("{}", limit.message);
            return Admission::Rejected(limit);
        }
        let id = GateId::from_index(self.gate_counter);
        self.gate_counter += 1;
        self.gates.insert(id, Gate::new(id, kind, x, y));
        if kind.is_input_terminal() {
            self.inputs.push(id);
        } else if kind.is_output_terminal() {
            self.outputs.push(id);
        }
        debug!("Placed {} {}", kind, id);
        Admission::Accepted(id)
    }

    /// Add a gate by its factory name
    pub fn add_gate_named(&mut self, kind: &str, x: f64, y: f64) -> Result<Admission<GateId>> {
        let kind: GateKind = kind.parse()?;
        Ok(self.add_gate(kind, x, y))
    }

    /// Remove a gate and every wire touching it; returns whether the gate existed
    pub fn remove_gate(&mut self, id: GateId) -> bool {
        let Some(gate) = self.gates.get(&id) else {
            return false;
        };
        let incident: Vec<WireId> = gate
            .input_wires()
            .iter()
            .chain(gate.output_wires())
            .copied()
            .unique()
            .collect();
        for w in incident {
            self.remove_wire(w);
        }
        self.inputs.retain(|g| *g != id);
        self.outputs.retain(|g| *g != id);
        self.gates.shift_remove(&id);
        debug!("Removed {}", id);
        true
    }

    /// Set the label of a gate
    pub fn set_label(&mut self, id: GateId, label: Option<String>) -> Result<()> {
        let gate = self
            .gates
            .get_mut(&id)
            .ok_or(CircuitError::UnknownGate(id))?;
        gate.set_label(label);
        Ok(())
    }

    /// Connect an output pin of a gate to an input pin of another gate
    ///
    /// Several wires may drive the same input pin; they are resolved as a bus during simulation.
    pub fn connect(
        &mut self,
        from: GateId,
        from_pin: usize,
        to: GateId,
        to_pin: usize,
    ) -> Result<Admission<WireId>> {
        if self.wires.len() >= self.config.max_wires {
            let limit = LimitReached::new(LimitKind::Wires, self.config.max_wires);
            warn!("{}", limit.message);
            return Ok(Admission::Rejected(limit));
        }
        let from_gate = self.gates.get(&from).ok_or(CircuitError::UnknownGate(from))?;
        let to_gate = self.gates.get(&to).ok_or(CircuitError::UnknownGate(to))?;
        if from_pin >= from_gate.output_count() {
            return Err(CircuitError::InvalidPin {
                gate: from,
                pin: from_pin,
                count: from_gate.output_count(),
            });
        }
        if to_pin >= to_gate.input_count() {
            return Err(CircuitError::InvalidPin {
                gate: to,
                pin: to_pin,
                count: to_gate.input_count(),
            });
        }

        let id = WireId::from_index(self.wire_counter);
        self.wire_counter += 1;
        self.wires
            .insert(id, Wire::new(id, from, from_pin, to, to_pin));
        self.gates[&from].output_wires.push(id);
        self.gates[&to].input_wires.push(id);
        debug!("Connected {}:{} -> {}:{} with {}", from, from_pin, to, to_pin, id);
        Ok(Admission::Accepted(id))
    }

    /// Remove a wire; returns whether it existed
    pub fn remove_wire(&mut self, id: WireId) -> bool {
        let Some(wire) = self.wires.shift_remove(&id) else {
            return false;
        };
        if let Some(g) = self.gates.get_mut(&wire.from()) {
            g.output_wires.retain(|w| *w != id);
        }
        if let Some(g) = self.gates.get_mut(&wire.to()) {
            g.input_wires.retain(|w| *w != id);
        }
        true
    }

    /// Sort terminals by vertical, then horizontal position; ties keep insertion order
    fn sorted_by_position(&self, ids: &[GateId]) -> Vec<GateId> {
        ids.iter()
            .copied()
            .sorted_by(|a, b| {
                let (ax, ay) = self.gates[a].position();
                let (bx, by) = self.gates[b].position();
                ay.total_cmp(&by).then(ax.total_cmp(&bx))
            })
            .collect()
    }

    /// Input terminals and clocks, in truth-table order (top to bottom, then left to right)
    pub fn sorted_inputs(&self) -> Vec<GateId> {
        self.sorted_by_position(&self.inputs)
    }

    /// Output terminals, in truth-table order (top to bottom, then left to right)
    pub fn sorted_outputs(&self) -> Vec<GateId> {
        self.sorted_by_position(&self.outputs)
    }

    /// Drive the input terminals in truth-table order; missing values are Low
    pub fn set_inputs(&mut self, values: &[bool]) {
        for (i, id) in self.sorted_inputs().into_iter().enumerate() {
            let v = values.get(i).copied().unwrap_or(false);
            self.gates[&id].set_value(v);
        }
    }

    /// Drive a single input terminal
    pub fn set_input(&mut self, id: GateId, value: bool) -> Result<()> {
        let gate = self
            .gates
            .get_mut(&id)
            .ok_or(CircuitError::UnknownGate(id))?;
        gate.set_value(value);
        Ok(())
    }

    /// Values sampled by the output terminals, in truth-table order
    pub fn get_outputs(&self) -> Vec<Signal> {
        self.sorted_outputs()
            .into_iter()
            .map(|id| self.gates[&id].sampled().unwrap_or_default())
            .collect()
    }

    /// Handles of the clock sources
    fn clock_ids(&self) -> Vec<GateId> {
        self.inputs
            .iter()
            .copied()
            .filter(|id| self.gates[id].kind() == GateKind::Clock)
            .collect()
    }

    /// Advance all clocks by the elapsed time in milliseconds
    ///
    /// The circuit is simulated again only if a clock toggled; returns whether it did.
    pub fn tick(&mut self, delta_ms: f64) -> bool {
        self.now_ns += (delta_ms.max(0.0) * 1e6) as u64;
        let mut toggled = false;
        for id in self.clock_ids() {
            toggled |= self.gates[&id].update(delta_ms);
        }
        if toggled {
            self.simulate();
        }
        toggled
    }

    /// Force a single edge on every clock and simulate; returns whether there was any clock
    pub fn pulse_clocks(&mut self) -> bool {
        let mut pulsed = false;
        for id in self.clock_ids() {
            pulsed |= self.gates[&id].pulse();
        }
        if pulsed {
            self.simulate();
        }
        pulsed
    }

    /// Enable or disable every clock, without simulating
    pub fn set_clocks_active(&mut self, active: bool) {
        for id in self.clock_ids() {
            self.gates[&id].set_active(active);
        }
    }

    /// Return every gate to its initial state and drive all inputs Low
    ///
    /// The structure of the circuit is kept.
    pub fn reset(&mut self) {
        for gate in self.gates.values_mut() {
            gate.reset();
        }
        for wire in self.wires.values_mut() {
            wire.propagate(&self.gates);
        }
        self.now_ns = 0;
        self.report = SimulationReport::default();
    }

    /// Run the glitch check of every gate; return the gates with a glitch
    pub fn check_glitches(&mut self) -> Vec<GateId> {
        self.gates
            .values_mut()
            .filter_map(|g| g.check_hazard().then_some(g.id()))
            .collect()
    }

    /// Plain description of the circuit, for persistence
    pub fn serialize(&self) -> SavedCircuit {
        SavedCircuit {
            gates: self
                .gates
                .values()
                .map(|g| SavedGate {
                    id: g.id(),
                    kind: g.kind(),
                    x: g.position().0,
                    y: g.position().1,
                    label: g.label().map(str::to_string),
                })
                .collect(),
            wires: self
                .wires
                .values()
                .map(|w| SavedWire {
                    id: w.id(),
                    from: w.from(),
                    from_pin: w.from_pin(),
                    to: w.to(),
                    to_pin: w.to_pin(),
                })
                .collect(),
        }
    }

    /// Replace the content of the circuit by a saved description
    ///
    /// Gates and wires are added again in order, so handles are renumbered.
    /// The mapping from saved handles to new handles is returned.
    pub fn deserialize(&mut self, saved: &SavedCircuit) -> Result<FxHashMap<GateId, GateId>> {
        self.clear();
        let mut translation = FxHashMap::default();
        for g in &saved.gates {
            let id = self.add_gate(g.kind, g.x, g.y).into_result()?;
            if g.label.is_some() {
                self.gates[&id].set_label(g.label.clone());
            }
            translation.insert(g.id, id);
        }
        for w in &saved.wires {
            let from = *translation
                .get(&w.from)
                .ok_or(CircuitError::UnknownGate(w.from))?;
            let to = *translation
                .get(&w.to)
                .ok_or(CircuitError::UnknownGate(w.to))?;
            self.connect(from, w.from_pin, to, w.to_pin)?.into_result()?;
        }
        Ok(translation)
    }

    /// Build a circuit from a saved description
    pub fn from_saved(saved: &SavedCircuit, config: SimConfig) -> Result<Circuit> {
        let mut ret = Circuit::with_config(config);
        ret.deserialize(saved)?;
        Ok(ret)
    }

    /// Check consistency of the datastructure
    pub fn check(&self) {
        for (id, w) in &self.wires {
            assert_eq!(*id, w.id());
            assert!(self.gates.contains_key(&w.from()), "Invalid source {}", w.from());
            assert!(self.gates.contains_key(&w.to()), "Invalid destination {}", w.to());
            assert!(self.gates[&w.from()].output_wires().contains(id));
            assert!(self.gates[&w.to()].input_wires().contains(id));
        }
        for (id, g) in &self.gates {
            assert_eq!(*id, g.id());
            assert_eq!(g.inputs().len(), g.input_count());
            assert_eq!(g.outputs().len(), g.output_count());
            for w in g.input_wires().iter().chain(g.output_wires()) {
                assert!(self.wires.contains_key(w), "Dangling {w} on {id}");
            }
        }
        let inputs: Vec<GateId> = self
            .gates
            .values()
            .filter(|g| g.kind().is_input_terminal())
            .map(Gate::id)
            .collect();
        let outputs: Vec<GateId> = self
            .gates
            .values()
            .filter(|g| g.kind().is_output_terminal())
            .map(Gate::id)
            .collect();
        assert_eq!(inputs, self.inputs);
        assert_eq!(outputs, self.outputs);
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Circuit with {} inputs, {} outputs:",
            self.nb_inputs(),
            self.nb_outputs()
        )?;
        for g in self.gates.values() {
            let drivers = g
                .input_wires()
                .iter()
                .map(|w| {
                    let w = &self.wires[w];
                    format!("{}:{}->{}", w.from(), w.from_pin(), w.to_pin())
                })
                .join(", ");
            writeln!(f, "\t{} = {} [{}]", g.id(), g.kind(), drivers)?;
        }
        Ok(())
    }
}
