use std::collections::VecDeque;
use std::{fmt, slice};

use serde::{Deserialize, Serialize};

use crate::circuit::delay::GateKind;
use crate::circuit::signal::Signal;
use crate::circuit::wire::WireId;

/// Number of output transitions kept per gate for glitch detection
pub const TRANSITION_HISTORY: usize = 10;

/// Default clock frequency in Hz, slow enough to follow by eye
pub const DEFAULT_CLOCK_HZ: f64 = 0.5;

/// Stable handle of a gate in a circuit
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GateId(u32);

impl GateId {
    /// Create a handle from its raw index
    pub fn from_index(i: u32) -> GateId {
        GateId(i)
    }

    /// Raw index of the handle
    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gate_{}", self.0)
    }
}

impl fmt::Debug for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A recorded change on one output pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Output pin that changed
    pub pin: usize,
    /// Previous value
    pub from: Signal,
    /// New value
    pub to: Signal,
    /// Simulated time of the change, in nanoseconds
    pub time_ns: u64,
}

/// State of a clock source
#[derive(Debug, Clone, PartialEq)]
pub struct ClockState {
    value: bool,
    frequency_hz: f64,
    accumulated_ms: f64,
    active: bool,
}

impl ClockState {
    fn new() -> ClockState {
        ClockState {
            value: false,
            frequency_hz: DEFAULT_CLOCK_HZ,
            accumulated_ms: 0.0,
            active: true,
        }
    }

    /// Current level of the clock
    pub fn value(&self) -> bool {
        self.value
    }

    /// Whether the clock advances with elapsed time
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Frequency in Hz
    pub fn frequency_hz(&self) -> f64 {
        self.frequency_hz
    }

    /// Time between two edges, in milliseconds
    pub fn half_period_ms(&self) -> f64 {
        1000.0 / self.frequency_hz / 2.0
    }

    /// Change the frequency; non-positive values are ignored
    pub fn set_frequency(&mut self, frequency_hz: f64) {
        if frequency_hz > 0.0 {
            self.frequency_hz = frequency_hz;
        }
    }

    /// Accumulate elapsed time and toggle when a half period is reached
    ///
    /// The remainder is kept after a toggle so that the phase does not drift.
    /// Returns whether the clock toggled.
    fn update(&mut self, delta_ms: f64) -> bool {
        if !self.active {
            return false;
        }
        self.accumulated_ms += delta_ms;
        let half_period = self.half_period_ms();
        if self.accumulated_ms >= half_period {
            self.accumulated_ms %= half_period;
            self.value = !self.value;
            true
        } else {
            false
        }
    }

    /// Manual single edge
    fn pulse(&mut self) {
        self.accumulated_ms = 0.0;
        self.value = !self.value;
    }
}

/// Per-kind behavior of a gate, with the internal state of sequential kinds
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    /// Input terminal with its externally set value
    Input {
        /// Driven value
        value: bool,
    },
    /// Clock source
    Clock(ClockState),
    /// Output terminal with its last sampled value
    Output {
        /// Last sampled value
        sampled: Signal,
    },
    /// Ideal controlled switch
    Transistor,
    /// Inverter
    Not,
    /// And2
    And,
    /// Or2
    Or,
    /// Nand2
    Nand,
    /// Nor2
    Nor,
    /// Xor2
    Xor,
    /// Xnor2
    Xnor,
    /// Tri-state buffer
    TriState,
    /// Half adder
    HalfAdder,
    /// Full adder
    FullAdder,
    /// 2-to-1 multiplexer
    Mux,
    /// NOR-style SR latch
    SrLatch {
        /// Set when both inputs were high; cleared by a clean set or reset
        forbidden: bool,
    },
    /// D flip-flop
    DFlipFlop {
        /// Clock level at the previous evaluation
        last_clock: bool,
        /// Number of rising edges seen
        edges: u64,
    },
    /// T flip-flop
    TFlipFlop {
        /// Clock level at the previous evaluation
        last_clock: bool,
    },
    /// JK flip-flop
    JkFlipFlop {
        /// Clock level at the previous evaluation
        last_clock: bool,
    },
}

impl Behavior {
    /// Initial behavior for a kind
    pub fn new(kind: GateKind) -> Behavior {
        use GateKind::*;
        match kind {
            Input => Behavior::Input { value: false },
            Clock => Behavior::Clock(ClockState::new()),
            Output => Behavior::Output {
                sampled: Signal::Low,
            },
            Transistor => Behavior::Transistor,
            Not => Behavior::Not,
            And => Behavior::And,
            Or => Behavior::Or,
            Nand => Behavior::Nand,
            Nor => Behavior::Nor,
            Xor => Behavior::Xor,
            Xnor => Behavior::Xnor,
            TriState => Behavior::TriState,
            HalfAdder => Behavior::HalfAdder,
            FullAdder => Behavior::FullAdder,
            Mux => Behavior::Mux,
            SrLatch => Behavior::SrLatch { forbidden: false },
            DFlipFlop => Behavior::DFlipFlop {
                last_clock: false,
                edges: 0,
            },
            TFlipFlop => Behavior::TFlipFlop { last_clock: false },
            JkFlipFlop => Behavior::JkFlipFlop { last_clock: false },
        }
    }

    /// Kind of the behavior
    pub fn kind(&self) -> GateKind {
        use Behavior::*;
        match self {
            Input { .. } => GateKind::Input,
            Clock(_) => GateKind::Clock,
            Output { .. } => GateKind::Output,
            Transistor => GateKind::Transistor,
            Not => GateKind::Not,
            And => GateKind::And,
            Or => GateKind::Or,
            Nand => GateKind::Nand,
            Nor => GateKind::Nor,
            Xor => GateKind::Xor,
            Xnor => GateKind::Xnor,
            TriState => GateKind::TriState,
            HalfAdder => GateKind::HalfAdder,
            FullAdder => GateKind::FullAdder,
            Mux => GateKind::Mux,
            SrLatch { .. } => GateKind::SrLatch,
            DFlipFlop { .. } => GateKind::DFlipFlop,
            TFlipFlop { .. } => GateKind::TFlipFlop,
            JkFlipFlop { .. } => GateKind::JkFlipFlop,
        }
    }
}

/// Initial output vector of a kind: (Low, High) for storage elements, all Low otherwise
fn initial_outputs(kind: GateKind) -> Vec<Signal> {
    use GateKind::*;
    match kind {
        SrLatch | DFlipFlop | TFlipFlop | JkFlipFlop => vec![Signal::Low, Signal::High],
        _ => vec![Signal::Low; kind.output_count()],
    }
}

fn default_label(kind: GateKind) -> Option<String> {
    match kind {
        GateKind::Input => Some("IN".to_string()),
        GateKind::Output => Some("OUT".to_string()),
        GateKind::Clock => Some("CLK".to_string()),
        _ => None,
    }
}

/// Complementary pair (q, !q) for a storage element
fn pair(q: Signal) -> Vec<Signal> {
    vec![q, !q]
}

/// Toggled value; anything that is not Low toggles to Low
fn toggled(q: Signal) -> Signal {
    if q.is_low() {
        Signal::High
    } else {
        Signal::Low
    }
}

/// A logic gate placed in a circuit
///
/// Pins have a fixed count determined by the kind. Input and output vectors always
/// have exactly that length. Incident wires are tracked by handle so that removing
/// the gate can remove them as well.
#[derive(Debug, Clone)]
pub struct Gate {
    id: GateId,
    behavior: Behavior,
    x: f64,
    y: f64,
    label: Option<String>,
    inputs: Vec<Signal>,
    outputs: Vec<Signal>,
    propagation_delay: u32,
    metastable: bool,
    transitions: VecDeque<Transition>,
    has_glitch: bool,
    pub(crate) input_wires: Vec<WireId>,
    pub(crate) output_wires: Vec<WireId>,
}

impl Gate {
    /// Create a gate of the given kind at a position
    pub fn new(id: GateId, kind: GateKind, x: f64, y: f64) -> Gate {
        Gate {
            id,
            behavior: Behavior::new(kind),
            x,
            y,
            label: default_label(kind),
            inputs: vec![Signal::Low; kind.input_count()],
            outputs: initial_outputs(kind),
            propagation_delay: kind.propagation_delay(),
            metastable: false,
            transitions: VecDeque::new(),
            has_glitch: false,
            input_wires: Vec::new(),
            output_wires: Vec::new(),
        }
    }

    /// Handle of the gate
    pub fn id(&self) -> GateId {
        self.id
    }

    /// Kind of the gate
    pub fn kind(&self) -> GateKind {
        self.behavior.kind()
    }

    /// Per-kind state of the gate
    pub fn behavior(&self) -> &Behavior {
        &self.behavior
    }

    /// Position of the gate; only used to order terminals
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Label of the gate, if any
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Set or clear the label of the gate
    pub fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    /// Number of input pins
    pub fn input_count(&self) -> usize {
        self.kind().input_count()
    }

    /// Number of output pins
    pub fn output_count(&self) -> usize {
        self.kind().output_count()
    }

    /// Current input values
    pub fn inputs(&self) -> &[Signal] {
        &self.inputs
    }

    /// Current output values
    pub fn outputs(&self) -> &[Signal] {
        &self.outputs
    }

    /// Values visible from outside: the outputs, or the sampled value of an output terminal
    pub fn observed(&self) -> &[Signal] {
        match &self.behavior {
            Behavior::Output { sampled } => slice::from_ref(sampled),
            _ => &self.outputs,
        }
    }

    /// Sampled value of an output terminal
    pub fn sampled(&self) -> Option<Signal> {
        match self.behavior {
            Behavior::Output { sampled } => Some(sampled),
            _ => None,
        }
    }

    /// Propagation delay in nanoseconds
    pub fn propagation_delay(&self) -> u32 {
        self.propagation_delay
    }

    /// Whether the gate is marked as carrying an undefined state
    pub fn is_metastable(&self) -> bool {
        self.metastable
    }

    pub(crate) fn set_metastable(&mut self, metastable: bool) {
        self.metastable = metastable;
    }

    /// Recent output transitions, oldest first
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }

    /// Whether a glitch was found by [`Gate::check_hazard`]
    pub fn has_glitch(&self) -> bool {
        self.has_glitch
    }

    /// Wires driving this gate
    pub fn input_wires(&self) -> &[WireId] {
        &self.input_wires
    }

    /// Wires driven by this gate
    pub fn output_wires(&self) -> &[WireId] {
        &self.output_wires
    }

    /// Clock state, for clock sources
    pub fn clock(&self) -> Option<&ClockState> {
        match &self.behavior {
            Behavior::Clock(c) => Some(c),
            _ => None,
        }
    }

    /// Mutable clock state, for clock sources
    pub fn clock_mut(&mut self) -> Option<&mut ClockState> {
        match &mut self.behavior {
            Behavior::Clock(c) => Some(c),
            _ => None,
        }
    }

    /// Drive an input terminal or a clock; no effect on other kinds
    pub fn set_value(&mut self, value: bool) {
        match &mut self.behavior {
            Behavior::Input { value: v } => *v = value,
            Behavior::Clock(c) => c.value = value,
            _ => return,
        }
        self.outputs = vec![Signal::from(value)];
    }

    /// Assign the inputs and recompute the outputs
    ///
    /// Changes on the outputs are recorded at `now_ns` for glitch detection.
    pub fn set_inputs(&mut self, values: &[Signal], now_ns: u64) -> &[Signal] {
        let n = self.input_count();
        self.inputs.clear();
        self.inputs
            .extend(values.iter().copied().chain(std::iter::repeat(Signal::Low)).take(n));
        let new_outputs = self.compute();
        self.record(new_outputs, now_ns);
        &self.outputs
    }

    /// Store new outputs, recording the changed pins
    fn record(&mut self, new_outputs: Vec<Signal>, now_ns: u64) {
        for (pin, (old, new)) in self.outputs.iter().zip(new_outputs.iter()).enumerate() {
            if old != new {
                self.transitions.push_back(Transition {
                    pin,
                    from: *old,
                    to: *new,
                    time_ns: now_ns,
                });
                if self.transitions.len() > TRANSITION_HISTORY {
                    self.transitions.pop_front();
                }
            }
        }
        self.outputs = new_outputs;
    }

    /// Stable levels of the inputs, or None if any of them is undefined
    ///
    /// Floating inputs read as Low.
    fn levels<const N: usize>(&self) -> Option<[bool; N]> {
        let mut ret = [false; N];
        for (i, r) in ret.iter_mut().enumerate() {
            *r = self.inputs[i].pulled_down().to_bool()?;
        }
        Some(ret)
    }

    /// Compute the outputs from the current inputs and internal state
    ///
    /// Combinational gates output Undefined on every pin if any input is Undefined.
    /// Storage elements update their internal state.
    pub fn compute(&mut self) -> Vec<Signal> {
        use GateKind::*;
        let undefined = vec![Signal::Undefined; self.output_count()];
        let binary = |f: fn(bool, bool) -> bool, g: &Gate| match g.levels::<2>() {
            Some([a, b]) => vec![Signal::from(f(a, b))],
            None => vec![Signal::Undefined],
        };
        match self.kind() {
            Input => {
                let value = matches!(self.behavior, Behavior::Input { value: true });
                vec![Signal::from(value)]
            }
            Clock => vec![Signal::from(self.clock().is_some_and(|c| c.value))],
            Output => {
                self.behavior = Behavior::Output {
                    sampled: self.inputs[0],
                };
                Vec::new()
            }
            Not => match self.levels::<1>() {
                Some([a]) => vec![Signal::from(!a)],
                None => undefined,
            },
            Transistor | And => binary(|a, b| a && b, &*self),
            Or => binary(|a, b| a || b, &*self),
            Nand => binary(|a, b| !(a && b), &*self),
            Nor => binary(|a, b| !(a || b), &*self),
            Xor => binary(|a, b| a != b, &*self),
            Xnor => binary(|a, b| a == b, &*self),
            TriState => {
                let data = self.inputs[0].pulled_down();
                match self.inputs[1].pulled_down() {
                    Signal::Undefined => undefined,
                    Signal::High => vec![data],
                    _ => vec![Signal::HighZ],
                }
            }
            HalfAdder => match self.levels::<2>() {
                Some([a, b]) => vec![Signal::from(a ^ b), Signal::from(a && b)],
                None => undefined,
            },
            FullAdder => match self.levels::<3>() {
                Some([a, b, c]) => {
                    let sum = a ^ b ^ c;
                    let carry = (a && b) || (c && (a ^ b));
                    vec![Signal::from(sum), Signal::from(carry)]
                }
                None => undefined,
            },
            Mux => match self.inputs[2].pulled_down() {
                Signal::Undefined => undefined,
                Signal::High => vec![self.inputs[1].pulled_down()],
                _ => vec![self.inputs[0].pulled_down()],
            },
            SrLatch => self.compute_sr_latch(),
            DFlipFlop => self.compute_d_flip_flop(),
            TFlipFlop => self.compute_t_flip_flop(),
            JkFlipFlop => self.compute_jk_flip_flop(),
        }
    }

    fn compute_sr_latch(&mut self) -> Vec<Signal> {
        let Behavior::SrLatch { forbidden } = &mut self.behavior else {
            unreachable!()
        };
        let s = self.inputs[0].pulled_down();
        let r = self.inputs[1].pulled_down();
        if s.is_undefined() || r.is_undefined() {
            // An unresolved set or reset may have fired: same as the forbidden state
            *forbidden = true;
            self.metastable = true;
            return vec![Signal::Undefined; 2];
        }
        match (s.is_high(), r.is_high()) {
            (true, false) => {
                *forbidden = false;
                self.metastable = false;
                pair(Signal::High)
            }
            (false, true) => {
                *forbidden = false;
                self.metastable = false;
                pair(Signal::Low)
            }
            (true, true) => {
                // Both outputs are forced low in a real NOR latch; the release is a race
                *forbidden = true;
                self.metastable = true;
                vec![Signal::Undefined; 2]
            }
            (false, false) => {
                if *forbidden {
                    self.metastable = true;
                    vec![Signal::Undefined; 2]
                } else {
                    self.outputs.clone()
                }
            }
        }
    }

    fn compute_d_flip_flop(&mut self) -> Vec<Signal> {
        let Behavior::DFlipFlop { last_clock, edges } = &mut self.behavior else {
            unreachable!()
        };
        let d = self.inputs[0].pulled_down();
        let Some(clk) = self.inputs[1].pulled_down().to_bool() else {
            self.metastable = true;
            return vec![Signal::Undefined; 2];
        };
        let mut ret = self.outputs.clone();
        if clk && !*last_clock {
            *edges += 1;
            if d.is_undefined() {
                ret = vec![Signal::Undefined; 2];
                self.metastable = true;
            } else {
                ret = pair(d);
                self.metastable = false;
            }
        }
        *last_clock = clk;
        ret
    }

    fn compute_t_flip_flop(&mut self) -> Vec<Signal> {
        let Behavior::TFlipFlop { last_clock } = &mut self.behavior else {
            unreachable!()
        };
        let t = self.inputs[0].pulled_down();
        let Some(clk) = self.inputs[1].pulled_down().to_bool() else {
            self.metastable = true;
            return vec![Signal::Undefined; 2];
        };
        let mut ret = self.outputs.clone();
        if clk && !*last_clock {
            if t.is_undefined() {
                ret = vec![Signal::Undefined; 2];
                self.metastable = true;
            } else if t.is_high() {
                ret = pair(toggled(ret[0]));
                self.metastable = false;
            }
        }
        *last_clock = clk;
        ret
    }

    fn compute_jk_flip_flop(&mut self) -> Vec<Signal> {
        let Behavior::JkFlipFlop { last_clock } = &mut self.behavior else {
            unreachable!()
        };
        let j = self.inputs[0].pulled_down();
        let k = self.inputs[1].pulled_down();
        let Some(clk) = self.inputs[2].pulled_down().to_bool() else {
            self.metastable = true;
            return vec![Signal::Undefined; 2];
        };
        let mut ret = self.outputs.clone();
        if clk && !*last_clock {
            if j.is_undefined() || k.is_undefined() {
                ret = vec![Signal::Undefined; 2];
                self.metastable = true;
            } else {
                match (j.is_high(), k.is_high()) {
                    (false, false) => (),
                    (false, true) => ret = pair(Signal::Low),
                    (true, false) => ret = pair(Signal::High),
                    (true, true) => ret = pair(toggled(ret[0])),
                }
                self.metastable = false;
            }
        }
        *last_clock = clk;
        ret
    }

    /// Force a storage element back to (Low, High) and clear its undefined state
    ///
    /// Meant for deliberate re-initialization; no effect on other kinds.
    pub fn reset_to_stable(&mut self) {
        use Behavior::*;
        match &mut self.behavior {
            SrLatch { forbidden } => *forbidden = false,
            DFlipFlop { last_clock, edges } => {
                *last_clock = false;
                *edges = 0;
            }
            TFlipFlop { last_clock } | JkFlipFlop { last_clock } => *last_clock = false,
            Input { .. } | Clock(_) | Output { .. } | Transistor | Not | And | Or | Nand
            | Nor | Xor | Xnor | TriState | HalfAdder | FullAdder | Mux => return,
        }
        self.outputs = pair(Signal::Low);
        self.metastable = false;
    }

    /// Return the gate to its initial state, keeping its identity, position, label and wires
    ///
    /// Clocks keep their frequency and enable flag.
    pub fn reset(&mut self) {
        let kind = self.kind();
        match &mut self.behavior {
            Behavior::Clock(c) => {
                c.value = false;
                c.accumulated_ms = 0.0;
            }
            b => *b = Behavior::new(kind),
        }
        self.inputs = vec![Signal::Low; kind.input_count()];
        self.outputs = initial_outputs(kind);
        self.metastable = false;
        self.transitions.clear();
        self.has_glitch = false;
    }

    /// Advance a clock by the elapsed time; returns whether it toggled
    pub fn update(&mut self, delta_ms: f64) -> bool {
        let toggled = match &mut self.behavior {
            Behavior::Clock(c) => c.update(delta_ms),
            _ => false,
        };
        if toggled {
            self.outputs = vec![Signal::from(self.clock().is_some_and(|c| c.value))];
        }
        toggled
    }

    /// Force a single edge on a clock; returns whether the gate is a clock
    pub fn pulse(&mut self) -> bool {
        let Some(c) = self.clock_mut() else {
            return false;
        };
        c.pulse();
        let v = c.value;
        self.outputs = vec![Signal::from(v)];
        true
    }

    /// Enable or disable a clock; returns whether the gate is a clock
    pub fn set_active(&mut self, active: bool) -> bool {
        match self.clock_mut() {
            Some(c) => {
                c.active = active;
                true
            }
            None => false,
        }
    }

    /// Check the transition history for glitches
    ///
    /// A glitch is two transitions closer than twice the propagation delay.
    pub fn check_hazard(&mut self) -> bool {
        let window = 2 * self.propagation_delay as u64;
        let glitch = self
            .transitions
            .iter()
            .zip(self.transitions.iter().skip(1))
            .any(|(a, b)| b.time_ns.saturating_sub(a.time_ns) < window);
        if glitch {
            self.has_glitch = true;
        }
        glitch
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.id)?;
        if let Some(l) = &self.label {
            write!(f, " \"{l}\"")?;
        }
        Ok(())
    }
}
