use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CircuitError;

/// Fallback delay in nanoseconds, for gates without a meaningful delay of their own
pub const DEFAULT_DELAY_NS: u32 = 10;

/// Kind of a gate, from a closed set
///
/// The serialized name of each kind is the name accepted by [`GateKind::from_str`].
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateKind {
    /// Externally driven input terminal
    Input,
    /// Self-toggling input terminal
    Clock,
    /// Output terminal, sampled for read-out
    Output,
    /// Ideal controlled switch (control, supply)
    Transistor,
    /// Inverter
    Not,
    /// 2-input And
    And,
    /// 2-input Or
    Or,
    /// 2-input Nand
    Nand,
    /// 2-input Nor
    Nor,
    /// 2-input Xor
    Xor,
    /// 2-input Xnor
    Xnor,
    /// Tri-state buffer (data, enable)
    #[serde(rename = "tristate")]
    TriState,
    /// Half adder (a, b) -> (sum, carry)
    #[serde(rename = "halfadder")]
    HalfAdder,
    /// Full adder (a, b, cin) -> (sum, carry)
    #[serde(rename = "fulladder")]
    FullAdder,
    /// 2-to-1 multiplexer (a, b, select)
    #[serde(rename = "mux2to1")]
    Mux,
    /// NOR-style SR latch (s, r) -> (q, !q)
    #[serde(rename = "srlatch")]
    SrLatch,
    /// Rising-edge D flip-flop (d, clk) -> (q, !q)
    #[serde(rename = "dflipflop")]
    DFlipFlop,
    /// Rising-edge T flip-flop (t, clk) -> (q, !q)
    #[serde(rename = "tflipflop")]
    TFlipFlop,
    /// Rising-edge JK flip-flop (j, k, clk) -> (q, !q)
    #[serde(rename = "jkflipflop")]
    JkFlipFlop,
}

impl GateKind {
    /// All gate kinds, in factory order
    pub const ALL: [GateKind; 19] = [
        GateKind::Input,
        GateKind::Clock,
        GateKind::Output,
        GateKind::Transistor,
        GateKind::Not,
        GateKind::And,
        GateKind::Or,
        GateKind::Nand,
        GateKind::Nor,
        GateKind::Xor,
        GateKind::Xnor,
        GateKind::HalfAdder,
        GateKind::FullAdder,
        GateKind::Mux,
        GateKind::SrLatch,
        GateKind::DFlipFlop,
        GateKind::TFlipFlop,
        GateKind::JkFlipFlop,
        GateKind::TriState,
    ];

    /// Factory name of the kind
    pub fn name(&self) -> &'static str {
        use GateKind::*;
        match self {
            Input => "input",
            Clock => "clock",
            Output => "output",
            Transistor => "transistor",
            Not => "not",
            And => "and",
            Or => "or",
            Nand => "nand",
            Nor => "nor",
            Xor => "xor",
            Xnor => "xnor",
            TriState => "tristate",
            HalfAdder => "halfadder",
            FullAdder => "fulladder",
            Mux => "mux2to1",
            SrLatch => "srlatch",
            DFlipFlop => "dflipflop",
            TFlipFlop => "tflipflop",
            JkFlipFlop => "jkflipflop",
        }
    }

    /// Number of input pins
    pub fn input_count(&self) -> usize {
        use GateKind::*;
        match self {
            Input | Clock => 0,
            Output | Not => 1,
            Transistor | And | Or | Nand | Nor | Xor | Xnor | TriState | HalfAdder => 2,
            SrLatch | DFlipFlop | TFlipFlop => 2,
            FullAdder | Mux | JkFlipFlop => 3,
        }
    }

    /// Number of output pins
    ///
    /// Output terminals have no logical output; their sampled value is read separately.
    pub fn output_count(&self) -> usize {
        use GateKind::*;
        match self {
            Output => 0,
            Input | Clock | Transistor | Not | And | Or | Nand | Nor | Xor | Xnor | TriState
            | Mux => 1,
            HalfAdder | FullAdder | SrLatch | DFlipFlop | TFlipFlop | JkFlipFlop => 2,
        }
    }

    /// Propagation delay in nanoseconds, based on typical 74HC-series figures
    ///
    /// Flip-flops report their clock-to-output delay.
    pub fn propagation_delay(&self) -> u32 {
        use GateKind::*;
        match self {
            Input | Clock => 0,
            Output => 2,
            Transistor => 7,
            Not => 8,
            And | Or => 10,
            Nand | Nor => 8,
            Xor | Xnor => 14,
            TriState => 9,
            HalfAdder => 20,
            FullAdder => 28,
            Mux => 12,
            SrLatch => 10,
            DFlipFlop | TFlipFlop => 12,
            JkFlipFlop => 14,
        }
    }

    /// Returns whether the kind is driven from outside the circuit (input or clock)
    pub fn is_input_terminal(&self) -> bool {
        matches!(self, GateKind::Input | GateKind::Clock)
    }

    /// Returns whether the kind is an output terminal
    pub fn is_output_terminal(&self) -> bool {
        matches!(self, GateKind::Output)
    }

    /// Returns whether the kind holds state across evaluations
    pub fn is_sequential(&self) -> bool {
        use GateKind::*;
        matches!(self, SrLatch | DFlipFlop | TFlipFlop | JkFlipFlop | Clock)
    }

    /// Returns whether the kind keeps its own metastability flag across simulations
    pub fn tracks_metastability(&self) -> bool {
        matches!(self, GateKind::SrLatch | GateKind::DFlipFlop)
    }
}

impl FromStr for GateKind {
    type Err = CircuitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        GateKind::ALL
            .iter()
            .find(|k| k.name() == lower)
            .copied()
            .ok_or_else(|| CircuitError::UnknownGateKind(s.to_string()))
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
