//! Compute gate statistics
//!
//! ```
//! # use gatesim::Circuit;
//! # let circuit = Circuit::new();
//! use gatesim::circuit::stats::stats;
//! let stats = stats(&circuit);
//!
//! // Check that there is no flip-flop
//! assert_eq!(stats.nb_sequential, 0);
//!
//! // Show the statistics
//! println!("{}", stats);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use crate::circuit::{Circuit, GateKind};

/// Number of terminals, gates and wires in a circuit
#[derive(Clone, Debug)]
pub struct CircuitStats {
    /// Number of input terminals
    pub nb_inputs: usize,
    /// Number of clock sources
    pub nb_clocks: usize,
    /// Number of output terminals
    pub nb_outputs: usize,
    /// Number of wires
    pub nb_wires: usize,
    /// Number of storage elements
    pub nb_sequential: usize,
    /// Number of wires sharing their input pin with another wire
    pub nb_bus_wires: usize,
    /// Sum of the propagation delays of all gates
    pub total_delay_ns: u64,
    /// Number of gates of each kind, terminals excluded
    pub by_kind: BTreeMap<GateKind, usize>,
}

impl CircuitStats {
    /// Total number of logic gates, terminals excluded
    pub fn nb_gates(&self) -> usize {
        self.by_kind.values().sum()
    }
}

impl fmt::Display for CircuitStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stats:")?;
        writeln!(f, "  Inputs: {}", self.nb_inputs)?;
        if self.nb_clocks != 0 {
            writeln!(f, "  Clocks: {}", self.nb_clocks)?;
        }
        writeln!(f, "  Outputs: {}", self.nb_outputs)?;
        writeln!(f, "  Gates: {}", self.nb_gates())?;
        for (kind, nb) in &self.by_kind {
            writeln!(f, "      {}: {}", kind, nb)?;
        }
        if self.nb_sequential != 0 {
            writeln!(f, "  Sequential: {}", self.nb_sequential)?;
        }
        writeln!(f, "  Wires: {}", self.nb_wires)?;
        if self.nb_bus_wires != 0 {
            writeln!(f, "      on shared pins: {}", self.nb_bus_wires)?;
        }
        writeln!(f, "  Total delay: {}ns", self.total_delay_ns)?;
        fmt::Result::Ok(())
    }
}

/// Compute the statistics of the circuit
pub fn stats(c: &Circuit) -> CircuitStats {
    let mut ret = CircuitStats {
        nb_inputs: 0,
        nb_clocks: 0,
        nb_outputs: 0,
        nb_wires: c.nb_wires(),
        nb_sequential: 0,
        nb_bus_wires: 0,
        total_delay_ns: 0,
        by_kind: BTreeMap::new(),
    };
    for g in c.gates() {
        ret.total_delay_ns += g.propagation_delay() as u64;
        match g.kind() {
            GateKind::Input => ret.nb_inputs += 1,
            GateKind::Clock => ret.nb_clocks += 1,
            GateKind::Output => ret.nb_outputs += 1,
            k => {
                if k.is_sequential() {
                    ret.nb_sequential += 1;
                }
                *ret.by_kind.entry(k).or_default() += 1;
            }
        }
        let mut pins: Vec<usize> = g
            .input_wires()
            .iter()
            .filter_map(|w| c.wire(*w).map(|w| w.to_pin()))
            .collect();
        pins.sort_unstable();
        for (i, p) in pins.iter().enumerate() {
            let shared = (i > 0 && pins[i - 1] == *p) || pins.get(i + 1) == Some(p);
            if shared {
                ret.nb_bus_wires += 1;
            }
        }
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats() {
        let mut c = Circuit::new();
        let a = c.add_gate(GateKind::Input, 0.0, 0.0).accepted().unwrap();
        let b = c.add_gate(GateKind::Input, 0.0, 1.0).accepted().unwrap();
        let clk = c.add_gate(GateKind::Clock, 0.0, 2.0).accepted().unwrap();
        let t = c.add_gate(GateKind::TriState, 1.0, 0.0).accepted().unwrap();
        let d = c.add_gate(GateKind::DFlipFlop, 2.0, 0.0).accepted().unwrap();
        let o = c.add_gate(GateKind::Output, 3.0, 0.0).accepted().unwrap();
        c.connect(a, 0, t, 0).unwrap().accepted().unwrap();
        c.connect(b, 0, t, 1).unwrap().accepted().unwrap();
        c.connect(t, 0, d, 0).unwrap().accepted().unwrap();
        c.connect(a, 0, d, 0).unwrap().accepted().unwrap();
        c.connect(clk, 0, d, 1).unwrap().accepted().unwrap();
        c.connect(d, 0, o, 0).unwrap().accepted().unwrap();

        let s = stats(&c);
        assert_eq!(s.nb_inputs, 2);
        assert_eq!(s.nb_clocks, 1);
        assert_eq!(s.nb_outputs, 1);
        assert_eq!(s.nb_gates(), 2);
        assert_eq!(s.nb_sequential, 1);
        assert_eq!(s.nb_wires, 6);
        assert_eq!(s.nb_bus_wires, 2);
        assert_eq!(s.by_kind[&GateKind::TriState], 1);
        assert_eq!(s.total_delay_ns, 9 + 12 + 2);
        let shown = format!("{s}");
        assert!(shown.contains("Clocks: 1"));
        assert!(shown.contains("on shared pins: 2"));
    }
}
