//! Heuristic detection of static hazards
//!
//! Reconverging paths with unequal delays may let a gate see a short pulse before its
//! output settles. Only a shallow estimate of the input arrival times is used: the delay
//! of the driving gate, plus the slowest of its own drivers.

use std::fmt;

use itertools::Itertools;
use serde::Serialize;

use crate::circuit::delay::DEFAULT_DELAY_NS;
use crate::circuit::{Circuit, GateId, GateKind};

/// Estimated arrival time of one input of a gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputArrival {
    /// Input pin
    pub pin: usize,
    /// Driving gate
    pub source: GateId,
    /// Kind of the driving gate
    pub source_kind: GateKind,
    /// Estimated arrival time, in nanoseconds
    pub arrival_ns: u64,
}

/// A gate whose inputs arrive too far apart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hazard {
    /// Gate at risk
    pub gate: GateId,
    /// Kind of the gate
    pub kind: GateKind,
    /// Spread between the earliest and the latest input
    pub skew_ns: u64,
    /// Arrival time of every driven input
    pub inputs: Vec<InputArrival>,
    /// Human-readable explanation
    pub description: String,
}

impl fmt::Display for Hazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

impl Circuit {
    /// Estimated arrival time of the signal carried by each input wire of a gate
    fn input_arrivals(&self, id: GateId) -> Vec<InputArrival> {
        let gate = &self.gates[&id];
        gate.input_wires()
            .iter()
            .map(|w| {
                let w = &self.wires[w];
                let source = &self.gates[&w.from()];
                let upstream = source
                    .input_wires()
                    .iter()
                    .map(|u| self.gates[&self.wires[u].from()].propagation_delay() as u64)
                    .max()
                    .unwrap_or(0);
                InputArrival {
                    pin: w.to_pin(),
                    source: source.id(),
                    source_kind: source.kind(),
                    arrival_ns: source.propagation_delay() as u64 + upstream,
                }
            })
            .collect()
    }

    /// Report combinational gates whose input arrival times differ by more than their own delay
    ///
    /// Terminals and storage elements are skipped, as they hold state by nature.
    pub fn detect_hazards(&self) -> Vec<Hazard> {
        let mut ret = Vec::new();
        for gate in self.gates.values() {
            let kind = gate.kind();
            if kind.is_input_terminal() || kind.is_output_terminal() || kind.is_sequential() {
                continue;
            }
            let inputs = self.input_arrivals(gate.id());
            if inputs.len() < 2 {
                continue;
            }
            let Some((earliest, latest)) = inputs
                .iter()
                .minmax_by_key(|i| i.arrival_ns)
                .into_option()
            else {
                continue;
            };
            let skew_ns = latest.arrival_ns - earliest.arrival_ns;
            let threshold = match gate.propagation_delay() {
                0 => DEFAULT_DELAY_NS,
                d => d,
            } as u64;
            if skew_ns > threshold {
                let description = format!(
                    "Static hazard at {} ({}): input {} via {} arrives at {}ns, input {} via {} at {}ns; {}ns skew exceeds the {}ns gate delay",
                    kind,
                    gate.id(),
                    earliest.pin,
                    earliest.source_kind,
                    earliest.arrival_ns,
                    latest.pin,
                    latest.source_kind,
                    latest.arrival_ns,
                    skew_ns,
                    threshold
                );
                ret.push(Hazard {
                    gate: gate.id(),
                    kind,
                    skew_ns,
                    description,
                    inputs,
                });
            }
        }
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(c: &mut Circuit, kind: GateKind) -> GateId {
        c.add_gate(kind, 0.0, 0.0).accepted().unwrap()
    }

    fn wire(c: &mut Circuit, from: GateId, to: GateId, tp: usize) {
        c.connect(from, 0, to, tp).unwrap().accepted().unwrap();
    }

    #[test]
    fn test_reconvergent_paths() {
        let mut c = Circuit::new();
        let a = add(&mut c, GateKind::Input);
        let x1 = add(&mut c, GateKind::Xor);
        let x2 = add(&mut c, GateKind::Xor);
        let g = add(&mut c, GateKind::And);
        let o = add(&mut c, GateKind::Output);
        wire(&mut c, a, x1, 0);
        wire(&mut c, a, x1, 1);
        wire(&mut c, x1, x2, 0);
        wire(&mut c, a, x2, 1);
        wire(&mut c, a, g, 0);
        wire(&mut c, x2, g, 1);
        wire(&mut c, g, o, 0);

        let hazards = c.detect_hazards();
        // The second xor sees a 14ns skew, which does not exceed its own delay
        assert_eq!(hazards.len(), 1);
        let h = &hazards[0];
        assert_eq!(h.gate, g);
        assert_eq!(h.kind, GateKind::And);
        assert_eq!(h.skew_ns, 28);
        assert_eq!(h.inputs.len(), 2);
        assert_eq!(h.inputs[0].arrival_ns, 0);
        assert_eq!(h.inputs[1].arrival_ns, 28);
        assert_eq!(h.inputs[1].source, x2);
        assert!(h.description.contains("28ns skew"));
    }

    #[test]
    fn test_sequential_skipped() {
        let mut c = Circuit::new();
        let a = add(&mut c, GateKind::Input);
        let x1 = add(&mut c, GateKind::FullAdder);
        let x2 = add(&mut c, GateKind::FullAdder);
        let ff = add(&mut c, GateKind::DFlipFlop);
        let jk = add(&mut c, GateKind::JkFlipFlop);
        wire(&mut c, a, x1, 0);
        wire(&mut c, x1, x2, 0);
        wire(&mut c, x2, ff, 0);
        wire(&mut c, a, ff, 1);
        wire(&mut c, x2, jk, 0);
        wire(&mut c, a, jk, 2);
        assert!(c.detect_hazards().is_empty());
    }
}
