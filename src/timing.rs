//! Static timing analysis
//!
//! Arrival times are computed from the per-kind propagation delays, independently of the
//! simulation state. Feedback loops cannot be ordered: the gates on and behind them are
//! left out of the analysis and reported through [`TimingReport::has_cycles`].

mod hazards;

use std::collections::VecDeque;
use std::fmt;

use fxhash::FxHashMap;
use itertools::Itertools;
use serde::Serialize;

use crate::circuit::{Circuit, GateId, GateKind};

pub use hazards::{Hazard, InputArrival};

/// Arrival time of a single gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateTiming {
    /// Gate
    pub id: GateId,
    /// Kind of the gate
    pub kind: GateKind,
    /// Time at which the gate output settles, in nanoseconds
    pub arrival_ns: u64,
    /// Propagation delay of the gate itself
    pub delay_ns: u32,
}

/// Result of the static timing analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingReport {
    /// Gates on the slowest path to an output terminal, from input to output
    pub critical_path: Vec<GateId>,
    /// Arrival time at the end of the critical path
    pub total_delay_ns: u64,
    /// Human-readable description of the critical path
    pub path_description: String,
    /// Maximum clock frequency, infinite for a zero-delay circuit
    pub max_frequency_mhz: f64,
    /// Arrival time of every gate, in insertion order; 0 for gates behind a feedback loop
    pub gate_delays: Vec<GateTiming>,
    /// Number of gates reached by the topological traversal
    pub reached: usize,
    /// Total number of gates
    pub total: usize,
    /// Whether some gates could not be ordered because of feedback
    pub has_cycles: bool,
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Timing:")?;
        writeln!(f, "  Critical path: {}", self.path_description)?;
        writeln!(f, "  Total delay: {}ns", self.total_delay_ns)?;
        if self.max_frequency_mhz.is_finite() {
            writeln!(f, "  Max frequency: {:.2}MHz", self.max_frequency_mhz)?;
        } else {
            writeln!(f, "  Max frequency: unbounded")?;
        }
        if self.has_cycles {
            writeln!(
                f,
                "  Feedback: {} of {} gates analyzed",
                self.reached, self.total
            )?;
        }
        Ok(())
    }
}

/// Maximum frequency in MHz for a path delay, rounded to two decimals
fn max_frequency_mhz(delay_ns: u64) -> f64 {
    if delay_ns == 0 {
        f64::INFINITY
    } else {
        (100_000.0 / delay_ns as f64).round() / 100.0
    }
}

impl Circuit {
    /// Upstream and downstream gates of each gate, without parallel edges
    pub(crate) fn adjacency(
        &self,
    ) -> (FxHashMap<GateId, Vec<GateId>>, FxHashMap<GateId, Vec<GateId>>) {
        let mut forward: FxHashMap<GateId, Vec<GateId>> = FxHashMap::default();
        let mut backward: FxHashMap<GateId, Vec<GateId>> = FxHashMap::default();
        for id in self.gates.keys() {
            forward.insert(*id, Vec::new());
            backward.insert(*id, Vec::new());
        }
        for w in self.wires.values() {
            let down = forward.entry(w.from()).or_default();
            if !down.contains(&w.to()) {
                down.push(w.to());
            }
            let up = backward.entry(w.to()).or_default();
            if !up.contains(&w.from()) {
                up.push(w.from());
            }
        }
        (forward, backward)
    }

    /// Compute arrival times in topological order and extract the critical path
    pub fn analyze_timing(&self) -> TimingReport {
        let (forward, backward) = self.adjacency();
        let mut in_degree: FxHashMap<GateId, usize> =
            backward.iter().map(|(id, up)| (*id, up.len())).collect();
        let mut arrival: FxHashMap<GateId, u64> = FxHashMap::default();
        let mut predecessor: FxHashMap<GateId, GateId> = FxHashMap::default();
        for id in self.input_ids() {
            arrival.insert(*id, self.gates[id].propagation_delay() as u64);
        }

        let mut queue: VecDeque<GateId> = self
            .gates
            .keys()
            .copied()
            .filter(|id| in_degree[id] == 0)
            .collect();
        let mut reached = 0;
        while let Some(id) = queue.pop_front() {
            reached += 1;
            let mut latest: Option<(GateId, u64)> = None;
            for up in &backward[&id] {
                let a = arrival.get(up).copied().unwrap_or(0);
                if latest.map_or(true, |(_, l)| a > l) {
                    latest = Some((*up, a));
                }
            }
            let base = latest.map_or(0, |(_, a)| a);
            arrival.insert(id, base + self.gates[&id].propagation_delay() as u64);
            if let Some((up, _)) = latest {
                predecessor.insert(id, up);
            }
            for down in &forward[&id] {
                let d = in_degree.entry(*down).or_default();
                *d -= 1;
                if *d == 0 {
                    queue.push_back(*down);
                }
            }
        }

        let mut end: Option<(GateId, u64)> = None;
        for id in self.output_ids() {
            let a = arrival.get(id).copied().unwrap_or(0);
            if a > end.map_or(0, |(_, e)| e) {
                end = Some((*id, a));
            }
        }

        let mut critical_path = Vec::new();
        let mut total_delay_ns = 0;
        if let Some((id, a)) = end {
            total_delay_ns = a;
            let mut cur = Some(id);
            while let Some(c) = cur {
                critical_path.push(c);
                cur = predecessor.get(&c).copied();
                // Feedback loops are never ordered, but stay safe on malformed chains
                if critical_path.len() > self.gates.len() {
                    break;
                }
            }
            critical_path.reverse();
        }
        let path_description = critical_path
            .iter()
            .map(|id| {
                let g = &self.gates[id];
                format!("{}({}ns)", g.kind(), g.propagation_delay())
            })
            .join(" → ");

        let gate_delays = self
            .gates
            .values()
            .map(|g| GateTiming {
                id: g.id(),
                kind: g.kind(),
                arrival_ns: arrival.get(&g.id()).copied().unwrap_or(0),
                delay_ns: g.propagation_delay(),
            })
            .collect();

        TimingReport {
            critical_path,
            total_delay_ns,
            path_description,
            max_frequency_mhz: max_frequency_mhz(total_delay_ns),
            gate_delays,
            reached,
            total: self.gates.len(),
            has_cycles: reached < self.gates.len(),
        }
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
    fn test_chain() {
        let mut c = Circuit::new();
        let a = add(&mut c, GateKind::Input);
        let n = add(&mut c, GateKind::Not);
        let o = add(&mut c, GateKind::Output);
        wire(&mut c, a, n, 0);
        wire(&mut c, n, o, 0);

        let t = c.analyze_timing();
        assert_eq!(t.total_delay_ns, 8 + 2);
        assert_eq!(t.critical_path, vec![a, n, o]);
        assert_eq!(t.path_description, "input(0ns) → not(8ns) → output(2ns)");
        assert_eq!(t.max_frequency_mhz, 100.0);
        assert!(!t.has_cycles);
        assert_eq!(t.reached, 3);
        assert_eq!(t.gate_delays.len(), 3);
        assert_eq!(t.gate_delays[1].arrival_ns, 8);
        assert_eq!(t.gate_delays[2].delay_ns, 2);
    }

    #[test]
    fn test_parallel_paths() {
        let mut c = Circuit::new();
        let a = add(&mut c, GateKind::Input);
        let b = add(&mut c, GateKind::Input);
        let x = add(&mut c, GateKind::And);
        let n1 = add(&mut c, GateKind::Not);
        let n2 = add(&mut c, GateKind::Xor);
        let o = add(&mut c, GateKind::Output);
        // Short path on pin 0, long path on pin 1
        wire(&mut c, b, x, 0);
        wire(&mut c, a, n1, 0);
        wire(&mut c, n1, n2, 0);
        wire(&mut c, a, n2, 1);
        wire(&mut c, n2, x, 1);
        wire(&mut c, x, o, 0);

        let t = c.analyze_timing();
        assert_eq!(t.critical_path, vec![a, n1, n2, x, o]);
        assert_eq!(t.total_delay_ns, 8 + 14 + 10 + 2);
        assert_eq!(t.max_frequency_mhz, 29.41);
    }

    #[test]
    fn test_cycles() {
        let mut c = Circuit::new();
        let a = add(&mut c, GateKind::Input);
        let x = add(&mut c, GateKind::Nor);
        let y = add(&mut c, GateKind::Nor);
        let o = add(&mut c, GateKind::Output);
        wire(&mut c, a, x, 0);
        wire(&mut c, y, x, 1);
        wire(&mut c, x, y, 0);
        wire(&mut c, y, o, 0);

        let t = c.analyze_timing();
        assert!(t.has_cycles);
        assert_eq!(t.reached, 1);
        assert_eq!(t.total, 4);
        assert_eq!(t.gate_delays.len(), 4);
        assert_eq!(t.gate_delays[0].id, a);
        assert_eq!(t.gate_delays[2].id, y);
        assert_eq!(t.gate_delays[2].arrival_ns, 0);
        assert_eq!(t.gate_delays[2].delay_ns, 8);
        assert!(t.critical_path.is_empty());
        assert_eq!(t.total_delay_ns, 0);
        assert!(t.max_frequency_mhz.is_infinite());
    }

    #[test]
    fn test_empty() {
        let t = Circuit::new().analyze_timing();
        assert!(t.critical_path.is_empty());
        assert_eq!(t.path_description, "");
        assert!(!t.has_cycles);
    }
}
