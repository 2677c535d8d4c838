use std::time::Instant;

use fxhash::FxHashSet;
use tracing::{debug, trace, warn};

use crate::circuit::{Circuit, Gate, GateId, Signal};
use crate::sim::{resolve_signals, SimulationReport};

impl Circuit {
    /// Settle all gate outputs for the current input values; return the output values
    ///
    /// Non-convergence and oscillation are not errors: the outputs reached so far are
    /// returned, and the outcome is described by [`Circuit::last_report`].
    pub fn simulate(&mut self) -> Vec<Signal> {
        let start = Instant::now();
        let max_passes = self.config.max_passes;
        let budget = self.config.time_budget();

        for gate in self.gates.values_mut() {
            if !gate.kind().tracks_metastability() {
                gate.set_metastable(false);
            }
        }

        let mut seen: FxHashSet<Vec<Signal>> = FxHashSet::default();
        let mut changed = true;
        let mut oscillating = false;
        let mut passes = 0;
        while changed && passes < max_passes {
            if start.elapsed() > budget {
                warn!(
                    "Simulation aborted after {} passes: time budget of {:?} exceeded",
                    passes, budget
                );
                break;
            }
            changed = false;
            passes += 1;
            for i in 0..self.gates.len() {
                changed |= self.evaluate(i, passes);
            }
            trace!("Pass {}: changed={}", passes, changed);
            if changed && !seen.insert(self.fingerprint()) {
                oscillating = true;
                break;
            }
        }

        let max_delay = self
            .gates
            .values()
            .map(|g| g.propagation_delay() as u64)
            .max()
            .unwrap_or(0)
            .max(1);
        self.now_ns += (passes as u64 + 1) * max_delay;

        self.report = SimulationReport {
            passes,
            max_passes,
            converged: !changed && !oscillating,
            oscillating,
            undefined_nodes: self.undefined_nodes(),
            elapsed: start.elapsed(),
            gate_count: self.gates.len(),
            wire_count: self.wires.len(),
        };
        debug!(
            "Simulated {} gates in {} passes: {}",
            self.report.gate_count,
            passes,
            self.report.status()
        );
        self.get_outputs()
    }

    /// Resolve the inputs of the i-th gate and recompute it; return whether its outputs changed
    ///
    /// Every gate goes through the same path: a pin without driver reads Low, which matches
    /// a gate with no incoming wire keeping its default inputs.
    fn evaluate(&mut self, i: usize, pass: usize) -> bool {
        let gate = &self.gates[i];
        let mut drivers: Vec<Vec<Signal>> = vec![Vec::new(); gate.input_count()];
        let delay = gate.propagation_delay() as u64;
        let wire_ids = gate.input_wires().to_vec();
        for w in wire_ids {
            let wire = &mut self.wires[&w];
            let s = wire.propagate(&self.gates);
            if let Some(d) = drivers.get_mut(wire.to_pin()) {
                d.push(s);
            }
        }

        let mut has_undefined = false;
        let values: Vec<Signal> = drivers
            .iter()
            .map(|d| {
                let v = match d.as_slice() {
                    [] => Signal::Low,
                    [s] => *s,
                    _ => resolve_signals(d),
                };
                has_undefined |= v.is_undefined();
                v.pulled_down()
            })
            .collect();

        let now_ns = self.now_ns + pass as u64 * delay;
        let gate = &mut self.gates[i];
        let old = gate.observed().to_vec();
        gate.set_inputs(&values, now_ns);
        if has_undefined && !gate.kind().tracks_metastability() {
            gate.set_metastable(true);
        }
        gate.observed() != old.as_slice()
    }

    /// Global state of the circuit, compared by value across passes
    fn fingerprint(&self) -> Vec<Signal> {
        self.gates
            .values()
            .flat_map(|g| g.observed().iter().copied())
            .collect()
    }

    /// Gates marked undefined, carrying an undefined output, or driving an undefined wire
    fn undefined_nodes(&self) -> Vec<GateId> {
        let mut ret: Vec<GateId> = self
            .gates
            .values()
            .filter(|g| g.is_metastable() || g.observed().iter().any(Signal::is_undefined))
            .map(Gate::id)
            .collect();
        for w in self.wires.values() {
            if w.is_undefined() && !ret.contains(&w.from()) {
                ret.push(w.from());
            }
        }
        ret
    }
}

#[cfg(test)]
mod tests {
    use crate::circuit::signal::Signal::{High as H, HighZ as Z, Low as L, Undefined as U};
    use crate::circuit::{Circuit, GateId, GateKind};
    use crate::sim::SimulationStatus;

    fn add(c: &mut Circuit, kind: GateKind, y: f64) -> GateId {
        c.add_gate(kind, 0.0, y).accepted().unwrap()
    }

    fn wire(c: &mut Circuit, from: GateId, fp: usize, to: GateId, tp: usize) {
        c.connect(from, fp, to, tp).unwrap().accepted().unwrap();
    }

    #[test]
    fn test_and() {
        let mut c = Circuit::new();
        let a = add(&mut c, GateKind::Input, 0.0);
        let b = add(&mut c, GateKind::Input, 100.0);
        let x = add(&mut c, GateKind::And, 50.0);
        let o = add(&mut c, GateKind::Output, 50.0);
        wire(&mut c, a, 0, x, 0);
        wire(&mut c, b, 0, x, 1);
        wire(&mut c, x, 0, o, 0);

        for (va, vb, exp) in [
            (false, false, L),
            (false, true, L),
            (true, false, L),
            (true, true, H),
        ] {
            c.set_inputs(&[va, vb]);
            assert_eq!(c.simulate(), vec![exp]);
            let r = c.last_report();
            assert!(r.converged);
            assert!(!r.oscillating);
            assert!(r.undefined_nodes.is_empty());
            assert_eq!(r.status(), SimulationStatus::Converged);
            assert_eq!(r.gate_count, 4);
            assert_eq!(r.wire_count, 3);
        }
    }

    #[test]
    fn test_idempotent() {
        let mut c = Circuit::new();
        let a = add(&mut c, GateKind::Input, 0.0);
        let n1 = add(&mut c, GateKind::Not, 0.0);
        let n2 = add(&mut c, GateKind::Not, 0.0);
        let o = add(&mut c, GateKind::Output, 0.0);
        wire(&mut c, a, 0, n1, 0);
        wire(&mut c, n1, 0, n2, 0);
        wire(&mut c, n2, 0, o, 0);

        c.set_inputs(&[true]);
        let first = c.simulate();
        assert!(c.last_report().passes > 1);
        let second = c.simulate();
        assert_eq!(first, second);
        assert_eq!(second, vec![H]);
        assert_eq!(c.last_report().passes, 1);
        assert!(c.last_report().converged);
    }

    #[test]
    fn test_ring_oscillator() {
        let mut c = Circuit::new();
        let n: Vec<GateId> = (0..3).map(|_| add(&mut c, GateKind::Not, 0.0)).collect();
        for i in 0..3 {
            wire(&mut c, n[i], 0, n[(i + 1) % 3], 0);
        }
        c.simulate();
        let r = c.last_report();
        assert!(r.oscillating);
        assert!(!r.converged);
        assert!(r.passes < 15);
        assert_eq!(r.status(), SimulationStatus::Oscillating);
    }

    #[test]
    fn test_pass_ceiling() {
        // Inserting the chain backwards makes every pass advance by a single gate
        let mut c = Circuit::new();
        let a = add(&mut c, GateKind::Input, 0.0);
        let mut chain: Vec<GateId> = (0..20).map(|_| add(&mut c, GateKind::Not, 0.0)).collect();
        chain.reverse();
        let o = add(&mut c, GateKind::Output, 0.0);
        wire(&mut c, a, 0, chain[0], 0);
        for i in 1..chain.len() {
            wire(&mut c, chain[i - 1], 0, chain[i], 0);
        }
        wire(&mut c, chain[19], 0, o, 0);

        c.simulate();
        let r = c.last_report();
        assert_eq!(r.passes, 15);
        assert_eq!(r.max_passes, 15);
        assert!(!r.converged);
        assert!(!r.oscillating);
        assert_eq!(r.status(), SimulationStatus::NotConverged);

        // Further calls finish the job
        c.simulate();
        assert!(c.last_report().converged);
        assert_eq!(c.get_outputs(), vec![L]);
    }

    #[test]
    fn test_bus_contention() {
        let mut c = Circuit::new();
        let a = add(&mut c, GateKind::Input, 0.0);
        let b = add(&mut c, GateKind::Input, 100.0);
        let o = add(&mut c, GateKind::Output, 0.0);
        wire(&mut c, a, 0, o, 0);
        wire(&mut c, b, 0, o, 0);

        c.set_inputs(&[true, false]);
        assert_eq!(c.simulate(), vec![U]);
        assert_eq!(c.last_report().undefined_nodes, vec![o]);
        assert!(c.gate(o).unwrap().is_metastable());
        assert_eq!(c.last_report().status(), SimulationStatus::Undefined);

        c.set_inputs(&[true, true]);
        assert_eq!(c.simulate(), vec![H]);
        assert!(c.last_report().undefined_nodes.is_empty());
        assert!(!c.gate(o).unwrap().is_metastable());

        c.set_inputs(&[false, false]);
        assert_eq!(c.simulate(), vec![L]);
    }

    #[test]
    fn test_tristate_bus() {
        let mut c = Circuit::new();
        let d0 = add(&mut c, GateKind::Input, 0.0);
        let e0 = add(&mut c, GateKind::Input, 1.0);
        let d1 = add(&mut c, GateKind::Input, 2.0);
        let e1 = add(&mut c, GateKind::Input, 3.0);
        let t0 = add(&mut c, GateKind::TriState, 0.0);
        let t1 = add(&mut c, GateKind::TriState, 0.0);
        let n = add(&mut c, GateKind::Not, 0.0);
        let o = add(&mut c, GateKind::Output, 0.0);
        wire(&mut c, d0, 0, t0, 0);
        wire(&mut c, e0, 0, t0, 1);
        wire(&mut c, d1, 0, t1, 0);
        wire(&mut c, e1, 0, t1, 1);
        wire(&mut c, t0, 0, n, 0);
        wire(&mut c, t1, 0, n, 0);
        wire(&mut c, n, 0, o, 0);

        // Single active driver
        c.set_inputs(&[true, true, false, false]);
        assert_eq!(c.simulate(), vec![L]);
        assert_eq!(c.gate(t1).unwrap().outputs(), &[Z]);

        // Floating bus is pulled down
        c.set_inputs(&[true, false, false, false]);
        assert_eq!(c.simulate(), vec![H]);

        // Agreement
        c.set_inputs(&[true, true, true, true]);
        assert_eq!(c.simulate(), vec![L]);

        // Contention
        c.set_inputs(&[true, true, false, true]);
        assert_eq!(c.simulate(), vec![U]);
        let undefined = &c.last_report().undefined_nodes;
        assert!(undefined.contains(&n));
        assert!(undefined.contains(&o));
    }

    #[test]
    fn test_latch_release() {
        let mut c = Circuit::new();
        let s = add(&mut c, GateKind::Input, 0.0);
        let r = add(&mut c, GateKind::Input, 100.0);
        let l = add(&mut c, GateKind::SrLatch, 50.0);
        let q = add(&mut c, GateKind::Output, 0.0);
        let qn = add(&mut c, GateKind::Output, 100.0);
        wire(&mut c, s, 0, l, 0);
        wire(&mut c, r, 0, l, 1);
        wire(&mut c, l, 0, q, 0);
        wire(&mut c, l, 1, qn, 0);

        c.set_inputs(&[true, false]);
        assert_eq!(c.simulate(), vec![H, L]);
        c.set_inputs(&[false, false]);
        assert_eq!(c.simulate(), vec![H, L]);
        c.set_inputs(&[true, true]);
        assert_eq!(c.simulate(), vec![U, U]);
        c.set_inputs(&[false, false]);
        assert_eq!(c.simulate(), vec![U, U]);
        assert!(c.last_report().undefined_nodes.contains(&l));
        // The latch keeps its mark across simulations
        assert!(c.gate(l).unwrap().is_metastable());
        c.set_inputs(&[false, true]);
        assert_eq!(c.simulate(), vec![L, H]);
        assert!(!c.gate(l).unwrap().is_metastable());
        assert!(c.last_report().undefined_nodes.is_empty());
    }

    #[test]
    fn test_latch_contended_set() {
        let mut c = Circuit::new();
        let a = add(&mut c, GateKind::Input, 0.0);
        let b = add(&mut c, GateKind::Input, 100.0);
        let r = add(&mut c, GateKind::Input, 200.0);
        let l = add(&mut c, GateKind::SrLatch, 0.0);
        let q = add(&mut c, GateKind::Output, 0.0);
        wire(&mut c, a, 0, l, 0);
        wire(&mut c, b, 0, l, 0);
        wire(&mut c, r, 0, l, 1);
        wire(&mut c, l, 0, q, 0);

        c.set_inputs(&[true, false, false]);
        assert_eq!(c.simulate(), vec![U]);
        assert_eq!(c.gate(l).unwrap().inputs(), &[U, L]);
        assert!(c.gate(l).unwrap().is_metastable());
        let undefined = &c.last_report().undefined_nodes;
        assert!(undefined.contains(&l));
        assert!(undefined.contains(&q));
        assert_eq!(c.last_report().status(), SimulationStatus::Undefined);

        // Drivers agree again: a clean set resolves the latch
        c.set_inputs(&[true, true, false]);
        assert_eq!(c.simulate(), vec![H]);
        assert!(!c.gate(l).unwrap().is_metastable());
        assert!(c.last_report().undefined_nodes.is_empty());
        assert!(c.last_report().converged);
    }

    #[test]
    fn test_flip_flop_contended_clock() {
        for (kind, clock_pin) in [
            (GateKind::DFlipFlop, 1),
            (GateKind::TFlipFlop, 1),
            (GateKind::JkFlipFlop, 2),
        ] {
            let mut c = Circuit::new();
            let d = add(&mut c, GateKind::Input, 0.0);
            let c1 = add(&mut c, GateKind::Input, 100.0);
            let c2 = add(&mut c, GateKind::Input, 200.0);
            let ff = add(&mut c, kind, 0.0);
            let o = add(&mut c, GateKind::Output, 0.0);
            for pin in 0..clock_pin {
                wire(&mut c, d, 0, ff, pin);
            }
            wire(&mut c, c1, 0, ff, clock_pin);
            wire(&mut c, c2, 0, ff, clock_pin);
            wire(&mut c, ff, 0, o, 0);

            c.set_inputs(&[true, true, false]);
            assert_eq!(c.simulate(), vec![U], "{kind}");
            assert!(c.gate(ff).unwrap().is_metastable(), "{kind}");
            let undefined = &c.last_report().undefined_nodes;
            assert!(undefined.contains(&ff), "{kind}");
            assert!(undefined.contains(&o), "{kind}");
            assert_eq!(c.last_report().status(), SimulationStatus::Undefined);

            // A clean rising edge captures, or toggles out of the undefined state
            c.set_inputs(&[true, true, true]);
            let expected = if kind == GateKind::DFlipFlop { H } else { L };
            assert_eq!(c.simulate(), vec![expected], "{kind}");
            assert!(!c.gate(ff).unwrap().is_metastable(), "{kind}");
            assert!(c.last_report().undefined_nodes.is_empty(), "{kind}");
        }
    }

    #[test]
    fn test_undefined_propagation() {
        let mut c = Circuit::new();
        let s = add(&mut c, GateKind::Input, 0.0);
        let l = add(&mut c, GateKind::SrLatch, 0.0);
        let x = add(&mut c, GateKind::And, 0.0);
        let o = add(&mut c, GateKind::Output, 0.0);
        wire(&mut c, s, 0, l, 0);
        wire(&mut c, s, 0, l, 1);
        wire(&mut c, l, 0, x, 0);
        wire(&mut c, s, 0, x, 1);
        wire(&mut c, x, 0, o, 0);

        c.set_inputs(&[true]);
        assert_eq!(c.simulate(), vec![U]);
        assert!(c.gate(x).unwrap().is_metastable());
        let undefined = &c.last_report().undefined_nodes;
        for g in [l, x, o] {
            assert!(undefined.contains(&g));
        }
        assert!(!undefined.contains(&s));
    }

    #[test]
    fn test_clocked_flip_flop() {
        let mut c = Circuit::new();
        let d = add(&mut c, GateKind::Input, 0.0);
        let clk = add(&mut c, GateKind::Clock, 100.0);
        let ff = add(&mut c, GateKind::DFlipFlop, 0.0);
        let o = add(&mut c, GateKind::Output, 0.0);
        wire(&mut c, d, 0, ff, 0);
        wire(&mut c, clk, 0, ff, 1);
        wire(&mut c, ff, 0, o, 0);

        c.set_input(d, true).unwrap();
        assert_eq!(c.simulate(), vec![L]);
        // Half a period of the default 0.5Hz clock is one second
        assert!(!c.tick(400.0));
        assert!(c.tick(600.0));
        assert_eq!(c.get_outputs(), vec![H]);

        c.set_input(d, false).unwrap();
        c.simulate();
        assert!(c.pulse_clocks());
        assert_eq!(c.get_outputs(), vec![H]);
        assert!(c.pulse_clocks());
        assert_eq!(c.get_outputs(), vec![L]);

        c.set_clocks_active(false);
        assert!(!c.tick(5000.0));

        c.reset();
        assert_eq!(c.get_outputs(), vec![L]);
        assert_eq!(c.gate(d).unwrap().outputs(), &[L]);
    }
}
