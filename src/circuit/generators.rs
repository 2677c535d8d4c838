//! Circuit generators and templates
//!
//! Generated circuits get limits large enough to hold them. Terminals are placed so that
//! the truth-table order follows the natural bit order.

use crate::circuit::{Circuit, GateId, GateKind};
use crate::config::SimConfig;
use crate::error::Result;

/// Circuit with limits raised to fit the requested size
fn sized(nb_gates: usize, nb_wires: usize) -> Circuit {
    let default = SimConfig::default();
    Circuit::with_config(SimConfig {
        max_gates: default.max_gates.max(nb_gates),
        max_wires: default.max_wires.max(nb_wires),
        ..default
    })
}

fn place(c: &mut Circuit, kind: GateKind, x: f64, y: f64) -> Result<GateId> {
    c.add_gate(kind, x, y).into_result()
}

fn link(c: &mut Circuit, from: GateId, from_pin: usize, to: GateId, to_pin: usize) -> Result<()> {
    c.connect(from, from_pin, to, to_pin)?.into_result()?;
    Ok(())
}

/// Adder generators
pub mod adder {
    use super::{link, place, sized};
    use crate::circuit::{Circuit, GateKind};
    use crate::error::Result;

    /// A simple and slow ripple-carry adder
    ///
    /// Inputs are ordered a0, b0, a1, b1, ...; outputs are the sum bits, least significant
    /// first, followed by the carry out.
    pub fn ripple_carry(len: usize) -> Result<Circuit> {
        let mut ret = sized(4 * len + 1, 4 * len);
        let mut carry = None;
        for i in 0..len {
            let y = 200.0 * i as f64;
            let a = place(&mut ret, GateKind::Input, 0.0, y)?;
            let b = place(&mut ret, GateKind::Input, 0.0, y + 100.0)?;
            let kind = if carry.is_some() {
                GateKind::FullAdder
            } else {
                GateKind::HalfAdder
            };
            let add = place(&mut ret, kind, 200.0, y)?;
            link(&mut ret, a, 0, add, 0)?;
            link(&mut ret, b, 0, add, 1)?;
            if let Some(c) = carry {
                link(&mut ret, c, 1, add, 2)?;
            }
            let s = place(&mut ret, GateKind::Output, 400.0, y)?;
            ret.set_label(s, Some(format!("S{i}")))?;
            link(&mut ret, add, 0, s, 0)?;
            carry = Some(add);
        }
        if let Some(c) = carry {
            let o = place(&mut ret, GateKind::Output, 400.0, 200.0 * len as f64)?;
            ret.set_label(o, Some("COUT".to_string()))?;
            link(&mut ret, c, 1, o, 0)?;
        }
        ret.check();
        Ok(ret)
    }
}

/// Counter generators
pub mod counter {
    use super::{link, place, sized};
    use crate::circuit::{Circuit, GateKind};
    use crate::error::Result;

    /// A synchronous binary counter made of toggle flip-flops
    ///
    /// Inputs are an enable and a clock. Outputs are the counter bits, least significant first.
    /// The toggle conditions are computed after the flip-flops, so that all flip-flops see
    /// the conditions from before the clock edge.
    pub fn synchronous(bits: usize) -> Result<Circuit> {
        let mut ret = sized(4 * bits + 2, 5 * bits);
        let en = place(&mut ret, GateKind::Input, 0.0, 0.0)?;
        ret.set_label(en, Some("EN".to_string()))?;
        let clk = place(&mut ret, GateKind::Clock, 0.0, 100.0)?;
        let mut flops = Vec::new();
        for i in 0..bits {
            let ff = place(&mut ret, GateKind::TFlipFlop, 200.0, 100.0 * i as f64)?;
            link(&mut ret, clk, 0, ff, 1)?;
            flops.push(ff);
        }
        let mut toggle = en;
        for (i, ff) in flops.iter().enumerate() {
            if i > 0 {
                let t = place(&mut ret, GateKind::And, 100.0, 100.0 * i as f64)?;
                link(&mut ret, toggle, 0, t, 0)?;
                link(&mut ret, flops[i - 1], 0, t, 1)?;
                toggle = t;
            }
            link(&mut ret, toggle, 0, *ff, 0)?;
        }
        for (i, ff) in flops.iter().enumerate() {
            let q = place(&mut ret, GateKind::Output, 400.0, 100.0 * i as f64)?;
            ret.set_label(q, Some(format!("Q{i}")))?;
            link(&mut ret, *ff, 0, q, 0)?;
        }
        ret.check();
        Ok(ret)
    }
}

/// Simple generators to test functionality
pub mod testcases {
    use super::{link, place, sized};
    use crate::circuit::{Circuit, GateId, GateKind};
    use crate::error::Result;

    /// A chain of inverters between an input and an output
    ///
    /// With `reversed`, the inverters are added from the output side, so that each
    /// simulation pass only advances the signal by one inverter.
    pub fn inverter_chain(len: usize, reversed: bool) -> Result<Circuit> {
        let mut ret = sized(len + 2, len + 1);
        let input = place(&mut ret, GateKind::Input, 0.0, 0.0)?;
        let mut chain: Vec<GateId> = Vec::new();
        for i in 0..len {
            chain.push(place(&mut ret, GateKind::Not, 100.0 * (i + 1) as f64, 0.0)?);
        }
        if reversed {
            chain.reverse();
        }
        let output = place(&mut ret, GateKind::Output, 100.0 * (len + 1) as f64, 0.0)?;
        let mut prev = input;
        for n in chain {
            link(&mut ret, prev, 0, n, 0)?;
            prev = n;
        }
        link(&mut ret, prev, 0, output, 0)?;
        ret.check();
        Ok(ret)
    }

    /// A closed loop of inverters, observed by an output
    ///
    /// An odd number of inverters never settles.
    pub fn ring_oscillator(len: usize) -> Result<Circuit> {
        assert!(len > 0);
        let mut ret = sized(len + 1, len + 1);
        let ring: Vec<GateId> = (0..len)
            .map(|i| place(&mut ret, GateKind::Not, 100.0 * i as f64, 0.0))
            .collect::<Result<_>>()?;
        for i in 0..len {
            link(&mut ret, ring[i], 0, ring[(i + 1) % len], 0)?;
        }
        let output = place(&mut ret, GateKind::Output, 100.0 * len as f64, 0.0)?;
        link(&mut ret, ring[len - 1], 0, output, 0)?;
        ret.check();
        Ok(ret)
    }

    /// A set-reset latch made of two cross-coupled Nor gates
    ///
    /// Inputs are S and R, outputs are Q and its complement.
    pub fn sr_latch_nor() -> Result<Circuit> {
        let mut ret = sized(6, 8);
        let s = place(&mut ret, GateKind::Input, 0.0, 0.0)?;
        ret.set_label(s, Some("S".to_string()))?;
        let r = place(&mut ret, GateKind::Input, 0.0, 100.0)?;
        ret.set_label(r, Some("R".to_string()))?;
        let nor_q = place(&mut ret, GateKind::Nor, 200.0, 0.0)?;
        let nor_qn = place(&mut ret, GateKind::Nor, 200.0, 100.0)?;
        link(&mut ret, r, 0, nor_q, 0)?;
        link(&mut ret, nor_qn, 0, nor_q, 1)?;
        link(&mut ret, s, 0, nor_qn, 0)?;
        link(&mut ret, nor_q, 0, nor_qn, 1)?;
        let q = place(&mut ret, GateKind::Output, 400.0, 0.0)?;
        ret.set_label(q, Some("Q".to_string()))?;
        let qn = place(&mut ret, GateKind::Output, 400.0, 100.0)?;
        ret.set_label(qn, Some("QN".to_string()))?;
        link(&mut ret, nor_q, 0, q, 0)?;
        link(&mut ret, nor_qn, 0, qn, 0)?;
        ret.check();
        Ok(ret)
    }
}

/// Random circuit generators, for robustness testing
pub mod random {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::{link, place, sized};
    use crate::circuit::{Circuit, GateId, GateKind};
    use crate::error::Result;

    /// Kinds drawn for the internal gates
    const KINDS: [GateKind; 16] = [
        GateKind::Transistor,
        GateKind::Not,
        GateKind::And,
        GateKind::Or,
        GateKind::Nand,
        GateKind::Nor,
        GateKind::Xor,
        GateKind::Xnor,
        GateKind::TriState,
        GateKind::HalfAdder,
        GateKind::FullAdder,
        GateKind::Mux,
        GateKind::SrLatch,
        GateKind::DFlipFlop,
        GateKind::TFlipFlop,
        GateKind::JkFlipFlop,
    ];

    /// A random circuit with every input pin driven
    ///
    /// Without feedback, each gate is only driven by gates added before it, so that
    /// insertion order is a topological order.
    pub fn random_circuit(
        nb_inputs: usize,
        nb_gates: usize,
        nb_outputs: usize,
        feedback: bool,
        seed: u64,
    ) -> Result<Circuit> {
        assert!(nb_inputs > 0 || (feedback && nb_gates > 0));
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut ret = sized(nb_inputs + nb_gates + nb_outputs, 3 * nb_gates + nb_outputs);
        let mut sources: Vec<GateId> = Vec::new();
        for i in 0..nb_inputs {
            sources.push(place(&mut ret, GateKind::Input, 0.0, 100.0 * i as f64)?);
        }
        let mut gates: Vec<GateId> = Vec::new();
        for i in 0..nb_gates {
            let kind = KINDS[rng.gen_range(0..KINDS.len())];
            gates.push(place(&mut ret, kind, 100.0 * (i + 1) as f64, 0.0)?);
        }
        let x_out = 100.0 * (nb_gates + 1) as f64;
        for (i, g) in gates.iter().enumerate() {
            let kind = ret.gate(*g).map_or(GateKind::Not, |g| g.kind());
            for pin in 0..kind.input_count() {
                let nb_candidates = if feedback {
                    nb_inputs + nb_gates
                } else {
                    nb_inputs + i
                };
                let j = rng.gen_range(0..nb_candidates);
                let src = if j < nb_inputs {
                    sources[j]
                } else {
                    gates[j - nb_inputs]
                };
                let from_pin = rng.gen_range(0..output_count(&ret, src));
                link(&mut ret, src, from_pin, *g, pin)?;
            }
        }
        for i in 0..nb_outputs {
            let o = place(&mut ret, GateKind::Output, x_out, 100.0 * i as f64)?;
            let j = rng.gen_range(0..nb_inputs + nb_gates);
            let src = if j < nb_inputs {
                sources[j]
            } else {
                gates[j - nb_inputs]
            };
            let from_pin = rng.gen_range(0..output_count(&ret, src));
            link(&mut ret, src, from_pin, o, 0)?;
        }
        ret.check();
        Ok(ret)
    }

    fn output_count(c: &Circuit, id: GateId) -> usize {
        c.gate(id).map_or(1, |g| g.output_count())
    }
}
