use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::circuit::gates::{Gate, GateId};
use crate::circuit::signal::Signal;

/// Stable handle of a wire in a circuit
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireId(u32);

impl WireId {
    /// Create a handle from its raw index
    pub fn from_index(i: u32) -> WireId {
        WireId(i)
    }

    /// Raw index of the handle
    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wire_{}", self.0)
    }
}

impl fmt::Debug for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Connection from an output pin of one gate to an input pin of another
///
/// A wire is an equipotential tap: it has no delay and no state of its own besides
/// the last value it sampled from its source.
#[derive(Debug, Clone, PartialEq)]
pub struct Wire {
    id: WireId,
    from: GateId,
    from_pin: usize,
    to: GateId,
    to_pin: usize,
    signal: Signal,
    undefined: bool,
}

impl Wire {
    /// Create a wire between two pins
    pub fn new(id: WireId, from: GateId, from_pin: usize, to: GateId, to_pin: usize) -> Wire {
        Wire {
            id,
            from,
            from_pin,
            to,
            to_pin,
            signal: Signal::Low,
            undefined: false,
        }
    }

    /// Handle of the wire
    pub fn id(&self) -> WireId {
        self.id
    }

    /// Driving gate
    pub fn from(&self) -> GateId {
        self.from
    }

    /// Output pin of the driving gate
    pub fn from_pin(&self) -> usize {
        self.from_pin
    }

    /// Driven gate
    pub fn to(&self) -> GateId {
        self.to
    }

    /// Input pin of the driven gate
    pub fn to_pin(&self) -> usize {
        self.to_pin
    }

    /// Last sampled value
    pub fn signal(&self) -> Signal {
        self.signal
    }

    /// Whether the last sampled value was Undefined
    pub fn is_undefined(&self) -> bool {
        self.undefined
    }

    /// Sample the source pin
    ///
    /// A missing source or pin reads as a defined Low.
    pub fn propagate(&mut self, gates: &IndexMap<GateId, Gate>) -> Signal {
        let output = gates
            .get(&self.from)
            .and_then(|g| g.outputs().get(self.from_pin).copied());
        match output {
            None => {
                self.signal = Signal::Low;
                self.undefined = false;
            }
            Some(s) => {
                self.signal = s;
                self.undefined = s.is_undefined();
            }
        }
        self.signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::delay::GateKind;

    #[test]
    fn test_propagate() {
        let mut gates = IndexMap::new();
        let a = GateId::from_index(0);
        let b = GateId::from_index(1);
        gates.insert(a, Gate::new(a, GateKind::SrLatch, 0.0, 0.0));
        gates.insert(b, Gate::new(b, GateKind::Not, 0.0, 0.0));

        let mut q = Wire::new(WireId::from_index(0), a, 0, b, 0);
        let mut qn = Wire::new(WireId::from_index(1), a, 1, b, 0);
        assert_eq!(q.propagate(&gates), Signal::Low);
        assert_eq!(qn.propagate(&gates), Signal::High);
        assert!(!q.is_undefined());

        gates[&a].set_inputs(&[Signal::High, Signal::High], 0);
        assert_eq!(q.propagate(&gates), Signal::Undefined);
        assert!(q.is_undefined());
        assert_eq!(format!("{}", q.id()), "wire_0");

        // Pin out of range reads as Low
        let mut bad = Wire::new(WireId::from_index(2), a, 5, b, 0);
        assert_eq!(bad.propagate(&gates), Signal::Low);
        assert!(!bad.is_undefined());
    }
}
