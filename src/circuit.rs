//! Representation of circuits: signals, gates, wires and their container

mod circuit;
pub mod delay;
pub mod gates;
pub mod generators;
pub mod signal;
pub mod stats;
mod wire;

pub use circuit::{
    Admission, Circuit, LimitKind, LimitReached, SavedCircuit, SavedGate, SavedWire,
};
pub use delay::GateKind;
pub use gates::{Behavior, ClockState, Gate, GateId, Transition};
pub use signal::Signal;
pub use wire::{Wire, WireId};
