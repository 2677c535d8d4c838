//! Four-valued digital logic simulation
//!
//! This crate simulates circuits made of abstract logic gates connected by wires, detects
//! unstable or undefined behavior, and reports timing characteristics.
//!
//! # Usage
//!
//! Gatesim features a [fixed-point](https://en.wikipedia.org/wiki/Gauss%E2%80%93Seidel_method)
//! propagation loop with oscillation detection, tri-state
//! [bus contention](https://en.wikipedia.org/wiki/Bus_contention) resolution,
//! metastability modeling for latches and flip-flops, and
//! [static timing analysis](https://en.wikipedia.org/wiki/Static_timing_analysis)
//! with a simple static hazard heuristic.
//!
//! ```bash
//! # Show available commands
//! gatesim help
//! # Generate a 4-bit adder
//! gatesim generate adder -n 4 -o adder.json
//! # Print its truth table
//! gatesim table adder.json
//! # Find its critical path
//! gatesim timing adder.json
//! ```
//!
//! # Development
//!
//! ## Signals
//!
//! A [`Signal`] has four values: Low and High are the stable values, Undefined models races,
//! contention and forbidden latch states, and HighZ models a floating line. Undefined values
//! are first class: they are expected output, not errors.
//!
//! ## Datastructures
//!
//! A [`Circuit`] owns its gates and wires in insertion-ordered arenas, addressed by stable
//! handles. Each gate has a fixed number of input and output pins determined by its kind.
//! Wires tap an output pin and feed an input pin; several wires may drive the same input pin,
//! forming a bus.
//!
//! Simulation needs no topological order: passes over the gates in insertion order are
//! repeated until nothing changes, so feedback loops and sequential elements work as is.
//! Capacity limits bound the cost of a simulation.
//!
//! For example, here is an And gate between two inputs and an output:
//! ```
//! # use gatesim::{Circuit, GateKind, Signal};
//! let mut c = Circuit::new();
//! let a = c.add_gate(GateKind::Input, 0.0, 0.0).accepted().unwrap();
//! let b = c.add_gate(GateKind::Input, 0.0, 100.0).accepted().unwrap();
//! let and = c.add_gate(GateKind::And, 100.0, 50.0).accepted().unwrap();
//! let out = c.add_gate(GateKind::Output, 200.0, 50.0).accepted().unwrap();
//! c.connect(a, 0, and, 0).unwrap().into_result().unwrap();
//! c.connect(b, 0, and, 1).unwrap().into_result().unwrap();
//! c.connect(and, 0, out, 0).unwrap().into_result().unwrap();
//!
//! c.set_inputs(&[true, true]);
//! assert_eq!(c.simulate(), vec![Signal::High]);
//! c.set_inputs(&[false, true]);
//! assert_eq!(c.simulate(), vec![Signal::Low]);
//! assert!(c.last_report().converged);
//! ```

#![warn(missing_docs)]

pub mod circuit;
pub mod cmd;
pub mod config;
pub mod error;
pub mod io;
pub mod sim;
pub mod table;
pub mod timing;

pub use circuit::{generators, stats, Admission, Circuit, Gate, GateId, GateKind, Signal, Wire, WireId};
pub use config::SimConfig;
pub use error::{CircuitError, Result};
pub use sim::SimulationReport;
pub use timing::TimingReport;
