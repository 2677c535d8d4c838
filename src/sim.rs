//! Simulation of a circuit by fixed-point iteration
//!
//! Gates are evaluated in insertion order, each pass reading the latest values of the
//! gates evaluated before it. Feedback loops need no special handling: the passes stop
//! when nothing changes, when a global state repeats, or when the budget runs out.

mod propagation;

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::circuit::{GateId, Signal};

/// Outcome of a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationStatus {
    /// A global state repeated while outputs were still changing
    Oscillating,
    /// Some nodes carry an undefined value
    Undefined,
    /// No output changed during the last pass
    Converged,
    /// The pass or time budget ran out
    NotConverged,
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let note = match self {
            SimulationStatus::Oscillating => {
                "Circuit is oscillating (ring oscillator behavior - feedback path with odd inversions)"
            }
            SimulationStatus::Undefined => {
                "Metastable state detected (bistable element in forbidden/undefined state)"
            }
            SimulationStatus::Converged => "Circuit reached stable state",
            SimulationStatus::NotConverged => "Circuit did not converge (too deep or unstable)",
        };
        write!(f, "{note}")
    }
}

/// Diagnostic summary of the last simulation
///
/// This is a read-only report: it has no influence on the next simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    /// Number of passes run
    pub passes: usize,
    /// Pass ceiling in effect
    pub max_passes: usize,
    /// The last pass changed nothing and no state repeated
    pub converged: bool,
    /// A global state repeated while outputs were still changing
    pub oscillating: bool,
    /// Gates carrying or marked with an undefined value
    pub undefined_nodes: Vec<GateId>,
    /// Wall-clock time spent
    pub elapsed: Duration,
    /// Number of gates at simulation time
    pub gate_count: usize,
    /// Number of wires at simulation time
    pub wire_count: usize,
}

impl Default for SimulationReport {
    fn default() -> Self {
        SimulationReport {
            passes: 0,
            max_passes: 0,
            converged: true,
            oscillating: false,
            undefined_nodes: Vec::new(),
            elapsed: Duration::ZERO,
            gate_count: 0,
            wire_count: 0,
        }
    }
}

impl SimulationReport {
    /// Whether any node carries an undefined value
    pub fn has_undefined(&self) -> bool {
        !self.undefined_nodes.is_empty()
    }

    /// Classification, by decreasing priority: oscillating, undefined, converged, not converged
    pub fn status(&self) -> SimulationStatus {
        if self.oscillating {
            SimulationStatus::Oscillating
        } else if self.has_undefined() {
            SimulationStatus::Undefined
        } else if self.converged {
            SimulationStatus::Converged
        } else {
            SimulationStatus::NotConverged
        }
    }

    /// Human-readable explanation of the outcome
    pub fn note(&self) -> String {
        self.status().to_string()
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Simulation:")?;
        writeln!(f, "  Passes: {}/{}", self.passes, self.max_passes)?;
        writeln!(f, "  Converged: {}", self.converged)?;
        writeln!(f, "  Oscillating: {}", self.oscillating)?;
        if self.has_undefined() {
            let nodes: Vec<String> = self.undefined_nodes.iter().map(|g| g.to_string()).collect();
            writeln!(f, "  Undefined: {}", nodes.join(" "))?;
        }
        writeln!(
            f,
            "  Size: {} gates, {} wires",
            self.gate_count, self.wire_count
        )?;
        writeln!(f, "  Time: {:?}", self.elapsed)?;
        writeln!(f, "  {}", self.status())
    }
}

/// Resolve the values of several drivers sharing a line
///
/// Floating drivers are ignored. Agreeing drivers give their common value, disagreeing
/// drivers give Undefined, and a line with only floating drivers stays floating.
pub fn resolve_signals(signals: &[Signal]) -> Signal {
    let mut ret = Signal::HighZ;
    for s in signals {
        if s.is_high_impedance() {
            continue;
        }
        if ret.is_high_impedance() {
            ret = *s;
        } else if ret != *s {
            return Signal::Undefined;
        }
    }
    ret
}
