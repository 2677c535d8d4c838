//! Capacity limits and simulation budgets

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Limits applied to a circuit
///
/// Capacity limits bound the cost of a single simulation, and are enforced when
/// gates and wires are added. Pass and time budgets bound the simulation itself.
/// All fields have defaults, so a partial JSON object is a valid configuration:
/// ```
/// # use gatesim::config::SimConfig;
/// let cfg: SimConfig = serde_json::from_str(r#"{ "max_passes": 40 }"#).unwrap();
/// assert_eq!(cfg.max_passes, 40);
/// assert_eq!(cfg.max_gates, 200);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Maximum number of gates in a circuit
    pub max_gates: usize,
    /// Maximum number of wires in a circuit
    pub max_wires: usize,
    /// Maximum number of propagation passes per simulation
    pub max_passes: usize,
    /// Wall-clock budget per simulation, in milliseconds
    pub time_budget_ms: u64,
}

impl SimConfig {
    /// Wall-clock budget per simulation
    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms)
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            max_gates: 200,
            max_wires: 500,
            max_passes: 15,
            time_budget_ms: 16,
        }
    }
}
