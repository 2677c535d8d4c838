//! Error types for circuit construction and persistence
//!
//! Only programming errors and I/O failures are reported here. Capacity limits are
//! reported through [`Admission`](crate::circuit::Admission), and simulation problems
//! (non-convergence, oscillation, undefined signals) through
//! [`SimulationReport`](crate::sim::SimulationReport).

use thiserror::Error;

use crate::circuit::{GateId, LimitReached};

/// Result type for circuit operations
pub type Result<T> = std::result::Result<T, CircuitError>;

/// Errors that can occur while building, loading or saving a circuit
#[derive(Debug, Error)]
pub enum CircuitError {
    /// The gate factory does not know this kind
    #[error("Unknown gate type: {0}")]
    UnknownGateKind(String),

    /// No gate with this id exists in the circuit
    #[error("Invalid gate ID: {0}")]
    UnknownGate(GateId),

    /// Pin index out of range for the gate
    #[error("Invalid pin {pin} on {gate}: the gate has {count} such pins")]
    InvalidPin {
        /// Gate being connected
        gate: GateId,
        /// Requested pin
        pin: usize,
        /// Number of pins available
        count: usize,
    },

    /// A saved circuit does not fit within the configured limits
    #[error("{0}")]
    LimitReached(LimitReached),

    /// I/O error while reading or writing a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON
    #[error("Failed to parse circuit: {0}")]
    Json(#[from] serde_json::Error),

    /// Too many inputs to enumerate every combination
    #[error("Too many inputs for a truth table: {count}, at most {max} supported")]
    TooManyInputs {
        /// Number of inputs of the circuit
        count: usize,
        /// Largest supported number of inputs
        max: usize,
    },

    /// Malformed pattern file
    #[error("Parse error at line {line}: {message}")]
    Pattern {
        /// Line number, starting at 1
        line: usize,
        /// What went wrong
        message: String,
    },
}
