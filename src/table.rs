//! Truth tables and checks against expected behavior
//!
//! Input values are applied in terminal order, top to bottom then left to right, so that
//! a table row maps predictably to the drawing of the circuit.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::circuit::{Circuit, Signal};
use crate::error::{CircuitError, Result};

/// Largest number of inputs accepted for exhaustive enumeration
pub const MAX_TABLE_INPUTS: usize = 20;

/// Every combination of `n` boolean inputs, most significant input first
pub fn input_combinations(n: usize) -> Result<Vec<Vec<bool>>> {
    if n > MAX_TABLE_INPUTS {
        return Err(CircuitError::TooManyInputs {
            count: n,
            max: MAX_TABLE_INPUTS,
        });
    }
    Ok((0..1u32 << n)
        .map(|i| (0..n).map(|j| (i >> (n - 1 - j)) & 1 != 0).collect())
        .collect())
}

/// One row of a truth table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    /// Values of the input terminals
    pub inputs: Vec<bool>,
    /// Values of the output terminals
    pub outputs: Vec<Signal>,
}

impl fmt::Display for TableRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inputs = self
            .inputs
            .iter()
            .map(|b| if *b { '1' } else { '0' })
            .join(" ");
        let outputs = self.outputs.iter().join(" ");
        write!(f, "{inputs} | {outputs}")
    }
}

/// Apply one input vector and simulate; return the row obtained
pub fn evaluate_row(c: &mut Circuit, inputs: &[bool]) -> TableRow {
    c.set_inputs(inputs);
    let outputs = c.simulate();
    TableRow {
        inputs: inputs.to_vec(),
        outputs,
    }
}

/// Compute the full truth table of the circuit
///
/// Clocks count as inputs. The state of sequential elements carries over from one row
/// to the next.
pub fn truth_table(c: &mut Circuit) -> Result<Vec<TableRow>> {
    Ok(input_combinations(c.nb_inputs())?
        .iter()
        .map(|inputs| evaluate_row(c, inputs))
        .collect())
}

/// Outcome of the check of a single row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowCheck {
    /// Expected row
    pub expected: TableRow,
    /// Outputs obtained
    pub actual: Vec<Signal>,
    /// Whether every output is stable and matches
    pub passed: bool,
}

/// Outcome of the check of a circuit against expected rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCheck {
    /// Per-row outcome, in order
    pub rows: Vec<RowCheck>,
}

impl TableCheck {
    /// Number of rows that passed
    pub fn nb_passed(&self) -> usize {
        self.rows.iter().filter(|r| r.passed).count()
    }

    /// Whether every row passed
    pub fn is_valid(&self) -> bool {
        self.rows.iter().all(|r| r.passed)
    }

    /// Percentage of rows that passed, rounded down
    pub fn score(&self) -> usize {
        if self.rows.is_empty() {
            return 0;
        }
        100 * self.nb_passed() / self.rows.len()
    }

    /// Rows that failed
    pub fn failures(&self) -> impl Iterator<Item = &RowCheck> {
        self.rows.iter().filter(|r| !r.passed)
    }
}

impl fmt::Display for TableCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}/{} rows passed ({}%)",
            self.nb_passed(),
            self.rows.len(),
            self.score()
        )?;
        for r in self.failures() {
            writeln!(
                f,
                "  expected {}, got {}",
                r.expected,
                r.actual.iter().join(" ")
            )?;
        }
        Ok(())
    }
}

/// Only stable values can match; an undefined or floating output always fails
fn outputs_match(expected: &[Signal], actual: &[Signal]) -> bool {
    expected.len() == actual.len()
        && expected
            .iter()
            .zip(actual)
            .all(|(e, a)| a.is_stable() && e == a)
}

fn check_row(c: &mut Circuit, expected: &TableRow) -> RowCheck {
    let actual = evaluate_row(c, &expected.inputs).outputs;
    RowCheck {
        passed: outputs_match(&expected.outputs, &actual),
        expected: expected.clone(),
        actual,
    }
}

/// Check the circuit against expected rows, applied in order
///
/// Meant for combinational circuits: rows are applied as given, without reset.
pub fn check_table(c: &mut Circuit, expected: &[TableRow]) -> TableCheck {
    TableCheck {
        rows: expected.iter().map(|r| check_row(c, r)).collect(),
    }
}

/// Check the circuit against a sequence of steps, starting from a reset state
///
/// Meant for sequential circuits, where each step depends on the previous ones.
pub fn check_sequence(c: &mut Circuit, steps: &[TableRow]) -> TableCheck {
    c.reset();
    check_table(c, steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::signal::Signal::{High as H, Low as L};
    use crate::circuit::GateKind;

    fn row(inputs: &[bool], outputs: &[Signal]) -> TableRow {
        TableRow {
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
        }
    }

    fn xor_circuit() -> Circuit {
        let mut c = Circuit::new();
        let a = c.add_gate(GateKind::Input, 0.0, 0.0).accepted().unwrap();
        let b = c.add_gate(GateKind::Input, 0.0, 100.0).accepted().unwrap();
        let x = c.add_gate(GateKind::Xor, 100.0, 50.0).accepted().unwrap();
        let o = c.add_gate(GateKind::Output, 200.0, 50.0).accepted().unwrap();
        c.connect(a, 0, x, 0).unwrap().accepted().unwrap();
        c.connect(b, 0, x, 1).unwrap().accepted().unwrap();
        c.connect(x, 0, o, 0).unwrap().accepted().unwrap();
        c
    }

    #[test]
    fn test_combinations() {
        assert_eq!(input_combinations(0).unwrap(), vec![Vec::<bool>::new()]);
        assert_eq!(
            input_combinations(2).unwrap(),
            vec![
                vec![false, false],
                vec![false, true],
                vec![true, false],
                vec![true, true]
            ]
        );
        assert_eq!(input_combinations(5).unwrap().len(), 32);
        assert!(matches!(
            input_combinations(MAX_TABLE_INPUTS + 1),
            Err(CircuitError::TooManyInputs { count: 21, max: 20 })
        ));
    }

    #[test]
    fn test_too_many_inputs() {
        let mut c = Circuit::new();
        for i in 0..32 {
            c.add_gate(GateKind::Input, 0.0, i as f64).accepted().unwrap();
        }
        assert!(matches!(
            truth_table(&mut c),
            Err(CircuitError::TooManyInputs { count: 32, .. })
        ));
    }

    #[test]
    fn test_truth_table() {
        let mut c = xor_circuit();
        let table = truth_table(&mut c).unwrap();
        let outputs: Vec<Signal> = table.iter().map(|r| r.outputs[0]).collect();
        assert_eq!(outputs, vec![L, H, H, L]);
        assert_eq!(format!("{}", table[1]), "0 1 | 1");
    }

    #[test]
    fn test_check_table() {
        let mut c = xor_circuit();
        let expected = vec![
            row(&[false, false], &[L]),
            row(&[false, true], &[H]),
            row(&[true, false], &[H]),
            // Or instead of Xor
            row(&[true, true], &[H]),
        ];
        let check = check_table(&mut c, &expected);
        assert!(!check.is_valid());
        assert_eq!(check.nb_passed(), 3);
        assert_eq!(check.score(), 75);
        assert_eq!(check.failures().count(), 1);
        assert!(format!("{check}").contains("3/4 rows passed (75%)"));
    }

    #[test]
    fn test_check_sequence() {
        let mut c = Circuit::new();
        let t = c.add_gate(GateKind::Input, 0.0, 0.0).accepted().unwrap();
        let clk = c.add_gate(GateKind::Input, 0.0, 100.0).accepted().unwrap();
        let ff = c.add_gate(GateKind::TFlipFlop, 100.0, 0.0).accepted().unwrap();
        let o = c.add_gate(GateKind::Output, 200.0, 0.0).accepted().unwrap();
        c.connect(t, 0, ff, 0).unwrap().accepted().unwrap();
        c.connect(clk, 0, ff, 1).unwrap().accepted().unwrap();
        c.connect(ff, 0, o, 0).unwrap().accepted().unwrap();

        let steps = vec![
            row(&[true, false], &[L]),
            row(&[true, true], &[H]),
            row(&[true, false], &[H]),
            row(&[false, true], &[H]),
            row(&[true, false], &[H]),
        ];
        assert!(check_sequence(&mut c, &steps).is_valid());
        // Without reset, the flip-flop starts from the previous state
        assert!(!check_table(&mut c, &steps).is_valid());
        assert_eq!(check_sequence(&mut c, &steps).score(), 100);
    }
}
