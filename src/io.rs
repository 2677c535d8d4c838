//! Read and write circuits and input patterns to files

mod json;
mod patterns;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub use json::{from_json, read_json, to_json, write_json};
pub use patterns::{read_patterns, write_patterns};

use crate::circuit::Circuit;
use crate::config::SimConfig;
use crate::error::Result;

/// Read a circuit from a JSON file, with the given limits
pub fn read_circuit_file(path: &Path, config: SimConfig) -> Result<Circuit> {
    let f = File::open(path)?;
    let saved = read_json(f)?;
    Circuit::from_saved(&saved, config)
}

/// Write a circuit to a JSON file
pub fn write_circuit_file(path: &Path, circuit: &Circuit) -> Result<()> {
    let f = File::create(path)?;
    write_json(&mut BufWriter::new(f), &circuit.serialize())
}

/// Read input patterns from a file
pub fn read_pattern_file(path: &Path) -> Result<Vec<Vec<bool>>> {
    let f = File::open(path)?;
    read_patterns(f)
}

/// Read simulation limits from a JSON file
pub fn read_config_file(path: &Path) -> Result<SimConfig> {
    let f = File::open(path)?;
    Ok(serde_json::from_reader(f)?)
}
