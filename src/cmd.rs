//! Command line interface

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use itertools::Itertools;
use kdam::{tqdm, BarExt};

use crate::circuit::generators::{adder, counter, random, testcases};
use crate::circuit::stats::stats;
use crate::circuit::Circuit;
use crate::config::SimConfig;
use crate::error::Result;
use crate::io::{read_circuit_file, read_config_file, read_pattern_file, write_circuit_file};
use crate::table::{check_sequence, check_table, evaluate_row, input_combinations, TableRow};

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Commands,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON file with simulation limits
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the maximum number of propagation passes
    #[arg(long, global = true)]
    pub max_passes: Option<usize>,
}

impl Cli {
    /// Simulation limits from the configuration file and flags
    pub fn sim_config(&self) -> Result<SimConfig> {
        let mut ret = match &self.config {
            Some(path) => read_config_file(path)?,
            None => SimConfig::default(),
        };
        if let Some(p) = self.max_passes {
            ret.max_passes = p;
        }
        Ok(ret)
    }

    /// Logging filter matching the verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Command line arguments
#[derive(Subcommand)]
pub enum Commands {
    /// Show statistics about a circuit
    ///
    /// Will print statistics on the number of terminals, gates and wires in the circuit.
    #[clap()]
    Show(ShowArgs),

    /// Simulate a circuit
    ///
    /// Patterns have one character per input terminal, in order top to bottom:
    ///    0101
    ///    1100
    /// Sequential state carries over from one pattern to the next.
    #[clap(alias = "sim")]
    Simulate(SimulateArgs),

    /// Static timing analysis of a circuit
    ///
    /// Reports the critical path, the maximum clock frequency and gates at risk of
    /// static hazards.
    #[clap()]
    Timing(TimingArgs),

    /// Truth table of a circuit
    ///
    /// Enumerates every input combination, or checks the circuit against expected rows.
    #[clap()]
    Table(TableArgs),

    /// Generate a circuit from a template
    #[clap(alias = "gen")]
    Generate(GenerateArgs),
}

/// Command arguments for circuit informations
#[derive(Args)]
pub struct ShowArgs {
    /// Circuit to show
    file: PathBuf,
}

impl ShowArgs {
    /// Run the command
    pub fn run(&self, config: &SimConfig) -> Result<()> {
        let circuit = read_circuit_file(&self.file, config.clone())?;
        println!("Circuit stats:\n{}", stats(&circuit));
        println!("{}", circuit);
        Ok(())
    }
}

/// Command arguments for simulation
#[derive(Args)]
pub struct SimulateArgs {
    /// Circuit to simulate
    circuit: PathBuf,

    /// Input patterns file
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Output file for output values
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

impl SimulateArgs {
    /// Run the command
    pub fn run(&self, config: &SimConfig) -> Result<()> {
        let mut circuit = read_circuit_file(&self.circuit, config.clone())?;
        let patterns = read_pattern_file(&self.input)?;
        let mut lines = Vec::new();
        for (i, pattern) in patterns.iter().enumerate() {
            let row = evaluate_row(&mut circuit, pattern);
            println!(
                "{}: {}  [{}]",
                i + 1,
                row,
                circuit.last_report().status()
            );
            lines.push(row.outputs.iter().join(""));
        }
        if let Some(path) = &self.output {
            let mut f = File::create(path)?;
            for l in lines {
                writeln!(f, "{l}")?;
            }
        }
        Ok(())
    }
}

/// Command arguments for timing analysis
#[derive(Args)]
pub struct TimingArgs {
    /// Circuit to analyze
    circuit: PathBuf,

    /// Also simulate every input combination and report gates that glitched
    #[arg(long)]
    glitches: bool,
}

impl TimingArgs {
    /// Run the command
    pub fn run(&self, config: &SimConfig) -> Result<()> {
        let mut circuit = read_circuit_file(&self.circuit, config.clone())?;
        print!("{}", circuit.analyze_timing());
        let hazards = circuit.detect_hazards();
        if hazards.is_empty() {
            println!("No static hazard found");
        }
        for h in &hazards {
            println!("{h}");
        }
        if self.glitches {
            for inputs in input_combinations(circuit.nb_inputs())? {
                evaluate_row(&mut circuit, &inputs);
            }
            let glitches = circuit.check_glitches();
            if glitches.is_empty() {
                println!("No glitch observed");
            } else {
                println!("Glitches observed on {}", glitches.iter().join(", "));
            }
        }
        Ok(())
    }
}

/// Command arguments for truth tables
#[derive(Args)]
pub struct TableArgs {
    /// Circuit to tabulate
    circuit: PathBuf,

    /// JSON file with the expected rows
    #[arg(short = 'e', long)]
    expect: Option<PathBuf>,

    /// Treat the expected rows as a sequence of steps from a reset state
    #[arg(long)]
    sequence: bool,
}

impl TableArgs {
    /// Run the command
    pub fn run(&self, config: &SimConfig) -> Result<()> {
        let mut circuit = read_circuit_file(&self.circuit, config.clone())?;
        match &self.expect {
            Some(path) => {
                let expected: Vec<TableRow> = serde_json::from_reader(File::open(path)?)?;
                let check = if self.sequence {
                    check_sequence(&mut circuit, &expected)
                } else {
                    check_table(&mut circuit, &expected)
                };
                print!("{check}");
            }
            None => {
                for row in self.tabulate(&mut circuit)? {
                    println!("{row}");
                }
            }
        }
        Ok(())
    }

    fn tabulate(&self, circuit: &mut Circuit) -> Result<Vec<TableRow>> {
        let combinations = input_combinations(circuit.nb_inputs())?;
        let mut progress = tqdm!(total = combinations.len());
        progress.set_description("Rows simulated");
        let mut ret = Vec::new();
        for inputs in &combinations {
            ret.push(evaluate_row(circuit, inputs));
            progress.update(1)?;
        }
        progress.write(format!(
            "Simulated {} rows for {} inputs and {} outputs",
            ret.len(),
            circuit.nb_inputs(),
            circuit.nb_outputs()
        ))?;
        Ok(ret)
    }
}

/// Available circuit templates
#[derive(Clone, Copy, ValueEnum)]
pub enum Template {
    /// Ripple-carry adder of the given width
    Adder,
    /// Ring of the given number of inverters
    Ring,
    /// Chain of the given number of inverters
    Chain,
    /// Set-reset latch made of Nor gates
    Latch,
    /// Synchronous counter of the given width
    Counter,
    /// Random circuit with the given number of gates
    Random,
}

/// Command arguments for circuit generation
#[derive(Args)]
pub struct GenerateArgs {
    /// Template to generate
    #[arg(value_enum)]
    template: Template,

    /// Output file for the circuit
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Size of the circuit
    #[arg(short = 'n', long, default_value_t = 4)]
    size: usize,

    /// Seed for random circuits
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Allow feedback loops in random circuits
    #[arg(long)]
    feedback: bool,
}

impl GenerateArgs {
    /// Run the command
    pub fn run(&self) -> Result<()> {
        let circuit = match self.template {
            Template::Adder => adder::ripple_carry(self.size)?,
            Template::Ring => testcases::ring_oscillator(self.size.max(1))?,
            Template::Chain => testcases::inverter_chain(self.size, false)?,
            Template::Latch => testcases::sr_latch_nor()?,
            Template::Counter => counter::synchronous(self.size)?,
            Template::Random => {
                random::random_circuit(4, self.size, 4, self.feedback, self.seed)?
            }
        };
        write_circuit_file(&self.output, &circuit)
    }
}
