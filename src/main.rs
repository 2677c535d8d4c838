use clap::Parser;
use gatesim::cmd::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_level())
        .with_writer(std::io::stderr)
        .init();

    let config = cli.sim_config()?;
    match &cli.command {
        Commands::Show(a) => a.run(&config)?,
        Commands::Simulate(a) => a.run(&config)?,
        Commands::Timing(a) => a.run(&config)?,
        Commands::Table(a) => a.run(&config)?,
        Commands::Generate(a) => a.run()?,
    }
    Ok(())
}
