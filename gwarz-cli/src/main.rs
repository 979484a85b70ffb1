//! G-WARZ CLI - Headless driver for the rules engine
//!
//! Commands:
//! - simulate: run end-of-turn cycles on a scenario and print the event log
//! - inspect: show movement and attack options for one unit

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod inspect;
mod simulate;

#[derive(Parser)]
#[command(name = "gwarz")]
#[command(about = "G-WARZ hex strategy rules engine", version)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run turn cycles on a scenario
    Simulate(simulate::SimulateArgs),
    /// Show reachable hexes, fuel range, targets and a path for one unit
    Inspect(inspect::InspectArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Simulate(args) => simulate::run(args),
        Commands::Inspect(args) => inspect::run(args),
    }
}
