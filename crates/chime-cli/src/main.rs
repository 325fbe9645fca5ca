//! Chime CLI - simulate patches and beat tracks against the offline host.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chime")]
#[command(author, version, about = "Chime audio scheduling CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule passes of a beat track and print what plays when
    Simulate(commands::simulate::SimulateArgs),

    /// Play a patch once and sample its automation
    Patch(commands::patch::PatchArgs),

    /// Check a patch or beat track file without building it
    Validate(commands::validate::ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate(args) => commands::simulate::run(args),
        Commands::Patch(args) => commands::patch::run(args),
        Commands::Validate(args) => commands::validate::run(args),
    }
}
