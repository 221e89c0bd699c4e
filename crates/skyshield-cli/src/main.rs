mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skyshield", about = "Satellite streak detection and sky contamination estimation")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a folder of frames: masks, quality records, night summary, ODC report
    Run(commands::run::RunArgs),
    /// Detect streaks in a single frame and print its quality record
    Detect(commands::detect::DetectArgs),
    /// Compare a predicted mask with ground truth
    Validate(commands::validate::ValidateArgs),
    /// Print or save a default pipeline config (TOML)
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Detect(args) => commands::detect::run(args),
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
