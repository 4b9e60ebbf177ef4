mod commands;
mod progress;
mod summary;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "czi-stitcher",
    about = "Stitch tiled CZI acquisitions into shading-corrected multi-channel OME-TIFFs"
)]
#[command(version, args_conflicts_with_subcommands = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: commands::run::RunArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Print or save the default pipeline config
    Config(commands::config::ConfigArgs),
    /// Check that the external tools can be found and started
    CheckTools(commands::check::CheckArgs),
    /// Show series, planes and metadata of an image file
    Info(commands::info::InfoArgs),
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Some(Commands::Config(args)) => commands::config::run(args).map(|_| ExitCode::SUCCESS),
        Some(Commands::CheckTools(args)) => commands::check::run(args),
        Some(Commands::Info(args)) => commands::info::run(args).map(|_| ExitCode::SUCCESS),
        None => commands::run::run(&cli.run),
    }
}
