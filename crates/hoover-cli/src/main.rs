//! hoover: retire stale artifacts from a Harbor registry project.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "hoover", version)]
#[command(about = "Clean up stale container images in a Harbor registry", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "HOOVER_CONFIG", default_value = "hoover.kdl")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a cleanup
    Run(RunArgs),
    /// Validate the configuration file and exit
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            commands::run::run(&cli.config, args).await?;
        }
        Commands::Validate => {
            commands::validate(&cli.config)?;
        }
    }

    Ok(())
}
