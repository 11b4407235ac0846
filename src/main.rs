//! Declick CLI
//!
//! Command-line front end for click detection and repair.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use declick::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("Declick v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Scan {
            input,
            report,
            settings,
        } => {
            commands::scan(&input, report.as_deref(), &settings)
                .with_context(|| format!("scanning {}", input.display()))?;
        }
        Commands::Repair {
            input,
            output,
            report,
            bit_depth,
            settings,
        } => {
            commands::repair(&input, &output, report.as_deref(), bit_depth, &settings)
                .with_context(|| format!("repairing {} into {}", input.display(), output.display()))?;
        }
    }

    Ok(())
}
