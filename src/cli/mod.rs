//! CLI Module
//!
//! Command-line interface for the declicker.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Declick - click and pop repair for WAV files
#[derive(Parser, Debug)]
#[command(name = "declick")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect clicks and report them without writing audio
    #[command(name = "scan")]
    Scan {
        /// Input WAV file
        input: PathBuf,

        /// Write a JSON report of the detected clicks
        #[arg(short, long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Detect and repair clicks, writing the repaired audio
    #[command(name = "repair")]
    Repair {
        /// Input WAV file
        input: PathBuf,

        /// Output WAV file
        output: PathBuf,

        /// Write a JSON report of the repaired clicks
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Output bit depth: 16, 24 or 32 (float)
        #[arg(short, long, default_value_t = 24)]
        bit_depth: u16,

        #[command(flatten)]
        settings: SettingsArgs,
    },
}

/// Processing settings overrides
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// JSON settings file; flags below override its values
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Detection ratio threshold (lower finds more clicks)
    #[arg(short, long)]
    pub threshold: Option<f32>,

    /// Longest run to repair, in samples
    #[arg(short = 'm', long)]
    pub max_length: Option<usize>,

    /// Predictor history in samples (multiple of 16)
    #[arg(long)]
    pub history: Option<usize>,

    /// Predictor order
    #[arg(long)]
    pub order: Option<usize>,

    /// Worker threads (defaults to one per core)
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,
}
