//! Command-line interface (spec.md §6, SPEC_FULL §4.L): argument parsing
//! and dispatch. The actual subcommand bodies live in [`commands`] so this
//! module stays a thin clap surface.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[clap(name = "scram")]
#[clap(author = "SCRAM Contributors")]
#[clap(version = "0.12.0")]
#[clap(about = "Probabilistic risk analysis: fault trees, CCF, importance, and SIL evaluation", long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose logging (equivalent to RUST_LOG=scram=debug).
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Analysis settings file (TOML). Defaults baked into `AnalysisSettings`.
    #[clap(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse and validate one or more MEF input files without analyzing.
    Validate {
        #[clap(value_parser, required = true)]
        input: Vec<PathBuf>,
    },

    /// Validate, then run probability/importance/uncertainty/SIL analysis.
    Analyze {
        #[clap(value_parser, required = true)]
        input: Vec<PathBuf>,

        /// Write the XML analysis report here instead of stdout.
        #[clap(long)]
        report: Option<PathBuf>,

        /// Override the configured mission time, in hours.
        #[clap(long)]
        mission_time: Option<f64>,

        /// Override the configured number of Monte-Carlo trials.
        #[clap(long)]
        trials: Option<usize>,

        /// Compute PFDavg/PFH and the IEC 61508 SIL band per fault tree.
        #[clap(long)]
        sil: bool,
    },

    /// Print the importance factors of one basic event against its tree's top gate.
    Explain {
        #[clap(value_parser)]
        input: PathBuf,

        #[clap(value_parser)]
        event_id: String,
    },
}

pub use commands::{CliError, CliRunner};
