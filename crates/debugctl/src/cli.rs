//! CLI - Command-line argument parsing
//!
//! Keeps argument parsing separate from execution logic.

use clap::{Parser, Subcommand};
use debug_rails::EntryType;
use std::path::PathBuf;

/// Debug Rails CLI
#[derive(Parser, Debug)]
#[command(name = "debugctl")]
#[command(about = "Debug Rails - read, summarize and correlate debug files", long_about = None)]
#[command(version = env!("DEBUGCTL_VERSION"))]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Debug root directory (overrides the configured base directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the entries of a debug file ("-" reads stdin)
    Show {
        file: PathBuf,

        /// Only entries of this type (e.g. DIVERGENCE)
        #[arg(long = "type", value_name = "TYPE")]
        entry_type: Option<EntryType>,

        /// Only divergence entries
        #[arg(long, conflicts_with = "entry_type")]
        divergences: bool,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Count entries per type and list divergences
    Summary {
        file: PathBuf,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize the newest debug file of a component
    Latest {
        component: String,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Collect entries sharing a context id across all components
    Correlate {
        context_id: String,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Write one entry of each kind and verify they read back unchanged
    Selftest {
        /// Keep the debug file written by the self-test
        #[arg(long)]
        keep: bool,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}
