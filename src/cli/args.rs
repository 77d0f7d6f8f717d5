//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Workspace directory holding the layer checkouts
//! - `--config <path>`: Use this config file instead of the global one
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// unroll - flatten cross-repository uplifts into replayable branches
#[derive(Parser, Debug)]
#[command(name = "unroll")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Workspace directory holding the layer checkouts
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Config file to use instead of the global one
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Flatten a frontend range and write the rewritten branches
    #[command(
        name = "run",
        long_about = "Flatten a frontend range and write the rewritten branches.\n\n\
            Every frontend commit in START..END that uplifts the core pin is expanded \
            into the core commits it subsumes, and every subsumed core commit that \
            moves the base pin is expanded into the base commits it subsumes. The \
            result is replayed as one branch in the core repository and one in the \
            frontend repository, with each frontend commit pinned to the rewritten \
            core commit.\n\n\
            A trailing '^' on START includes START itself.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Flatten the last 20 tt-xla commits down to tt-metal
    unroll run tt-xla HEAD~20

    # Only expand into tt-mlir; keep tt-mlir commits whole
    unroll run tt-torch v0.3.0 v0.4.0 --fe-only

    # Preview the flattened history without touching any branch
    unroll run tt-xla 1a2b3c4d^ --dry-run

    # Backport a fix onto one historical tt-mlir commit
    unroll run tt-xla HEAD~20 --patch 5e6f7a8b fix-conv.patch"
    )]
    Run {
        /// Frontend to flatten (tt-torch, tt-xla, tt-forge-fe, or a configured one)
        frontend: String,

        /// Start of the frontend range, exclusive unless suffixed with '^'
        start: String,

        /// End of the frontend range, inclusive
        #[arg(default_value = "HEAD")]
        end: String,

        /// Keep core commits whole instead of expanding them into base commits
        #[arg(long)]
        fe_only: bool,

        /// Frontend branch the rewritten branch starts from
        #[arg(long, value_name = "BRANCH")]
        fe_branch: Option<String>,

        /// Core branch the rewritten branch starts from
        #[arg(long, value_name = "BRANCH")]
        core_branch: Option<String>,

        /// Name of the rewritten branches
        #[arg(long, value_name = "NAME")]
        branch: Option<String>,

        /// Apply FILE when replaying the core commit HASH (repeatable)
        #[arg(long = "patch", num_args = 2, value_names = ["HASH", "FILE"])]
        patches: Vec<String>,

        /// Also replay the commit the old pin named
        #[arg(long)]
        include_previous_pin: bool,

        /// Show the flattened history without writing branches
        #[arg(long)]
        dry_run: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which core and base revisions each frontend pins
    #[command(
        name = "pins",
        after_help = "\
EXAMPLES:
    # Every known frontend
    unroll pins

    # Only tt-xla, as JSON
    unroll pins tt-xla --json"
    )]
    Pins {
        /// Frontends to report; all known frontends when empty
        frontends: Vec<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}
