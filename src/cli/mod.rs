//! cli
//!
//! Command-line interface layer for unroll.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and open the layer repositories
//! - Delegate to the engine and render its outcome
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! [`crate::engine`] for execution. No history rewriting happens here.

pub mod args;
pub mod commands;

pub use args::{Cli, Command};

use std::path::PathBuf;

use anyhow::Result;

use crate::ui::output::Verbosity;

/// Global flags every command sees.
#[derive(Debug, Clone)]
pub struct Context {
    /// Workspace directory override
    pub cwd: Option<PathBuf>,
    /// Config file override
    pub config: Option<PathBuf>,
    pub verbosity: Verbosity,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            cwd: cli.cwd.clone(),
            config: cli.config.clone(),
            verbosity: Verbosity::from_flags(cli.quiet, cli.debug),
        }
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs` once logging is set up.
pub fn run(cli: Cli) -> Result<()> {
    let ctx = Context::from_cli(&cli);
    commands::dispatch(cli.command, &ctx)
}
