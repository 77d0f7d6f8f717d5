//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Loads configuration and opens the repositories it needs
//! 2. Calls the engine
//! 3. Formats and displays output
//!
//! Handlers do NOT rewrite history themselves.

mod pins;
mod run;

pub use pins::{pins, PinReport};
pub use run::{run, RunArgs};

use anyhow::{Context as _, Result};
use tracing::debug;

use super::{Command, Context};
use crate::core::config::{Config, RepoSettings};
use crate::git::Git;
use crate::ui::output;

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Run {
            frontend,
            start,
            end,
            fe_only,
            fe_branch,
            core_branch,
            branch,
            patches,
            include_previous_pin,
            dry_run,
            json,
        } => run(
            ctx,
            RunArgs {
                frontend,
                start,
                end,
                fe_only,
                fe_branch,
                core_branch,
                branch,
                patches,
                include_previous_pin,
                dry_run,
                json,
            },
        ),
        Command::Pins { frontends, json } => pins(ctx, &frontends, json),
    }
}

/// Load configuration, surfacing load warnings.
fn load_config(ctx: &Context) -> Result<Config> {
    let loaded = Config::load(ctx.config.as_deref(), ctx.cwd.as_deref())?;
    for warning in &loaded.warnings {
        output::warn(
            format!("{}: {}", warning.path.display(), warning.message),
            ctx.verbosity,
        );
    }
    debug!(
        global = ?loaded.config.global_config_loaded_from(),
        workspace = ?loaded.config.workspace_config_loaded_from(),
        "configuration loaded"
    );
    Ok(loaded.config)
}

/// Open the checkout of one layer.
fn open_repo(settings: &RepoSettings) -> Result<Git> {
    Git::open(&settings.path).with_context(|| {
        format!(
            "cannot open {} checkout at {}",
            settings.name,
            settings.path.display()
        )
    })
}
