//! pins command - Show which core and base revisions each frontend pins
//!
//! For every frontend the report follows the chain from the tip of its
//! configured branch: the core revision it pins, and the base revision that
//! core revision pins in turn. A frontend that builds against another
//! frontend (tt-torch on tt-xla) is followed through that frontend's pin.

use anyhow::{Context as _, Result};
use serde::Serialize;
use tracing::{debug, warn};

use super::{load_config, open_repo};
use crate::cli::Context;
use crate::core::config::Config;
use crate::core::layers::core_via;
use crate::core::types::Oid;
use crate::engine::pins::read_pin;
use crate::engine::range::Resolver;
use crate::engine::Diagnostics;
use crate::git::{Git, Vcs};
use crate::ui::output;

/// One row of the pin report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinReport {
    pub frontend: String,
    pub branch: String,
    /// Frontend the core pin is read through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
    /// Revision of `via` pinned at the branch tip
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via_revision: Option<String>,
    /// Core revision pinned at the branch tip
    pub core: Option<String>,
    /// Subject of that core commit, when it is available locally
    pub core_subject: Option<String>,
    /// Base revision pinned by that core revision
    pub base: Option<String>,
}

/// Print the pin report for `frontends` (all known frontends when empty).
pub fn pins(ctx: &Context, frontends: &[String], json: bool) -> Result<()> {
    let config = load_config(ctx)?;
    let core_settings = config.core();
    let core = open_repo(&core_settings.repo)?;

    let explicit = !frontends.is_empty();
    let names = if explicit {
        frontends.to_vec()
    } else {
        config.frontend_names()
    };

    let mut reports = Vec::new();
    for name in &names {
        match report(&config, name, &core) {
            Ok(row) => reports.push(row),
            Err(err) if !explicit => {
                debug!(frontend = %name, error = %err, "skipping frontend");
            }
            Err(err) => return Err(err),
        }
    }

    if json {
        output::json(&reports)?;
        return Ok(());
    }

    let dash = "-".to_string();
    for row in &reports {
        let frontend = match (&row.via, &row.via_revision) {
            (Some(via), revision) => format!(
                "{} ({via} {})",
                row.frontend,
                short(revision.as_ref().unwrap_or(&dash))
            ),
            (None, _) => row.frontend.clone(),
        };
        output::print(
            format!(
                "{:<14} {:<12} core {:<12} base {:<12} {}",
                frontend,
                row.branch,
                short(row.core.as_ref().unwrap_or(&dash)),
                short(row.base.as_ref().unwrap_or(&dash)),
                row.core_subject.as_deref().unwrap_or("")
            ),
            ctx.verbosity,
        );
    }
    Ok(())
}

fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

fn report(config: &Config, name: &str, core: &Git) -> Result<PinReport> {
    let settings = config.frontend(name)?;
    let frontend = open_repo(&settings.repo)?;
    let tip = frontend
        .resolve_ref(&settings.repo.branch)
        .with_context(|| format!("{name}: branch '{}' not found", settings.repo.branch))?;

    let mut row = PinReport {
        frontend: name.to_string(),
        branch: settings.repo.branch.clone(),
        via: None,
        via_revision: None,
        core: None,
        core_subject: None,
        base: None,
    };

    let remote = config.remote();
    let core_pin = match core_via(name) {
        Some((via, artifact)) => {
            let via_pin = read_pin(&frontend, &tip, &artifact)?;
            row.via = Some(via.to_string());
            row.via_revision = via_pin.clone();
            let Some(via_pin) = via_pin else {
                return Ok(row);
            };
            let via_settings = config.frontend(via)?;
            let via_repo = open_repo(&via_settings.repo)?;
            let Some(via_oid) = resolve(&via_repo, &remote, &via_pin) else {
                warn!(frontend = name, via, revision = %via_pin, "pinned revision is not available");
                return Ok(row);
            };
            read_pin(&via_repo, &via_oid, &via_settings.pin.artifact)?
        }
        None => read_pin(&frontend, &tip, &settings.pin.artifact)?,
    };
    row.core = core_pin.clone();

    let Some(core_pin) = core_pin else {
        return Ok(row);
    };

    let Some(core_oid) = resolve(core, &remote, &core_pin) else {
        warn!(frontend = name, core = %core_pin, "pinned core revision is not available");
        return Ok(row);
    };

    row.core_subject = Some(core.find_commit(&core_oid)?.summary);
    row.base = read_pin(core, &core_oid, &config.core().pin.artifact)?;
    Ok(row)
}

/// Resolve a pinned revision, fetching it when it is missing locally.
fn resolve(vcs: &dyn Vcs, remote: &str, revision: &str) -> Option<Oid> {
    let mut diags = Diagnostics::new();
    Resolver::new(vcs, remote).resolve(revision, &mut diags).ok()
}
