//! engine::pipeline
//!
//! One unroll run, end to end.
//!
//! ```text
//! preflight -> resolve range -> build tree -> flatten -> lock
//!           -> core pass -> frontend pass -> verify -> outcome
//! ```
//!
//! # Invariants
//!
//! - Every fatal check runs before the first branch is touched
//! - The core pass finishes before the frontend pass starts
//! - Both repositories stay locked from the first mutation to the end
//! - Success is only reported once both branches pass verification

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

use super::diagnostics::{Diagnostic, Diagnostics};
use super::error::UnrollError;
use super::flatten::{flatten, LinearEntry};
use super::materialize::{materialize_core, materialize_frontend, BranchPlan, PatchMapping, Remap};
use super::range::Resolver;
use super::tree::{Layers, TreeBuilder, TreeOptions, UpliftTree};
use super::verify::{expected_core, expected_frontend, verify_branch};
use crate::core::layers::PinSpec;
use crate::core::lock::RepoLock;
use crate::core::types::BranchName;
use crate::git::Vcs;

/// Everything an unroll run needs besides the repositories.
#[derive(Debug, Clone)]
pub struct UnrollRequest {
    /// Exclusive start of the frontend range; a trailing `^` makes it inclusive
    pub start: String,
    /// Inclusive end of the frontend range
    pub end: String,
    pub fe_only: bool,
    pub include_previous_pin: bool,
    /// Remote fetched from when a revision is missing locally
    pub remote: String,
    pub frontend_pin: PinSpec,
    pub core_pin: PinSpec,
    pub frontend_branch: BranchPlan,
    pub core_branch: BranchPlan,
    pub patches: PatchMapping,
    /// Stop after flattening; nothing is written
    pub dry_run: bool,
}

/// Result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct UnrollOutcome {
    pub history: Vec<LinearEntry>,
    pub remap: Remap,
    /// `None` for a dry run
    pub core_branch: Option<BranchName>,
    /// `None` for a dry run
    pub frontend_branch: Option<BranchName>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run the whole pipeline against `layers`.
///
/// # Errors
///
/// Any [`UnrollError`]. Errors raised before materialization leave every
/// repository untouched.
pub fn unroll(layers: Layers<'_>, request: &UnrollRequest) -> Result<UnrollOutcome, UnrollError> {
    let mut diags = Diagnostics::new();

    if !request.dry_run {
        preflight(layers.core, &request.core_branch)?;
        preflight(layers.frontend, &request.frontend_branch)?;
    }

    let fe_commits = Resolver::new(layers.frontend, &request.remote).range(
        &request.start,
        &request.end,
        &mut diags,
    )?;
    info!(
        repo = layers.frontend.name(),
        commits = fe_commits.len(),
        start = %request.start,
        end = %request.end,
        "resolved frontend range"
    );

    let builder = TreeBuilder::new(
        layers,
        TreeOptions {
            frontend_pin: &request.frontend_pin,
            core_pin: &request.core_pin,
            remote: &request.remote,
            fe_only: request.fe_only,
            include_previous_pin: request.include_previous_pin,
        },
    );
    let mappings = builder.build(&fe_commits, &mut diags)?;
    let tree = UpliftTree::assemble(fe_commits, &mappings);
    let history = flatten(&tree, request.fe_only);
    info!(
        entries = history.len(),
        core = tree.core_count(),
        base = tree.base_count(),
        "flattened history"
    );

    if request.dry_run {
        return Ok(UnrollOutcome {
            history,
            remap: Remap::default(),
            core_branch: None,
            frontend_branch: None,
            diagnostics: diags.into_vec(),
        });
    }

    let _locks = lock_all(&[layers.core, layers.frontend])?;

    let (remap, core_branch) = materialize_core(
        &history,
        layers.core,
        &request.core_pin.artifact,
        &request.core_branch,
        &mut diags,
    )?;
    let frontend_branch = materialize_frontend(
        &history,
        layers.frontend,
        &request.frontend_pin.artifact,
        &remap,
        &request.frontend_branch,
        &request.patches,
        &mut diags,
    )?;

    verify_branch(layers.core, &core_branch, &expected_core(&history))?;
    verify_branch(layers.frontend, &frontend_branch, &expected_frontend(&history))?;
    debug!("both branches verified");

    Ok(UnrollOutcome {
        history,
        remap,
        core_branch: Some(core_branch.name),
        frontend_branch: Some(frontend_branch.name),
        diagnostics: diags.into_vec(),
    })
}

/// Checks that must pass before a repository is rewritten.
fn preflight(vcs: &dyn Vcs, plan: &BranchPlan) -> Result<(), UnrollError> {
    let state = vcs.state();
    if state.is_in_progress() {
        return Err(UnrollError::OperationInProgress {
            repo: vcs.name().to_string(),
            operation: state,
        });
    }
    if !vcs
        .is_worktree_clean()
        .map_err(|e| UnrollError::git(vcs.name(), e))?
    {
        return Err(UnrollError::DirtyWorktree {
            repo: vcs.name().to_string(),
        });
    }
    vcs.resolve_ref(plan.base.as_str())
        .map_err(|_| UnrollError::RefNotFound {
            repo: vcs.name().to_string(),
            reference: plan.base.to_string(),
        })?;
    Ok(())
}

fn lock_all(repos: &[&dyn Vcs]) -> Result<Vec<RepoLock>, UnrollError> {
    let mut dirs: Vec<PathBuf> = repos.iter().filter_map(|r| r.git_dir()).collect();
    dirs.sort();
    dirs.dedup();
    dirs.iter()
        .map(|dir| RepoLock::acquire(dir).map_err(UnrollError::from))
        .collect()
}
