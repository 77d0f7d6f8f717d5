//! engine::verify
//!
//! Post-materialization check of the written branches.
//!
//! # Invariants Checked
//!
//! - The branch tip is the last commit the pass wrote
//! - The branch holds exactly one commit per expected entry on top of its base
//! - Every commit carries a provenance header naming the expected originals
//!
//! A run only reports success after both branches pass.

use super::error::UnrollError;
use super::flatten::LinearEntry;
use super::materialize::MaterializedBranch;
use super::provenance::Provenance;
use crate::git::Vcs;

/// Headers the core branch should carry, in order.
pub fn expected_core(entries: &[LinearEntry]) -> Vec<Provenance> {
    entries
        .iter()
        .filter(|e| e.core.is_some())
        .map(|e| Provenance::new(None, e.core.as_ref(), e.base.as_ref()))
        .collect()
}

/// Headers the frontend branch should carry, in order.
pub fn expected_frontend(entries: &[LinearEntry]) -> Vec<Provenance> {
    entries
        .iter()
        .filter(|e| e.frontend.is_some() || e.core.is_some() || e.base.is_some())
        .map(|e| Provenance::new(e.frontend.as_ref(), e.core.as_ref(), e.base.as_ref()))
        .collect()
}

/// Check that `branch` in `vcs` carries exactly `expected`.
pub fn verify_branch(
    vcs: &dyn Vcs,
    branch: &MaterializedBranch,
    expected: &[Provenance],
) -> Result<(), UnrollError> {
    let fail = |message: String| UnrollError::VerificationFailed {
        repo: vcs.name().to_string(),
        branch: branch.name.to_string(),
        message,
    };

    let tip = vcs
        .resolve_ref(branch.name.as_str())
        .map_err(|e| UnrollError::git(vcs.name(), e))?;
    let expected_tip = branch.commits.last().unwrap_or(&branch.base_tip);
    if &tip != expected_tip {
        return Err(fail(format!(
            "tip is {}, expected {}",
            tip.short(8),
            expected_tip.short(8)
        )));
    }

    let commits = vcs
        .commit_range(Some(&branch.base_tip), &tip)
        .map_err(|e| UnrollError::git(vcs.name(), e))?;
    if commits.len() != expected.len() {
        return Err(fail(format!(
            "{} commits on top of base, expected {}",
            commits.len(),
            expected.len()
        )));
    }

    for (index, (commit, want)) in commits.iter().zip(expected).enumerate() {
        match Provenance::parse(&commit.message) {
            Some(found) if &found == want => {}
            Some(found) => {
                return Err(fail(format!(
                    "commit {} ({}) is '{}', expected '{}'",
                    index + 1,
                    commit.oid.short(8),
                    found.header(),
                    want.header()
                )))
            }
            None => {
                return Err(fail(format!(
                    "commit {} ({}) has no provenance header",
                    index + 1,
                    commit.oid.short(8)
                )))
            }
        }
    }

    Ok(())
}
