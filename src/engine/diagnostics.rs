//! engine::diagnostics
//!
//! Problems an unroll run recovers from locally.
//!
//! Each diagnostic is logged with `tracing::warn!` where it is detected and
//! kept in a [`Diagnostics`] collector, so the caller can report them again
//! once the run is over.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::types::Oid;

/// A recovered problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// An uplift-marked commit whose diff has no parseable pin change.
    /// Treated as a plain commit.
    UnresolvableUplift { repo: String, commit: Oid },

    /// No rewritten core commit exists for this pair; the frontend pin was left as is.
    MissingRemapEntry { core: Oid, base: Option<Oid> },

    /// A patch did not apply; the step was committed unpatched.
    PatchApplyFailure {
        patch: PathBuf,
        core: Oid,
        reason: String,
    },

    /// The output branch already existed and was deleted.
    BranchCollision { repo: String, branch: String },

    /// Fetching a missing revision failed.
    FetchFailed {
        repo: String,
        reference: String,
        reason: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnresolvableUplift { repo, commit } => write!(
                f,
                "{repo}: {} is marked as an uplift but changes no pin; kept as a plain commit",
                commit.short(8)
            ),
            Diagnostic::MissingRemapEntry { core, base } => write!(
                f,
                "no rewritten commit for core {} (base {}); pin left unchanged",
                core.short(8),
                base.as_ref().map_or("None", |b| b.short(8))
            ),
            Diagnostic::PatchApplyFailure {
                patch,
                core,
                reason,
            } => write!(
                f,
                "patch {} failed at core {}: {reason}",
                patch.display(),
                core.short(8)
            ),
            Diagnostic::BranchCollision { repo, branch } => {
                write!(f, "{repo}: branch {branch} already existed and was replaced")
            }
            Diagnostic::FetchFailed {
                repo,
                reference,
                reason,
            } => write!(f, "{repo}: fetch of {reference} failed: {reason}"),
        }
    }
}

/// Collector for diagnostics raised during one run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `diagnostic` and keep it.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::warn!("{diagnostic}");
        self.items.push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
