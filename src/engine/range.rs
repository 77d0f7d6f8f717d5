//! engine::range
//!
//! Commit range resolution with fetch-on-miss.
//!
//! A range `start..end` yields the first-parent commits after `start` up to
//! and including `end`, oldest first. A trailing caret on `start`
//! (`abc123^`) makes the start commit part of the range.

use tracing::debug;

use super::diagnostics::{Diagnostic, Diagnostics};
use super::error::UnrollError;
use crate::core::types::Oid;
use crate::git::{CommitInfo, GitError, Vcs};

/// A range start as written by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevSpec<'a> {
    /// Revision without the inclusive marker
    pub rev: &'a str,
    /// Whether the start commit itself belongs to the range
    pub inclusive: bool,
}

impl<'a> RevSpec<'a> {
    /// Split an optional trailing `^` off `spec`.
    ///
    /// ```
    /// use uplift_unroll::engine::range::RevSpec;
    ///
    /// let spec = RevSpec::parse("646aee02^");
    /// assert_eq!(spec.rev, "646aee02");
    /// assert!(spec.inclusive);
    /// assert!(!RevSpec::parse("HEAD~5").inclusive);
    /// ```
    pub fn parse(spec: &'a str) -> Self {
        let spec = spec.trim();
        match spec.strip_suffix('^') {
            Some(rev) if !rev.is_empty() => RevSpec {
                rev,
                inclusive: true,
            },
            _ => RevSpec {
                rev: spec,
                inclusive: false,
            },
        }
    }
}

/// Resolves revisions in one repository, fetching from `remote` on a miss.
pub struct Resolver<'a> {
    vcs: &'a dyn Vcs,
    remote: &'a str,
}

impl<'a> Resolver<'a> {
    pub fn new(vcs: &'a dyn Vcs, remote: &'a str) -> Self {
        Self { vcs, remote }
    }

    /// Resolve `reference` to a commit.
    ///
    /// Tries the local repository first. On a miss, fetches `reference` from
    /// the remote (a failed fetch is recorded as a diagnostic) and tries once
    /// more.
    ///
    /// # Errors
    ///
    /// [`UnrollError::RefNotFound`] when the second lookup misses too.
    pub fn resolve(
        &self,
        reference: &str,
        diags: &mut Diagnostics,
    ) -> Result<Oid, UnrollError> {
        match self.vcs.resolve_ref(reference) {
            Ok(oid) => return Ok(oid),
            Err(err) if is_missing(&err) => {}
            Err(err) => return Err(UnrollError::git(self.vcs.name(), err)),
        }

        debug!(repo = self.vcs.name(), reference, "not found locally, fetching");
        if let Err(err) = self.vcs.fetch(self.remote, reference) {
            diags.push(Diagnostic::FetchFailed {
                repo: self.vcs.name().to_string(),
                reference: reference.to_string(),
                reason: err.to_string(),
            });
        }

        match self.vcs.resolve_ref(reference) {
            Ok(oid) => Ok(oid),
            Err(err) if is_missing(&err) => Err(UnrollError::RefNotFound {
                repo: self.vcs.name().to_string(),
                reference: reference.to_string(),
            }),
            Err(err) => Err(UnrollError::git(self.vcs.name(), err)),
        }
    }

    /// Commits in `start..end`, oldest first.
    ///
    /// `start` may carry the inclusive caret. An inclusive start at a root
    /// commit walks all the way to the root.
    pub fn range(
        &self,
        start: &str,
        end: &str,
        diags: &mut Diagnostics,
    ) -> Result<Vec<CommitInfo>, UnrollError> {
        let spec = RevSpec::parse(start);
        let start = self.resolve(spec.rev, diags)?;
        let end = self.resolve(end, diags)?;
        self.range_between(&start, spec.inclusive, &end)
    }

    /// Commits after `start` (or from `start` when `inclusive`) up to `end`.
    pub fn range_between(
        &self,
        start: &Oid,
        inclusive: bool,
        end: &Oid,
    ) -> Result<Vec<CommitInfo>, UnrollError> {
        let boundary = if inclusive {
            self.vcs
                .find_commit(start)
                .map_err(|e| UnrollError::git(self.vcs.name(), e))?
                .parents
                .into_iter()
                .next()
        } else {
            Some(start.clone())
        };

        let commits = self
            .vcs
            .commit_range(boundary.as_ref(), end)
            .map_err(|e| UnrollError::git(self.vcs.name(), e))?;
        debug!(
            repo = self.vcs.name(),
            start = start.short(8),
            end = end.short(8),
            inclusive,
            count = commits.len(),
            "resolved range"
        );
        Ok(commits)
    }
}

fn is_missing(err: &GitError) -> bool {
    matches!(
        err,
        GitError::RefNotFound { .. } | GitError::ObjectNotFound { .. } | GitError::InvalidOid { .. }
    )
}
