//! git::traits
//!
//! The narrow version-control interface the unroll engine consumes.
//!
//! # Design
//!
//! One `Vcs` handle stands for one repository (frontend, core or base). The
//! engine never touches `git2` directly; it only sees commit values, diffs
//! and a handful of working-tree mutations. This keeps the engine testable
//! against [`super::mock::MockVcs`] and lets [`super::Git`] be the only
//! place that speaks libgit2.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::interface::{GitError, GitState};
use crate::core::types::{BranchName, Oid};

/// Name, email and timestamp of an author or committer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
    pub time: DateTime<FixedOffset>,
}

/// Read-only snapshot of a commit.
///
/// Fetched on demand from a [`Vcs`]; diffs are not cached here and must be
/// requested through [`Vcs::diff`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// The commit OID
    pub oid: Oid,
    /// Parent OIDs, first parent first
    pub parents: Vec<Oid>,
    /// First line of the commit message
    pub summary: String,
    /// Full commit message
    pub message: String,
    pub author: Identity,
    pub committer: Identity,
}

impl CommitInfo {
    /// First line of the message, as git would show it in `--oneline`.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// How a path changed in a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaKind {
    Added,
    Deleted,
    Modified,
}

/// Per-file diff of a commit against its first parent.
///
/// Gitlink changes are reported as `Subproject commit <hash>` lines, the
/// same text `git show` prints for a submodule bump.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileDiff {
    pub path: String,
    pub kind: Option<DeltaKind>,
    /// Added lines without the leading `+`
    pub added: Vec<String>,
    /// Removed lines without the leading `-`
    pub removed: Vec<String>,
}

impl FileDiff {
    pub fn is_modified(&self) -> bool {
        matches!(self.kind, Some(DeltaKind::Modified) | None)
    }
}

/// Version-control operations for a single repository.
pub trait Vcs {
    /// Short display name (usually the repository directory name).
    fn name(&self) -> &str;

    /// Resolve a revision expression (`HEAD~3`, a branch, a hash, `abc^`) to a commit.
    fn resolve_ref(&self, reference: &str) -> Result<Oid, GitError>;

    /// Load one commit.
    fn find_commit(&self, oid: &Oid) -> Result<CommitInfo, GitError>;

    /// Commits on the first-parent line reachable from `end` but not from `start`.
    ///
    /// Oldest first. `start = None` walks to the root.
    fn commit_range(&self, start: Option<&Oid>, end: &Oid) -> Result<Vec<CommitInfo>, GitError>;

    /// Diff of `oid` against its first parent (empty tree for a root commit).
    fn diff(&self, oid: &Oid) -> Result<Vec<FileDiff>, GitError>;

    /// Content of `path` in the tree of `oid`, if it is a regular file.
    fn file_at(&self, oid: &Oid, path: &str) -> Result<Option<String>, GitError>;

    /// Gitlink target recorded at `path` in the tree of `oid`.
    fn gitlink_at(&self, oid: &Oid, path: &str) -> Result<Option<Oid>, GitError>;

    /// Best-effort fetch of `reference` from `remote`.
    fn fetch(&self, remote: &str, reference: &str) -> Result<(), GitError>;

    /// In-progress operation state (rebase, merge, ...).
    fn state(&self) -> GitState;

    /// True when there are no staged or unstaged changes to tracked files.
    fn is_worktree_clean(&self) -> Result<bool, GitError>;

    fn branch_exists(&self, name: &BranchName) -> Result<bool, GitError>;

    fn create_branch(&self, name: &BranchName, at: &Oid) -> Result<(), GitError>;

    fn delete_branch(&self, name: &BranchName) -> Result<(), GitError>;

    /// Attach HEAD to `name` and force the working tree to its tip.
    fn switch_branch(&self, name: &BranchName) -> Result<(), GitError>;

    /// Overlay the full tree of `oid` onto the index and working tree.
    ///
    /// HEAD does not move; the next [`Vcs::commit_index`] records the result
    /// on top of the current branch.
    fn checkout_tree(&self, oid: &Oid) -> Result<(), GitError>;

    fn read_worktree_file(&self, path: &str) -> Result<Option<String>, GitError>;

    /// Write `path` in the working tree and stage it, so later patches see
    /// index and working tree agree.
    fn write_worktree_file(&self, path: &str, contents: &str) -> Result<(), GitError>;

    /// Point the gitlink at `path` to `oid` in the index.
    fn stage_gitlink(&self, path: &str, oid: &Oid) -> Result<(), GitError>;

    /// Apply a unified diff to the working tree and index.
    fn apply_patch(&self, patch: &Path) -> Result<(), GitError>;

    /// Record tracked working-tree changes as a new commit on the current branch.
    fn commit_index(
        &self,
        message: &str,
        author: &Identity,
        committer: &Identity,
    ) -> Result<Oid, GitError>;

    /// Git directory, used for the per-repository lock. `None` for in-memory repositories.
    fn git_dir(&self) -> Option<PathBuf>;
}
