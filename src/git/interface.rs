//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to libgit2. All repository
//! reads and writes the unroll engine performs flow through the [`Vcs`]
//! implementation on [`Git`], which normalizes errors into typed failure
//! categories.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::RefNotFound`]: Requested revision does not resolve
//! - [`GitError::DirtyWorktree`]: Working tree has uncommitted changes
//! - [`GitError::PatchFailed`]: A patch did not apply cleanly
//!
//! # Example
//!
//! ```ignore
//! use uplift_unroll::git::{Git, Vcs};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("tt-mlir"))?;
//! let oid = git.resolve_ref("HEAD~3")?;
//! println!("{} is at {}", git.name(), oid.short(8));
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use thiserror::Error;

use super::traits::{CommitInfo, DeltaKind, FileDiff, Identity, Vcs};
use crate::core::types::{BranchName, Oid, TypeError};

/// Git file mode of a gitlink (submodule) entry.
const GITLINK_MODE: u32 = 0o160000;

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested revision does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Git operation in progress (rebase, merge, etc.).
    #[error("{operation} in progress")]
    OperationInProgress {
        /// The type of operation in progress
        operation: GitState,
    },

    /// Working tree has uncommitted changes.
    #[error("working tree is dirty: {details}")]
    DirtyWorktree {
        /// Description of what's dirty
        details: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// A patch could not be applied.
    #[error("patch {path} failed to apply: {message}")]
    PatchFailed { path: PathBuf, message: String },

    /// Fetch from a remote failed.
    #[error("fetch of {reference} from {remote} failed: {message}")]
    FetchFailed {
        remote: String,
        reference: String,
        message: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::ObjectNotFound {
                oid: context.to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }

    fn internal(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }

    fn io(err: std::io::Error, path: &Path) -> Self {
        GitError::AccessError {
            message: format!("{}: {}", path.display(), err),
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: err.message().to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: err.message().to_string(),
            },
            _ => GitError::internal(err),
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        GitError::InvalidOid {
            oid: err.to_string(),
        }
    }
}

/// State of in-progress Git operations.
///
/// Materialization refuses to start while any of these is in progress,
/// since it force-checks-out trees over the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitState {
    /// No operation in progress.
    Clean,
    Rebase,
    Merge,
    CherryPick,
    Revert,
    Bisect,
    ApplyMailbox,
}

impl GitState {
    /// Check if any operation is in progress.
    ///
    /// # Example
    ///
    /// ```
    /// use uplift_unroll::git::GitState;
    ///
    /// assert!(!GitState::Clean.is_in_progress());
    /// assert!(GitState::Merge.is_in_progress());
    /// ```
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, GitState::Clean)
    }

    /// Get a human-readable description of the state.
    pub fn description(&self) -> &'static str {
        match self {
            GitState::Clean => "clean",
            GitState::Rebase => "rebase",
            GitState::Merge => "merge",
            GitState::CherryPick => "cherry-pick",
            GitState::Revert => "revert",
            GitState::Bisect => "bisect",
            GitState::ApplyMailbox => "apply-mailbox",
        }
    }
}

impl std::fmt::Display for GitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Summary of working tree status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    /// Number of staged changes
    pub staged: usize,
    /// Number of unstaged changes to tracked files
    pub unstaged: usize,
    /// Whether there are unresolved conflicts
    pub has_conflicts: bool,
}

impl WorktreeStatus {
    /// Check if the worktree is completely clean.
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && !self.has_conflicts
    }
}

/// The Git interface.
///
/// This is the **single point of interaction** with libgit2. No other module
/// imports `git2` directly.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
    /// Display name (working directory basename)
    name: String,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("name", &self.name)
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover`, so `path` can be any directory
    /// within the repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        let work_dir = repo.workdir().ok_or(GitError::BareRepo)?;
        let name = work_dir
            .components()
            .next_back()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self { repo, name })
    }

    /// Path to the working directory.
    pub fn work_dir(&self) -> Result<&Path, GitError> {
        self.repo.workdir().ok_or(GitError::BareRepo)
    }

    /// Get working tree status summary, ignoring untracked files and submodules.
    pub fn worktree_status(&self) -> Result<WorktreeStatus, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(false)
            .include_ignored(false)
            .exclude_submodules(true);

        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .map_err(GitError::internal)?;

        let mut result = WorktreeStatus::default();
        for entry in statuses.iter() {
            let status = entry.status();
            if status.is_conflicted() {
                result.has_conflicts = true;
            }
            if status.is_index_new()
                || status.is_index_modified()
                || status.is_index_deleted()
                || status.is_index_renamed()
                || status.is_index_typechange()
            {
                result.staged += 1;
            }
            if status.is_wt_modified()
                || status.is_wt_deleted()
                || status.is_wt_renamed()
                || status.is_wt_typechange()
            {
                result.unstaged += 1;
            }
        }

        Ok(result)
    }

    fn lookup_commit(&self, oid: &Oid) -> Result<git2::Commit<'_>, GitError> {
        let git_oid =
            git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        self.repo
            .find_commit(git_oid)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))
    }

    fn to_oid(oid: git2::Oid) -> Result<Oid, GitError> {
        Oid::new(oid.to_string()).map_err(GitError::from)
    }

    fn identity(sig: &git2::Signature<'_>) -> Identity {
        let when = sig.when();
        let offset =
            FixedOffset::east_opt(when.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
        let time = offset
            .timestamp_opt(when.seconds(), 0)
            .single()
            .unwrap_or_else(|| DateTime::UNIX_EPOCH.with_timezone(&offset));

        Identity {
            name: String::from_utf8_lossy(sig.name_bytes()).into_owned(),
            email: String::from_utf8_lossy(sig.email_bytes()).into_owned(),
            time,
        }
    }

    fn signature(identity: &Identity) -> Result<git2::Signature<'static>, GitError> {
        let time = git2::Time::new(
            identity.time.timestamp(),
            identity.time.offset().local_minus_utc() / 60,
        );
        git2::Signature::new(&identity.name, &identity.email, &time).map_err(GitError::internal)
    }

    fn commit_info(&self, commit: &git2::Commit<'_>) -> Result<CommitInfo, GitError> {
        let parents = commit
            .parent_ids()
            .map(Self::to_oid)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CommitInfo {
            oid: Self::to_oid(commit.id())?,
            parents,
            summary: commit.summary().unwrap_or("").to_string(),
            message: commit.message().unwrap_or("").to_string(),
            author: Self::identity(&commit.author()),
            committer: Self::identity(&commit.committer()),
        })
    }

    fn tree_entry_at<'r>(
        &'r self,
        oid: &Oid,
        path: &str,
    ) -> Result<Option<git2::TreeEntry<'r>>, GitError> {
        let tree = self.lookup_commit(oid)?.tree().map_err(GitError::internal)?;
        match tree.get_path(Path::new(path)) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::internal(e)),
        }
    }

    /// Index paths that are gitlinks; `update_all` must leave them alone.
    fn gitlink_paths(index: &git2::Index) -> Vec<PathBuf> {
        index
            .iter()
            .filter(|entry| entry.mode == GITLINK_MODE)
            .map(|entry| PathBuf::from(String::from_utf8_lossy(&entry.path).into_owned()))
            .collect()
    }

    fn file_diff(diff: &git2::Diff<'_>, idx: usize) -> Result<FileDiff, GitError> {
        let delta = diff.get_delta(idx).ok_or_else(|| GitError::Internal {
            message: format!("missing diff delta {idx}"),
        })?;

        let path = delta
            .new_file()
            .path()
            .or_else(|| delta.old_file().path())
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let kind = match delta.status() {
            git2::Delta::Added => Some(DeltaKind::Added),
            git2::Delta::Deleted => Some(DeltaKind::Deleted),
            _ => Some(DeltaKind::Modified),
        };

        let mut file = FileDiff {
            path,
            kind,
            ..Default::default()
        };

        let old_is_link = delta.old_file().mode() == git2::FileMode::Commit;
        let new_is_link = delta.new_file().mode() == git2::FileMode::Commit;
        if old_is_link || new_is_link {
            if old_is_link && !delta.old_file().id().is_zero() {
                file.removed
                    .push(format!("Subproject commit {}", delta.old_file().id()));
            }
            if new_is_link && !delta.new_file().id().is_zero() {
                file.added
                    .push(format!("Subproject commit {}", delta.new_file().id()));
            }
            return Ok(file);
        }

        let Some(patch) = git2::Patch::from_diff(diff, idx).map_err(GitError::internal)? else {
            return Ok(file);
        };

        for hunk in 0..patch.num_hunks() {
            let lines = patch
                .num_lines_in_hunk(hunk)
                .map_err(GitError::internal)?;
            for line_idx in 0..lines {
                let line = patch
                    .line_in_hunk(hunk, line_idx)
                    .map_err(GitError::internal)?;
                let text = String::from_utf8_lossy(line.content())
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                match line.origin() {
                    '+' => file.added.push(text),
                    '-' => file.removed.push(text),
                    _ => {}
                }
            }
        }

        Ok(file)
    }
}

impl Vcs for Git {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve_ref(&self, reference: &str) -> Result<Oid, GitError> {
        let not_found = || GitError::RefNotFound {
            refname: reference.to_string(),
        };

        let object = self.repo.revparse_single(reference).map_err(|e| match e.code() {
            git2::ErrorCode::NotFound
            | git2::ErrorCode::InvalidSpec
            | git2::ErrorCode::Ambiguous => not_found(),
            _ => GitError::from_git2(e, reference),
        })?;

        let commit = object.peel_to_commit().map_err(|_| not_found())?;
        Self::to_oid(commit.id())
    }

    fn find_commit(&self, oid: &Oid) -> Result<CommitInfo, GitError> {
        let commit = self.lookup_commit(oid)?;
        self.commit_info(&commit)
    }

    fn commit_range(&self, start: Option<&Oid>, end: &Oid) -> Result<Vec<CommitInfo>, GitError> {
        let mut walk = self.repo.revwalk().map_err(GitError::internal)?;
        walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE)
            .map_err(GitError::internal)?;
        walk.simplify_first_parent().map_err(GitError::internal)?;

        let end_oid = self.lookup_commit(end)?.id();
        walk.push(end_oid).map_err(GitError::internal)?;
        if let Some(start) = start {
            walk.hide(self.lookup_commit(start)?.id())
                .map_err(GitError::internal)?;
        }

        let mut commits = Vec::new();
        for oid in walk {
            let oid = oid.map_err(GitError::internal)?;
            let commit = self
                .repo
                .find_commit(oid)
                .map_err(|e| GitError::from_git2(e, &oid.to_string()))?;
            commits.push(self.commit_info(&commit)?);
        }
        Ok(commits)
    }

    fn diff(&self, oid: &Oid) -> Result<Vec<FileDiff>, GitError> {
        let commit = self.lookup_commit(oid)?;
        let tree = commit.tree().map_err(GitError::internal)?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree().map_err(GitError::internal)?),
            Err(_) => None,
        };

        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
            .map_err(GitError::internal)?;

        (0..diff.deltas().len())
            .map(|idx| Self::file_diff(&diff, idx))
            .collect()
    }

    fn file_at(&self, oid: &Oid, path: &str) -> Result<Option<String>, GitError> {
        let Some(entry) = self.tree_entry_at(oid, path)? else {
            return Ok(None);
        };
        if entry.kind() != Some(git2::ObjectType::Blob) {
            return Ok(None);
        }
        let blob = self
            .repo
            .find_blob(entry.id())
            .map_err(|e| GitError::from_git2(e, path))?;
        Ok(Some(String::from_utf8_lossy(blob.content()).into_owned()))
    }

    fn gitlink_at(&self, oid: &Oid, path: &str) -> Result<Option<Oid>, GitError> {
        match self.tree_entry_at(oid, path)? {
            Some(entry) if entry.filemode() == GITLINK_MODE as i32 => {
                Ok(Some(Self::to_oid(entry.id())?))
            }
            _ => Ok(None),
        }
    }

    fn fetch(&self, remote: &str, reference: &str) -> Result<(), GitError> {
        let failed = |message: String| GitError::FetchFailed {
            remote: remote.to_string(),
            reference: reference.to_string(),
            message,
        };

        let mut handle = self
            .repo
            .find_remote(remote)
            .map_err(|e| failed(e.message().to_string()))?;
        handle
            .fetch(&[reference], None, None)
            .map_err(|e| failed(e.message().to_string()))
    }

    fn state(&self) -> GitState {
        match self.repo.state() {
            git2::RepositoryState::Clean => GitState::Clean,
            git2::RepositoryState::Rebase
            | git2::RepositoryState::RebaseInteractive
            | git2::RepositoryState::RebaseMerge => GitState::Rebase,
            git2::RepositoryState::Merge => GitState::Merge,
            git2::RepositoryState::CherryPick | git2::RepositoryState::CherryPickSequence => {
                GitState::CherryPick
            }
            git2::RepositoryState::Revert | git2::RepositoryState::RevertSequence => {
                GitState::Revert
            }
            git2::RepositoryState::Bisect => GitState::Bisect,
            git2::RepositoryState::ApplyMailbox | git2::RepositoryState::ApplyMailboxOrRebase => {
                GitState::ApplyMailbox
            }
        }
    }

    fn is_worktree_clean(&self) -> Result<bool, GitError> {
        Ok(self.worktree_status()?.is_clean())
    }

    fn branch_exists(&self, name: &BranchName) -> Result<bool, GitError> {
        match self.repo.find_branch(name.as_str(), git2::BranchType::Local) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) => Err(GitError::internal(e)),
        }
    }

    fn create_branch(&self, name: &BranchName, at: &Oid) -> Result<(), GitError> {
        let commit = self.lookup_commit(at)?;
        self.repo
            .branch(name.as_str(), &commit, false)
            .map_err(|e| GitError::from_git2(e, name.as_str()))?;
        Ok(())
    }

    fn delete_branch(&self, name: &BranchName) -> Result<(), GitError> {
        let mut branch = self
            .repo
            .find_branch(name.as_str(), git2::BranchType::Local)
            .map_err(|_| GitError::RefNotFound {
                refname: name.refname(),
            })?;
        branch.delete().map_err(GitError::internal)
    }

    fn switch_branch(&self, name: &BranchName) -> Result<(), GitError> {
        let refname = name.refname();
        if self.repo.find_reference(&refname).is_err() {
            return Err(GitError::RefNotFound { refname });
        }

        self.repo.set_head(&refname).map_err(GitError::internal)?;
        let mut opts = git2::build::CheckoutBuilder::new();
        opts.force();
        self.repo
            .checkout_head(Some(&mut opts))
            .map_err(GitError::internal)
    }

    fn checkout_tree(&self, oid: &Oid) -> Result<(), GitError> {
        let tree = self.lookup_commit(oid)?.tree().map_err(GitError::internal)?;
        let mut opts = git2::build::CheckoutBuilder::new();
        opts.force();
        self.repo
            .checkout_tree(tree.as_object(), Some(&mut opts))
            .map_err(|e| GitError::from_git2(e, oid.as_str()))
    }

    fn read_worktree_file(&self, path: &str) -> Result<Option<String>, GitError> {
        let full = self.work_dir()?.join(path);
        match std::fs::read_to_string(&full) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GitError::io(e, &full)),
        }
    }

    fn write_worktree_file(&self, path: &str, contents: &str) -> Result<(), GitError> {
        let full = self.work_dir()?.join(path);
        std::fs::write(&full, contents).map_err(|e| GitError::io(e, &full))?;

        let mut index = self.repo.index().map_err(GitError::internal)?;
        index
            .add_path(Path::new(path))
            .map_err(|e| GitError::from_git2(e, path))?;
        index.write().map_err(GitError::internal)
    }

    fn stage_gitlink(&self, path: &str, oid: &Oid) -> Result<(), GitError> {
        let id =
            git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        let mut index = self.repo.index().map_err(GitError::internal)?;
        let entry = git2::IndexEntry {
            ctime: git2::IndexTime::new(0, 0),
            mtime: git2::IndexTime::new(0, 0),
            dev: 0,
            ino: 0,
            mode: GITLINK_MODE,
            uid: 0,
            gid: 0,
            file_size: 0,
            id,
            flags: 0,
            flags_extended: 0,
            path: path.as_bytes().to_vec(),
        };
        index.add(&entry).map_err(GitError::internal)?;
        index.write().map_err(GitError::internal)
    }

    fn apply_patch(&self, patch: &Path) -> Result<(), GitError> {
        let failed = |message: String| GitError::PatchFailed {
            path: patch.to_path_buf(),
            message,
        };

        let bytes = std::fs::read(patch).map_err(|e| failed(e.to_string()))?;
        let diff = git2::Diff::from_buffer(&bytes).map_err(|e| failed(e.message().to_string()))?;
        self.repo
            .apply(&diff, git2::ApplyLocation::Both, None)
            .map_err(|e| failed(e.message().to_string()))
    }

    fn commit_index(
        &self,
        message: &str,
        author: &Identity,
        committer: &Identity,
    ) -> Result<Oid, GitError> {
        let mut index = self.repo.index().map_err(GitError::internal)?;
        let gitlinks = Self::gitlink_paths(&index);
        let skip_gitlinks: &mut git2::IndexMatchedPath<'_> = &mut |path: &Path, _spec: &[u8]| {
            if gitlinks.iter().any(|link| link == path) {
                1
            } else {
                0
            }
        };
        index
            .update_all(["*"], Some(skip_gitlinks))
            .map_err(GitError::internal)?;
        index.write().map_err(GitError::internal)?;

        let tree_id = index.write_tree().map_err(GitError::internal)?;
        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(|e| GitError::from_git2(e, &tree_id.to_string()))?;

        let parent = self
            .repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        let oid = self
            .repo
            .commit(
                Some("HEAD"),
                &Self::signature(author)?,
                &Self::signature(committer)?,
                message,
                &tree,
                &[&parent],
            )
            .map_err(GitError::internal)?;

        Self::to_oid(oid)
    }

    fn git_dir(&self) -> Option<PathBuf> {
        Some(self.repo.path().to_path_buf())
    }
}
