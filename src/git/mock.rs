//! git::mock
//!
//! In-memory repository for deterministic testing.
//!
//! # Design
//!
//! `MockVcs` implements [`Vcs`] over a linear-or-branching history kept in
//! memory. Every commit stores a full snapshot of its files and gitlinks, so
//! diffs, checkouts and pin reads behave like the real thing without touching
//! the filesystem. Patches are registered up front with the effect applying
//! them should have, and every mutating call is recorded for assertions.
//!
//! # Example
//!
//! ```
//! use uplift_unroll::git::mock::MockVcs;
//! use uplift_unroll::git::Vcs;
//!
//! let repo = MockVcs::new("tt-mlir");
//! let first = repo.commit("Add readme", &[("README.md", "hello\n")]);
//! let second = repo.commit("Edit readme", &[("README.md", "hello world\n")]);
//!
//! let range = repo.commit_range(Some(&first), &second).unwrap();
//! assert_eq!(range.len(), 1);
//! assert_eq!(range[0].oid, second);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{FixedOffset, TimeZone};
use sha2::{Digest, Sha256};

use super::interface::{GitError, GitState};
use super::traits::{CommitInfo, DeltaKind, FileDiff, Identity, Vcs};
use crate::core::types::{BranchName, Oid};

/// Seconds since epoch of the first mock commit.
const EPOCH_START: i64 = 1_700_000_000;

/// A tree entry in the mock repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEntry {
    File(String),
    Gitlink(Oid),
}

/// What applying a registered patch does.
#[derive(Debug, Clone)]
pub enum PatchEffect {
    /// Overwrite `path` with `contents`.
    Write { path: String, contents: String },
    /// Fail with the given message.
    Fail(String),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    Fetch { remote: String, reference: String },
    CreateBranch { name: String, at: Oid },
    DeleteBranch { name: String },
    SwitchBranch { name: String },
    CheckoutTree { oid: Oid },
    ApplyPatch { path: PathBuf },
    Commit { oid: Oid },
}

#[derive(Debug, Clone)]
struct MockCommit {
    info: CommitInfo,
    tree: BTreeMap<String, MockEntry>,
}

#[derive(Debug)]
struct MockRepoInner {
    commits: HashMap<Oid, MockCommit>,
    /// Commits only reachable after a fetch.
    remote_only: HashSet<Oid>,
    branches: BTreeMap<String, Oid>,
    head: String,
    worktree: BTreeMap<String, MockEntry>,
    patches: HashMap<PathBuf, PatchEffect>,
    operations: Vec<MockOperation>,
    fail_fetch: bool,
    dirty: bool,
    state: GitState,
    counter: u64,
}

/// Mock repository for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockVcs {
    name: String,
    inner: Arc<Mutex<MockRepoInner>>,
}

impl MockVcs {
    /// Create a repository with an empty root commit on `main`.
    pub fn new(name: &str) -> Self {
        let repo = Self {
            name: name.to_string(),
            inner: Arc::new(Mutex::new(MockRepoInner {
                commits: HashMap::new(),
                remote_only: HashSet::new(),
                branches: BTreeMap::new(),
                head: "main".to_string(),
                worktree: BTreeMap::new(),
                patches: HashMap::new(),
                operations: Vec::new(),
                fail_fetch: false,
                dirty: false,
                state: GitState::Clean,
                counter: 0,
            })),
        };
        repo.commit("Initial commit", &[]);
        repo
    }

    fn lock(&self) -> MutexGuard<'_, MockRepoInner> {
        self.inner.lock().unwrap()
    }

    /// Commit file writes on top of the current branch and return the new OID.
    pub fn commit(&self, message: &str, files: &[(&str, &str)]) -> Oid {
        let changes = files
            .iter()
            .map(|(path, contents)| (path.to_string(), MockEntry::File(contents.to_string())))
            .collect::<Vec<_>>();
        self.commit_entries(message, changes)
    }

    /// Commit a gitlink update on top of the current branch.
    pub fn commit_gitlink(&self, message: &str, path: &str, target: &Oid) -> Oid {
        self.commit_entries(
            message,
            vec![(path.to_string(), MockEntry::Gitlink(target.clone()))],
        )
    }

    fn commit_entries(&self, message: &str, changes: Vec<(String, MockEntry)>) -> Oid {
        let mut inner = self.lock();
        let mut tree = inner
            .branches
            .get(&inner.head)
            .and_then(|tip| inner.commits.get(tip))
            .map(|c| c.tree.clone())
            .unwrap_or_default();
        tree.extend(changes);
        let identity = Self::next_identity(&mut inner, "Mock Author", "author@example.com");
        let oid = Self::record_commit(&mut inner, &self.name, message, tree, &identity, &identity);
        inner.worktree = inner.commits[&oid].tree.clone();
        oid
    }

    /// Move a commit out of local reach until it is fetched.
    pub fn hide_until_fetch(&self, oid: &Oid) {
        self.lock().remote_only.insert(oid.clone());
    }

    /// Make every fetch fail.
    pub fn fail_fetches(&self) {
        self.lock().fail_fetch = true;
    }

    /// Register the effect of applying the patch at `path`.
    pub fn register_patch(&self, path: impl Into<PathBuf>, effect: PatchEffect) {
        self.lock().patches.insert(path.into(), effect);
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.lock().dirty = dirty;
    }

    pub fn set_state(&self, state: GitState) {
        self.lock().state = state;
    }

    /// Switch HEAD to another branch without touching history (test setup only).
    pub fn checkout_branch_at(&self, name: &str, at: &Oid) {
        let mut inner = self.lock();
        inner.branches.insert(name.to_string(), at.clone());
        inner.head = name.to_string();
        inner.worktree = inner.commits[at].tree.clone();
    }

    /// Current tip of a branch.
    pub fn branch_tip(&self, name: &str) -> Option<Oid> {
        self.lock().branches.get(name).cloned()
    }

    /// Name of the branch HEAD is attached to.
    pub fn head_branch(&self) -> String {
        self.lock().head.clone()
    }

    /// All recorded operations, in call order.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.lock().operations.clone()
    }

    fn next_identity(inner: &mut MockRepoInner, name: &str, email: &str) -> Identity {
        inner.counter += 1;
        let offset = FixedOffset::east_opt(0).unwrap();
        Identity {
            name: name.to_string(),
            email: email.to_string(),
            time: offset
                .timestamp_opt(EPOCH_START + inner.counter as i64 * 60, 0)
                .unwrap(),
        }
    }

    fn record_commit(
        inner: &mut MockRepoInner,
        repo_name: &str,
        message: &str,
        tree: BTreeMap<String, MockEntry>,
        author: &Identity,
        committer: &Identity,
    ) -> Oid {
        inner.counter += 1;
        let parent = inner.branches.get(&inner.head).cloned();

        let mut hasher = Sha256::new();
        hasher.update(repo_name.as_bytes());
        hasher.update(inner.counter.to_be_bytes());
        hasher.update(message.as_bytes());
        if let Some(parent) = &parent {
            hasher.update(parent.as_str().as_bytes());
        }
        let digest = hex::encode(hasher.finalize());
        let oid = Oid::new(&digest[..40]).unwrap();

        let info = CommitInfo {
            oid: oid.clone(),
            parents: parent.into_iter().collect(),
            summary: message.lines().next().unwrap_or("").to_string(),
            message: message.to_string(),
            author: author.clone(),
            committer: committer.clone(),
        };
        inner.commits.insert(oid.clone(), MockCommit { info, tree });
        let head = inner.head.clone();
        inner.branches.insert(head, oid.clone());
        oid
    }

    fn visible<'a>(inner: &'a MockRepoInner, oid: &Oid) -> Option<&'a MockCommit> {
        if inner.remote_only.contains(oid) {
            return None;
        }
        inner.commits.get(oid)
    }

    fn lookup(inner: &MockRepoInner, oid: &Oid) -> Result<MockCommit, GitError> {
        Self::visible(inner, oid)
            .cloned()
            .ok_or_else(|| GitError::ObjectNotFound {
                oid: oid.to_string(),
            })
    }

    fn resolve_name(inner: &MockRepoInner, reference: &str) -> Option<Oid> {
        if let Some(base) = reference.strip_suffix('^') {
            let oid = Self::resolve_name(inner, base)?;
            return Self::visible(inner, &oid)?.info.parents.first().cloned();
        }
        if reference == "HEAD" {
            return inner.branches.get(&inner.head).cloned();
        }
        if let Some(oid) = inner.branches.get(reference) {
            return Some(oid.clone());
        }

        let needle = reference.to_ascii_lowercase();
        if needle.len() < 4 || !needle.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let mut matches = inner
            .commits
            .keys()
            .filter(|oid| oid.as_str().starts_with(&needle) && !inner.remote_only.contains(*oid));
        let first = matches.next()?.clone();
        matches.next().is_none().then_some(first)
    }

    fn ancestors(inner: &MockRepoInner, start: &Oid) -> HashSet<Oid> {
        let mut seen = HashSet::new();
        let mut stack = vec![start.clone()];
        while let Some(oid) = stack.pop() {
            if !seen.insert(oid.clone()) {
                continue;
            }
            if let Some(commit) = inner.commits.get(&oid) {
                stack.extend(commit.info.parents.iter().cloned());
            }
        }
        seen
    }

    fn diff_lines(old: &str, new: &str) -> (Vec<String>, Vec<String>) {
        let old_lines: BTreeSet<&str> = old.lines().collect();
        let new_lines: BTreeSet<&str> = new.lines().collect();
        let removed = old
            .lines()
            .filter(|l| !new_lines.contains(l))
            .map(String::from)
            .collect();
        let added = new
            .lines()
            .filter(|l| !old_lines.contains(l))
            .map(String::from)
            .collect();
        (added, removed)
    }

    fn entry_lines(entry: Option<&MockEntry>) -> String {
        match entry {
            Some(MockEntry::File(contents)) => contents.clone(),
            Some(MockEntry::Gitlink(oid)) => format!("Subproject commit {oid}\n"),
            None => String::new(),
        }
    }
}

impl Vcs for MockVcs {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve_ref(&self, reference: &str) -> Result<Oid, GitError> {
        let inner = self.lock();
        Self::resolve_name(&inner, reference).ok_or_else(|| GitError::RefNotFound {
            refname: reference.to_string(),
        })
    }

    fn find_commit(&self, oid: &Oid) -> Result<CommitInfo, GitError> {
        let inner = self.lock();
        Ok(Self::lookup(&inner, oid)?.info)
    }

    fn commit_range(&self, start: Option<&Oid>, end: &Oid) -> Result<Vec<CommitInfo>, GitError> {
        let inner = self.lock();
        let hidden = match start {
            Some(start) => {
                Self::lookup(&inner, start)?;
                Self::ancestors(&inner, start)
            }
            None => HashSet::new(),
        };

        let mut commits = Vec::new();
        let mut cursor = Some(end.clone());
        while let Some(oid) = cursor {
            if hidden.contains(&oid) {
                break;
            }
            let commit = Self::lookup(&inner, &oid)?;
            cursor = commit.info.parents.first().cloned();
            commits.push(commit.info);
        }
        commits.reverse();
        Ok(commits)
    }

    fn diff(&self, oid: &Oid) -> Result<Vec<FileDiff>, GitError> {
        let inner = self.lock();
        let commit = Self::lookup(&inner, oid)?;
        let parent_tree = match commit.info.parents.first() {
            Some(parent) => Self::lookup(&inner, parent)?.tree,
            None => BTreeMap::new(),
        };

        let paths: BTreeSet<&String> = parent_tree.keys().chain(commit.tree.keys()).collect();
        let mut diffs = Vec::new();
        for path in paths {
            let old = parent_tree.get(path);
            let new = commit.tree.get(path);
            if old == new {
                continue;
            }
            let kind = match (old, new) {
                (None, Some(_)) => DeltaKind::Added,
                (Some(_), None) => DeltaKind::Deleted,
                _ => DeltaKind::Modified,
            };
            let (added, removed) =
                Self::diff_lines(&Self::entry_lines(old), &Self::entry_lines(new));
            diffs.push(FileDiff {
                path: path.clone(),
                kind: Some(kind),
                added,
                removed,
            });
        }
        Ok(diffs)
    }

    fn file_at(&self, oid: &Oid, path: &str) -> Result<Option<String>, GitError> {
        let inner = self.lock();
        match Self::lookup(&inner, oid)?.tree.get(path) {
            Some(MockEntry::File(contents)) => Ok(Some(contents.clone())),
            _ => Ok(None),
        }
    }

    fn gitlink_at(&self, oid: &Oid, path: &str) -> Result<Option<Oid>, GitError> {
        let inner = self.lock();
        match Self::lookup(&inner, oid)?.tree.get(path) {
            Some(MockEntry::Gitlink(target)) => Ok(Some(target.clone())),
            _ => Ok(None),
        }
    }

    fn fetch(&self, remote: &str, reference: &str) -> Result<(), GitError> {
        let mut inner = self.lock();
        inner.operations.push(MockOperation::Fetch {
            remote: remote.to_string(),
            reference: reference.to_string(),
        });
        if inner.fail_fetch {
            return Err(GitError::FetchFailed {
                remote: remote.to_string(),
                reference: reference.to_string(),
                message: "remote unreachable".to_string(),
            });
        }
        let needle = reference.trim_end_matches('^').to_ascii_lowercase();
        inner
            .remote_only
            .retain(|oid| !oid.as_str().starts_with(&needle));
        Ok(())
    }

    fn state(&self) -> GitState {
        self.lock().state.clone()
    }

    fn is_worktree_clean(&self) -> Result<bool, GitError> {
        Ok(!self.lock().dirty)
    }

    fn branch_exists(&self, name: &BranchName) -> Result<bool, GitError> {
        Ok(self.lock().branches.contains_key(name.as_str()))
    }

    fn create_branch(&self, name: &BranchName, at: &Oid) -> Result<(), GitError> {
        let mut inner = self.lock();
        Self::lookup(&inner, at)?;
        if inner.branches.contains_key(name.as_str()) {
            return Err(GitError::Internal {
                message: format!("branch {name} already exists"),
            });
        }
        inner.branches.insert(name.to_string(), at.clone());
        inner.operations.push(MockOperation::CreateBranch {
            name: name.to_string(),
            at: at.clone(),
        });
        Ok(())
    }

    fn delete_branch(&self, name: &BranchName) -> Result<(), GitError> {
        let mut inner = self.lock();
        if inner.head == name.as_str() {
            return Err(GitError::Internal {
                message: format!("cannot delete checked-out branch {name}"),
            });
        }
        if inner.branches.remove(name.as_str()).is_none() {
            return Err(GitError::RefNotFound {
                refname: name.refname(),
            });
        }
        inner.operations.push(MockOperation::DeleteBranch {
            name: name.to_string(),
        });
        Ok(())
    }

    fn switch_branch(&self, name: &BranchName) -> Result<(), GitError> {
        let mut inner = self.lock();
        let tip = inner
            .branches
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| GitError::RefNotFound {
                refname: name.refname(),
            })?;
        inner.head = name.to_string();
        inner.worktree = Self::lookup(&inner, &tip)?.tree;
        inner.operations.push(MockOperation::SwitchBranch {
            name: name.to_string(),
        });
        Ok(())
    }

    fn checkout_tree(&self, oid: &Oid) -> Result<(), GitError> {
        let mut inner = self.lock();
        inner.worktree = Self::lookup(&inner, oid)?.tree;
        inner
            .operations
            .push(MockOperation::CheckoutTree { oid: oid.clone() });
        Ok(())
    }

    fn read_worktree_file(&self, path: &str) -> Result<Option<String>, GitError> {
        match self.lock().worktree.get(path) {
            Some(MockEntry::File(contents)) => Ok(Some(contents.clone())),
            _ => Ok(None),
        }
    }

    fn write_worktree_file(&self, path: &str, contents: &str) -> Result<(), GitError> {
        self.lock()
            .worktree
            .insert(path.to_string(), MockEntry::File(contents.to_string()));
        Ok(())
    }

    fn stage_gitlink(&self, path: &str, oid: &Oid) -> Result<(), GitError> {
        self.lock()
            .worktree
            .insert(path.to_string(), MockEntry::Gitlink(oid.clone()));
        Ok(())
    }

    fn apply_patch(&self, patch: &Path) -> Result<(), GitError> {
        let mut inner = self.lock();
        inner.operations.push(MockOperation::ApplyPatch {
            path: patch.to_path_buf(),
        });
        match inner.patches.get(patch).cloned() {
            Some(PatchEffect::Write { path, contents }) => {
                inner.worktree.insert(path, MockEntry::File(contents));
                Ok(())
            }
            Some(PatchEffect::Fail(message)) => Err(GitError::PatchFailed {
                path: patch.to_path_buf(),
                message,
            }),
            None => Err(GitError::PatchFailed {
                path: patch.to_path_buf(),
                message: "no such patch".to_string(),
            }),
        }
    }

    fn commit_index(
        &self,
        message: &str,
        author: &Identity,
        committer: &Identity,
    ) -> Result<Oid, GitError> {
        let mut inner = self.lock();
        let tree = inner.worktree.clone();
        let oid = Self::record_commit(&mut inner, &self.name, message, tree, author, committer);
        inner.operations.push(MockOperation::Commit { oid: oid.clone() });
        Ok(oid)
    }

    fn git_dir(&self) -> Option<PathBuf> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_heads_prefixes_and_carets() {
        let repo = MockVcs::new("core");
        let a = repo.commit("a", &[("f", "1\n")]);
        let b = repo.commit("b", &[("f", "2\n")]);

        assert_eq!(repo.resolve_ref("HEAD").unwrap(), b);
        assert_eq!(repo.resolve_ref("main").unwrap(), b);
        assert_eq!(repo.resolve_ref(b.short(8)).unwrap(), b);
        assert_eq!(repo.resolve_ref(&format!("{}^", b.short(8))).unwrap(), a);
        assert!(matches!(
            repo.resolve_ref("nope"),
            Err(GitError::RefNotFound { .. })
        ));
    }

    #[test]
    fn range_excludes_start_and_includes_end() {
        let repo = MockVcs::new("core");
        let a = repo.commit("a", &[("f", "1\n")]);
        let b = repo.commit("b", &[("f", "2\n")]);
        let c = repo.commit("c", &[("f", "3\n")]);

        let range = repo.commit_range(Some(&a), &c).unwrap();
        let oids: Vec<_> = range.into_iter().map(|c| c.oid).collect();
        assert_eq!(oids, vec![b, c]);
    }

    #[test]
    fn diff_reports_changed_lines() {
        let repo = MockVcs::new("fe");
        repo.commit("pin", &[("deps.txt", "keep\nset(V \"aaaa\")\n")]);
        let bump = repo.commit("bump", &[("deps.txt", "keep\nset(V \"bbbb\")\n")]);

        let diff = repo.diff(&bump).unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].removed, vec!["set(V \"aaaa\")".to_string()]);
        assert_eq!(diff[0].added, vec!["set(V \"bbbb\")".to_string()]);
    }

    #[test]
    fn gitlink_diff_uses_subproject_lines() {
        let core = MockVcs::new("core");
        let c1 = core.commit("c1", &[]);
        let c2 = core.commit("c2", &[]);

        let fe = MockVcs::new("fe");
        fe.commit_gitlink("add", "third_party/core", &c1);
        let bump = fe.commit_gitlink("bump", "third_party/core", &c2);

        let diff = fe.diff(&bump).unwrap();
        assert_eq!(diff[0].removed, vec![format!("Subproject commit {c1}")]);
        assert_eq!(diff[0].added, vec![format!("Subproject commit {c2}")]);
    }

    #[test]
    fn hidden_commits_appear_after_fetch() {
        let repo = MockVcs::new("core");
        let a = repo.commit("a", &[]);
        repo.hide_until_fetch(&a);

        assert!(repo.resolve_ref(a.as_str()).is_err());
        repo.fetch("origin", a.as_str()).unwrap();
        assert_eq!(repo.resolve_ref(a.as_str()).unwrap(), a);
    }

    #[test]
    fn commit_index_records_worktree() {
        let repo = MockVcs::new("core");
        let a = repo.commit("a", &[("f", "1\n")]);
        repo.write_worktree_file("f", "changed\n").unwrap();

        let identity = repo.find_commit(&a).unwrap().author;
        let new = repo.commit_index("msg", &identity, &identity).unwrap();

        assert_eq!(repo.file_at(&new, "f").unwrap().as_deref(), Some("changed\n"));
        assert_eq!(repo.find_commit(&new).unwrap().parents, vec![a]);
    }
}
