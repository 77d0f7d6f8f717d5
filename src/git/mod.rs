//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. Every history read and every
//! rewrite performed during an unroll flows through the [`Vcs`] trait. No
//! other module imports `git2`; the engine is written against the trait and
//! tested against [`mock::MockVcs`].
//!
//! # Responsibilities
//!
//! - Repository discovery and opening
//! - Revision resolution and first-parent range walks
//! - Per-commit diffs, including gitlink changes
//! - Tree overlays, patch application and commits on the current branch
//! - Status and state detection
//!
//! # Example
//!
//! ```ignore
//! use uplift_unroll::git::{Git, Vcs};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("../tt-mlir"))?;
//! let head = git.resolve_ref("HEAD")?;
//! for commit in git.commit_range(None, &head)? {
//!     println!("{} {}", commit.oid.short(8), commit.subject());
//! }
//! ```

mod interface;
pub mod mock;
mod traits;

pub use interface::{Git, GitError, GitState, WorktreeStatus};
pub use traits::{CommitInfo, DeltaKind, FileDiff, Identity, Vcs};
