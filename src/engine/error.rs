//! engine::error
//!
//! Fatal errors of an unroll run.
//!
//! Every variant here aborts the run. The checks that can raise them all run
//! before the first branch is touched, except for [`UnrollError::Git`] and
//! [`UnrollError::VerificationFailed`], which can only come from a
//! repository that changed underneath us mid-run.

use thiserror::Error;

use crate::core::layers::Layer;
use crate::core::lock::LockError;
use crate::core::types::TypeError;
use crate::git::{GitError, GitState};

/// Errors from the unroll pipeline.
#[derive(Debug, Error)]
pub enum UnrollError {
    /// A revision could not be resolved, even after fetching.
    #[error("{repo}: cannot resolve '{reference}'")]
    RefNotFound {
        /// Repository the revision was looked up in
        repo: String,
        /// The revision expression as given
        reference: String,
    },

    /// The working tree has changes that a forced checkout would destroy.
    #[error("{repo}: working tree has uncommitted changes")]
    DirtyWorktree { repo: String },

    /// A rebase, merge or similar is in progress.
    #[error("{repo}: {operation} in progress")]
    OperationInProgress { repo: String, operation: GitState },

    /// A layer the run needs was not provided.
    #[error("no {layer} repository available")]
    LayerUnavailable { layer: Layer },

    /// Failed to acquire a repository lock.
    #[error("failed to acquire lock: {0}")]
    Lock(#[from] LockError),

    /// A name given for a branch is not a valid branch name.
    #[error("invalid name: {0}")]
    InvalidName(#[from] TypeError),

    /// A materialized branch does not carry the expected history.
    #[error("{repo}: branch {branch} failed verification: {message}")]
    VerificationFailed {
        repo: String,
        branch: String,
        message: String,
    },

    /// Git operation failed.
    #[error("{repo}: {source}")]
    Git {
        repo: String,
        #[source]
        source: GitError,
    },
}

impl UnrollError {
    pub(crate) fn git(repo: &str, source: GitError) -> Self {
        UnrollError::Git {
            repo: repo.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_repository() {
        let err = UnrollError::RefNotFound {
            repo: "tt-xla".into(),
            reference: "deadbeef^".into(),
        };
        assert_eq!(err.to_string(), "tt-xla: cannot resolve 'deadbeef^'");

        let err = UnrollError::OperationInProgress {
            repo: "tt-mlir".into(),
            operation: GitState::Rebase,
        };
        assert!(err.to_string().starts_with("tt-mlir: "));

        let err = UnrollError::LayerUnavailable { layer: Layer::Base };
        assert_eq!(err.to_string(), "no base repository available");
    }
}
