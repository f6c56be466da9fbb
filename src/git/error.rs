//! Errors raised by the synchronization engine.
//!
//! Routine outcomes are not errors: a stale base revision and an
//! unresolvable merge conflict are reported as `Ok(false)` by the
//! operations that can produce them.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SyncError {
    #[error("refusing to update because there are uncommitted changes in {0}")]
    DirtyRepository(PathBuf),

    #[error("failed to {op} {remote}: {message}")]
    NetworkOrAuth {
        op: &'static str,
        remote: String,
        message: String,
    },

    #[error("can't add new file {0} that already exists")]
    AlreadyExists(String),

    #[error("file {0} does not exist")]
    NotFound(PathBuf),

    #[error("invalid repository path: {0}")]
    InvalidPath(String),

    #[error("failed to set marker branch {branch}: {source}")]
    MarkerBranch {
        branch: String,
        #[source]
        source: git2::Error,
    },

    #[error("failed to merge {local} and {remote}")]
    MergeFailed { local: String, remote: String },

    #[error("failed to create branch {branch} at {expected} (head is {actual})")]
    BranchCreationFailed {
        branch: String,
        expected: String,
        actual: String,
    },

    #[error(
        "the provided file revision {file_revision} for {path} is not the same as the one found in commit {commit}"
    )]
    RevisionMismatch {
        path: String,
        file_revision: String,
        commit: String,
    },

    #[error("unexpected failure to merge branch {from} into {into}")]
    UnexpectedMergeFailure { from: String, into: String },

    #[error("failed to checkout {branch}: {source}")]
    Checkout {
        branch: String,
        #[source]
        source: git2::Error,
    },

    #[error("failed to open repository at {0}: {1}")]
    OpenRepo(PathBuf, #[source] git2::Error),

    #[error("HEAD is detached in {0}, check out a branch first")]
    DetachedHead(PathBuf),

    #[error("repository at {0} has no working tree")]
    Bare(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
}

impl SyncError {
    /// Whether this error is an internal invariant violation, i.e. a bug or
    /// a corrupted repository rather than an anticipated condition.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::BranchCreationFailed { .. }
                | SyncError::RevisionMismatch { .. }
                | SyncError::UnexpectedMergeFailure { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_violations_are_fatal() {
        let e = SyncError::UnexpectedMergeFailure {
            from: "merge-x".into(),
            into: "refs/heads/main".into(),
        };
        assert!(e.is_fatal());
        assert!(!SyncError::DirtyRepository(PathBuf::from("/r")).is_fatal());
        assert!(!SyncError::AlreadyExists("a.org".into()).is_fatal());
    }

    #[test]
    fn messages_name_the_operation() {
        let e = SyncError::NetworkOrAuth {
            op: "push",
            remote: "origin".into(),
            message: "connection refused".into(),
        };
        assert_eq!(e.to_string(), "failed to push origin: connection refused");
    }
}
