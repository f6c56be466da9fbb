//! Git-backed file synchronization engine.
//!
//! [`GitFileSynchronizer`] keeps tracked files of a local repository
//! consistent with a remote, reconciling concurrent edits with git's own
//! branch and merge primitives. Its operations are split by concern:
//!
//! - `guard`: working-tree cleanliness, checked before every mutation
//! - `remote`: fetch, push, remote-branch queries
//! - `writer`: writing files into the working tree and committing them
//! - `merge`: merging with the remote and the conflict-isolation protocol
//!
//! The backend is the `git2` crate; nothing outside this module touches it
//! except through the re-exports below.

mod error;
mod guard;
mod merge;
mod notify;
mod remote;
mod synchronizer;
mod transport;
mod writer;

pub use error::{Result, SyncError};
pub use merge::MergeOutcome;
pub use notify::{Notifier, TracingNotifier};
pub use remote::PushOutcome;
pub use synchronizer::{Author, GitFileSynchronizer, MARKER_BRANCH, RepoSettings};
pub use transport::{CredentialTransport, NoCredentials, TransportSetter};

/// Object ids as used by the public API.
pub use git2::Oid;
