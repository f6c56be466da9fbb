//! Crate entry point for **orgsync**.
//!
//! The [`git`] module is the synchronization engine and can be used on its
//! own. The remaining modules implement the `orgsync` CLI on top of it
//! (config parsing, the multi-repository sync driver, manual commands).

mod commit;
mod config;
pub mod git;
mod inspect;
mod list;
mod paths;
mod sync;

/// Re-export commonly used types and commands so they can be accessed from `orgsync::*`.
pub use commit::{BaseRevision, CommitMode, cmd_commit};
pub use inspect::{cmd_retrieve, cmd_revision};
pub use list::cmd_list;
pub use paths::orgsync_home;
pub use sync::{cmd_merge, cmd_push, cmd_sync};
