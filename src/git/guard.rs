use git2::{Status, StatusOptions};
use tracing::debug;

use super::error::{Result, SyncError};
use super::synchronizer::GitFileSynchronizer;

/// Status bits that count as an uncommitted change. Untracked and ignored
/// files do not.
fn is_uncommitted(s: Status) -> bool {
    s.intersects(
        Status::INDEX_NEW
            | Status::INDEX_MODIFIED
            | Status::INDEX_DELETED
            | Status::INDEX_RENAMED
            | Status::INDEX_TYPECHANGE
            | Status::WT_MODIFIED
            | Status::WT_DELETED
            | Status::WT_RENAMED
            | Status::WT_TYPECHANGE
            | Status::CONFLICTED,
    )
}

impl GitFileSynchronizer {
    /// True iff nothing is staged or modified relative to HEAD.
    pub fn is_clean(&self) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(false)
            .include_ignored(false)
            .exclude_submodules(true);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        let dirty = statuses.iter().find(|e| is_uncommitted(e.status()));
        if let Some(entry) = dirty {
            debug!(path = entry.path().unwrap_or("?"), status = ?entry.status(), "uncommitted change");
            return Ok(false);
        }
        Ok(true)
    }

    /// Fail with [`SyncError::DirtyRepository`] if the working tree has
    /// uncommitted changes. Called first by every mutating operation.
    pub fn ensure_clean(&self) -> Result<()> {
        if !self.is_clean()? {
            return Err(SyncError::DirtyRepository(self.repo_path()?.to_path_buf()));
        }
        Ok(())
    }
}
