use git2::{Commit, Oid};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::error::{Result, SyncError};
use super::synchronizer::{GitFileSynchronizer, normalize_repo_path};

pub(crate) fn commit_message(path: &str) -> String {
    format!("Orgzly update: {}", path)
}

impl GitFileSynchronizer {
    /// Copy `source` over `path`, stage it and commit if the tree changed.
    ///
    /// Returns the new commit, or `None` when the content was already
    /// identical. Does not check cleanliness; public callers do.
    pub(crate) fn update_and_commit_file(&self, source: &Path, path: &str) -> Result<Option<Oid>> {
        let rel = normalize_repo_path(path)?;
        let dest = self.repo_path()?.join(&rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        // Copying a file onto itself would truncate it.
        let same_file = dest.exists() && fs::canonicalize(source)? == fs::canonicalize(&dest)?;
        if !same_file {
            fs::copy(source, &dest)?;
        }

        let mut index = self.repo.index()?;
        index.read(false)?;
        index.add_path(Path::new(&rel))?;
        index.write()?;
        let tree_id = index.write_tree()?;

        let parent = self.current_head()?;
        if let Some(p) = &parent
            && p.tree_id() == tree_id
        {
            debug!(path = %rel, "content unchanged, nothing to commit");
            return Ok(None);
        }

        let tree = self.repo.find_tree(tree_id)?;
        let sig = self.signature()?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        let oid = self.repo.commit(
            Some("HEAD"),
            &sig,
            &sig,
            &commit_message(&rel),
            &tree,
            &parents,
        )?;
        info!(path = %rel, commit = %oid, "committed update");
        Ok(Some(oid))
    }

    /// Create `path` with the content of `source` and commit it.
    ///
    /// # Errors
    /// [`SyncError::AlreadyExists`] if the path is already present.
    pub fn add_and_commit_new_file(&self, source: &Path, path: &str) -> Result<Option<Oid>> {
        self.ensure_clean()?;
        let dest = self.repo_directory_file(path)?;
        if dest.exists() {
            return Err(SyncError::AlreadyExists(path.to_string()));
        }
        self.update_and_commit_file(source, path)
    }

    /// Replace the content of an existing `path` and commit it.
    ///
    /// # Errors
    /// [`SyncError::NotFound`] if the path is absent.
    pub fn update_and_commit_existing_file(
        &self,
        source: &Path,
        path: &str,
    ) -> Result<Option<Oid>> {
        self.ensure_clean()?;
        let dest = self.repo_directory_file(path)?;
        if !dest.exists() {
            return Err(SyncError::NotFound(dest));
        }
        self.update_and_commit_file(source, path)
    }

    /// Commit `source` to `path` only if the path is still at
    /// `expected_revision` in HEAD.
    ///
    /// Returns `false` (without committing) when the base is stale; the
    /// caller is expected to fall back to
    /// [`update_and_commit_file_from_revision_and_merge`](Self::update_and_commit_file_from_revision_and_merge).
    pub fn update_and_commit_file_from_revision(
        &self,
        source: &Path,
        path: &str,
        expected_revision: Oid,
    ) -> Result<bool> {
        self.ensure_clean()?;
        let current = match self.current_head()? {
            Some(head) => self.file_revision(path, &head)?,
            None => None,
        };
        if current != Some(expected_revision) {
            debug!(
                path,
                expected = %expected_revision,
                current = ?current,
                "stale base revision"
            );
            return Ok(false);
        }
        self.update_and_commit_file(source, path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_message_names_the_path() {
        assert_eq!(commit_message("notes/a.org"), "Orgzly update: notes/a.org");
    }
}
