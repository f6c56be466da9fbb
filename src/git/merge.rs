//! Merging with the remote and the branch-based conflict protocol.
//!
//! Conflicts never stay in the working tree: a conflicting merge is undone
//! and reported as `false`. Updates that raced with remote changes are
//! replayed on a disposable branch so the primary branch is never left
//! mid-conflict.

use chrono::{DateTime, Utc};
use git2::{Commit, ErrorCode, Oid, Reference, ResetType, build::CheckoutBuilder};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, error, info, warn};

use super::error::{Result, SyncError};
use super::synchronizer::{GitFileSynchronizer, MARKER_BRANCH};

static REF_UNSAFE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s~^:?*\[\\]|\.{2,}|@\{").unwrap());

/// Result of merging one commit into the current branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    UpToDate,
    FastForward,
    Merged(Oid),
    /// The merge could not be completed; the branch was reset to where it was.
    Conflicted,
}

impl MergeOutcome {
    pub fn is_successful(&self) -> bool {
        !matches!(self, MergeOutcome::Conflicted)
    }
}

/// Name of the disposable branch used to replay an update of `path`.
pub(crate) fn merge_branch_name(path: &str, short_hash: &str, now: DateTime<Utc>) -> String {
    let cleaned = REF_UNSAFE.replace_all(path.trim_matches('/'), "_");
    let cleaned = cleaned
        .split('/')
        .map(|part| {
            let part = part.strip_suffix(".lock").map_or(part.to_string(), |p| format!("{}_lock", p));
            match part.strip_prefix('.') {
                Some(rest) => format!("_{}", rest),
                None => part,
            }
        })
        .collect::<Vec<_>>()
        .join("/");
    let name = format!(
        "merge-{}-{}-{}",
        cleaned,
        short_hash,
        now.format("%Y-%m-%d_%H%M%S")
    );
    if Reference::is_valid_name(&format!("refs/heads/{}", name)) {
        return name;
    }
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn is_checkout_conflict(e: &git2::Error) -> bool {
    matches!(e.code(), ErrorCode::Conflict | ErrorCode::MergeConflict)
}

/// Disposable branch that is removed on every exit path.
///
/// Dropping it checks out the original branch and deletes the merge
/// branch. Failures are logged only, so they never mask the error that
/// caused the unwind.
struct MergeBranchScope<'a> {
    sync: &'a GitFileSynchronizer,
    original: &'a str,
    branch: &'a str,
}

impl Drop for MergeBranchScope<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.sync.checkout_branch(self.original) {
            warn!(branch = self.original, error = %e, "cleanup: failed to return to original branch");
        }
        if let Err(e) = self.sync.delete_branch(self.branch) {
            warn!(branch = self.branch, error = %e, "cleanup: failed to delete merge branch");
        }
    }
}

impl GitFileSynchronizer {
    /// Merge `target` into the current branch.
    ///
    /// Fast-forwards when possible and otherwise creates a merge commit.
    /// A conflicting merge (including a checkout that would overwrite
    /// local files) clears the merge state and hard-resets to the
    /// pre-merge commit.
    pub(crate) fn merge_commit(&self, target: &Commit<'_>) -> Result<MergeOutcome> {
        let annotated = self.repo.find_annotated_commit(target.id())?;
        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;
        let short = self.short_id(target.id());

        if analysis.is_up_to_date() {
            debug!(target = %short, "already up to date");
            return Ok(MergeOutcome::UpToDate);
        }

        if analysis.is_unborn() {
            let head_ref = self.current_full_branch()?;
            match self
                .repo
                .checkout_tree(target.as_object(), Some(CheckoutBuilder::new().safe()))
            {
                Err(e) if is_checkout_conflict(&e) => {
                    warn!(target = %short, error = %e, "checkout conflict on unborn branch");
                    return Ok(MergeOutcome::Conflicted);
                }
                r => r?,
            }
            self.repo
                .reference(&head_ref, target.id(), true, &format!("merge {}: initial", short))?;
            info!(branch = %head_ref, target = %short, "initialized branch from merge target");
            return Ok(MergeOutcome::FastForward);
        }

        let head = self.require_head()?;

        if analysis.is_fast_forward() {
            match self
                .repo
                .checkout_tree(target.as_object(), Some(CheckoutBuilder::new().safe()))
            {
                Err(e) if is_checkout_conflict(&e) => {
                    warn!(target = %short, error = %e, "checkout conflict during fast-forward");
                    self.reset_merge(&head)?;
                    return Ok(MergeOutcome::Conflicted);
                }
                r => r?,
            }
            let mut head_ref = self.repo.head()?;
            head_ref.set_target(target.id(), &format!("merge {}: Fast-forward", short))?;
            info!(from = %head.id(), to = %target.id(), "fast-forwarded");
            return Ok(MergeOutcome::FastForward);
        }

        match self.repo.merge(&[&annotated], None, None) {
            Ok(()) => {}
            Err(e) if is_checkout_conflict(&e) => {
                warn!(target = %short, error = %e, "checkout conflict during merge");
                self.reset_merge(&head)?;
                return Ok(MergeOutcome::Conflicted);
            }
            Err(e) => {
                if let Err(reset) = self.reset_merge(&head) {
                    warn!(error = %reset, "failed to reset after merge error");
                }
                return Err(e.into());
            }
        }

        let mut index = self.repo.index()?;
        if index.has_conflicts() {
            info!(head = %head.id(), target = %target.id(), "merge conflicts, resetting");
            self.reset_merge(&head)?;
            return Ok(MergeOutcome::Conflicted);
        }

        let tree = self.repo.find_tree(index.write_tree()?)?;
        let sig = self.signature()?;
        let message = format!("Merge {} into {}", short, self.current_branch()?);
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&head, target])?;
        self.repo.cleanup_state()?;
        info!(commit = %oid, head = %head.id(), target = %target.id(), "merged");
        Ok(MergeOutcome::Merged(oid))
    }

    /// Drop `MERGE_HEAD`/`MERGE_MSG` and hard-reset to `pre_merge`.
    fn reset_merge(&self, pre_merge: &Commit<'_>) -> Result<()> {
        self.repo.cleanup_state()?;
        self.repo
            .reset(pre_merge.as_object(), ResetType::Hard, None)?;
        Ok(())
    }

    /// Fetch and merge the remote-tracking branch of the current branch.
    ///
    /// Returns `false` if the merge conflicted (the repository is left
    /// clean at its previous head). A missing remote branch leaves nothing
    /// to merge and counts as success.
    pub fn merge_with_remote(&self) -> Result<bool> {
        self.ensure_clean()?;
        let branch = self.require_branch()?;
        self.fetch()?;
        let Some(target) = self.remote_tracking_commit(&branch)? else {
            debug!(%branch, "no remote-tracking branch to merge");
            return Ok(true);
        };
        Ok(self.merge_commit(&target)?.is_successful())
    }

    /// Point the marker branch at the current head.
    fn set_marker_branch(&self) -> Result<()> {
        let Some(head) = self.current_head()? else {
            debug!("empty repository, no marker to set");
            return Ok(());
        };
        self.repo
            .branch(MARKER_BRANCH, &head, true)
            .map_err(|source| SyncError::MarkerBranch {
                branch: MARKER_BRANCH.to_string(),
                source,
            })?;
        debug!(commit = %head.id(), "marker branch set");
        Ok(())
    }

    /// Start of a sync session: record the marker, fetch, and bring the
    /// current branch up to date with its remote.
    ///
    /// A remote with no branches at all is bootstrapped by pushing the
    /// local branch.
    ///
    /// # Errors
    /// [`SyncError::MergeFailed`] if the remote head cannot be merged.
    /// [`SyncError::DetachedHead`] if HEAD is not on a branch; nothing is
    /// changed then.
    pub fn set_branch_and_get_latest(&self) -> Result<()> {
        self.ensure_clean()?;
        let branch = self.require_branch()?;
        self.set_marker_branch()?;
        self.fetch()?;

        let local = self.current_head()?.map(|c| c.id());
        match self.remote_tracking_commit(&branch)? {
            Some(target) => {
                if !self.merge_commit(&target)?.is_successful() {
                    let local = local.map(|id| id.to_string()).unwrap_or_default();
                    error!(%branch, %local, remote = %target.id(), "failed to merge remote head");
                    return Err(SyncError::MergeFailed {
                        local,
                        remote: target.id().to_string(),
                    });
                }
                if self.current_branch()? != self.settings.branch
                    && !self.attempt_return_to_main_branch()?
                {
                    info!(%branch, primary = %self.settings.branch, "staying on non-primary branch");
                }
            }
            None => {
                if self.remote_branches()?.is_empty() && local.is_some() {
                    info!(remote = %self.settings.remote, "remote is empty, pushing local state");
                    self.push()?;
                }
            }
        }
        Ok(())
    }

    /// Commit an update made against an older revision of `path`.
    ///
    /// Tries a direct revision-gated commit first. If the base is stale,
    /// the update is committed on a disposable branch started at the
    /// marker branch (or at `revision` when there is no marker), that
    /// branch is merged with the current head, and the result is merged
    /// back into the original branch.
    ///
    /// Returns `false` if the histories conflict; the repository is then
    /// clean, on the original branch, and the update is not applied.
    ///
    /// # Errors
    /// [`SyncError::BranchCreationFailed`], [`SyncError::RevisionMismatch`]
    /// and [`SyncError::UnexpectedMergeFailure`] signal violated invariants.
    /// [`SyncError::DetachedHead`] if there is no branch to return to.
    pub fn update_and_commit_file_from_revision_and_merge(
        &self,
        source: &Path,
        path: &str,
        file_revision: Oid,
        revision: Oid,
    ) -> Result<bool> {
        self.ensure_clean()?;
        self.require_branch()?;
        if self.update_and_commit_file_from_revision(source, path, file_revision)? {
            return Ok(true);
        }

        let original = self.current_full_branch()?;
        let merge_branch = merge_branch_name(path, &self.short_id(file_revision), Utc::now());
        if let Err(e) = self.delete_branch(&merge_branch) {
            debug!(branch = %merge_branch, error = %e, "no stale merge branch removed");
        }

        let Some(merge_target) = self.current_head()? else {
            warn!(path, "stale base in an empty repository");
            return Ok(false);
        };
        let start = match self.get_commit(MARKER_BRANCH)? {
            Some(marker) => marker,
            None => self.repo.find_commit(revision)?,
        };

        let _scope = MergeBranchScope {
            sync: self,
            original: &original,
            branch: &merge_branch,
        };

        self.create_branch_and_checkout(&merge_branch, &start)?;
        let head = self.current_head()?.map(|c| c.id());
        if head != Some(start.id()) {
            let actual = head.map(|id| id.to_string()).unwrap_or_default();
            error!(branch = %merge_branch, expected = %start.id(), %actual, "branch landed elsewhere");
            return Err(SyncError::BranchCreationFailed {
                branch: merge_branch.clone(),
                expected: start.id().to_string(),
                actual,
            });
        }

        if !self.update_and_commit_file_from_revision(source, path, file_revision)? {
            error!(
                path,
                %file_revision,
                commit = %start.id(),
                branch = %merge_branch,
                "file revision does not match the start commit"
            );
            return Err(SyncError::RevisionMismatch {
                path: path.to_string(),
                file_revision: file_revision.to_string(),
                commit: start.id().to_string(),
            });
        }

        if !self.merge_commit(&merge_target)?.is_successful() {
            info!(path, branch = %merge_branch, "update conflicts with current head, not applied");
            return Ok(false);
        }

        let merged = self.require_head()?;
        self.checkout_branch(&original)?;
        if !self.merge_commit(&merged)?.is_successful() {
            error!(
                from = %merge_branch,
                into = %original,
                merged = %merged.id(),
                target = %merge_target.id(),
                "merge back into original branch failed"
            );
            return Err(SyncError::UnexpectedMergeFailure {
                from: merge_branch.clone(),
                into: original.clone(),
            });
        }
        info!(path, branch = %original, "update reconciled");
        Ok(true)
    }

    /// Try to get from a non-primary branch back onto the primary one.
    ///
    /// Merges the remote primary head into the current branch, then merges
    /// the current branch into the primary branch and deletes it. On any
    /// failure the current branch is checked out again and `false` is
    /// returned.
    pub fn attempt_return_to_main_branch(&self) -> Result<bool> {
        self.ensure_clean()?;
        let original = self.require_branch()?;
        let primary = self.settings.branch.clone();

        let attempt = || -> Result<bool> {
            if let Some(target) = self.remote_tracking_commit(&primary)?
                && !self.merge_commit(&target)?.is_successful()
            {
                return Ok(false);
            }
            let merged = self.require_head()?;
            self.switch_to_primary()?;
            if !self.merge_commit(&merged)?.is_successful() {
                return Ok(false);
            }
            self.delete_branch(&original)?;
            Ok(true)
        };

        let back = match attempt() {
            Ok(back) => back,
            Err(e) => {
                warn!(branch = %original, %primary, error = %e, "return to primary branch failed");
                false
            }
        };
        if back {
            info!(from = %original, to = %primary, "returned to primary branch");
        } else {
            self.checkout_branch(&original)?;
        }
        Ok(back)
    }
}
