use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;

use crate::config::load_config;
use crate::git::{GitFileSynchronizer, Oid, TracingNotifier};
use crate::sync::job_for;

/// How `commit` treats an existing or missing destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// Create or update.
    Upsert,
    /// Fail if the path already exists.
    New,
    /// Fail if the path does not exist.
    Existing,
}

/// The version of a tracked file an edit was based on.
#[derive(Debug, Clone)]
pub struct BaseRevision {
    /// Blob id (or unambiguous prefix) of the file before the edit.
    pub file: String,
    /// Commit id (or prefix) the blob was read from.
    pub commit: String,
}

/// CLI command: commit `source` into the repository at `path`.
///
/// With a base revision, the commit is gated on the file still being at
/// that revision; otherwise it falls back to the branch-and-merge protocol.
/// An unreconcilable conflict is not an error: nothing is applied and the
/// next sync will retry.
pub fn cmd_commit(
    repo: &str,
    source: &Path,
    path: &str,
    mode: CommitMode,
    base: Option<BaseRevision>,
) -> Result<()> {
    if !source.is_file() {
        bail!("source file not found: {}", source.display());
    }
    let cfg = load_config()?;
    let job = job_for(&cfg, repo)?;
    let sync = job.open(Arc::new(TracingNotifier))?;

    if let Some(base) = base {
        let file_rev = resolve(&sync, &base.file)?;
        let commit = resolve(&sync, &base.commit)?;
        let applied = sync
            .update_and_commit_file_from_revision_and_merge(source, path, file_rev, commit)
            .with_context(|| format!("commit {} in {}", path, job.display))?;
        if applied {
            report(&sync, path)?;
        } else {
            println!("{}: no changes applied, will retry next sync", path);
        }
        return Ok(());
    }

    let committed = match mode {
        CommitMode::New => sync.add_and_commit_new_file(source, path),
        CommitMode::Existing => sync.update_and_commit_existing_file(source, path),
        CommitMode::Upsert => {
            if sync.repo_directory_file(path)?.exists() {
                sync.update_and_commit_existing_file(source, path)
            } else {
                sync.add_and_commit_new_file(source, path)
            }
        }
    }
    .with_context(|| format!("commit {} in {}", path, job.display))?;

    match committed {
        Some(_) => report(&sync, path)?,
        None => println!("{}: unchanged", path),
    }
    Ok(())
}

fn resolve(sync: &GitFileSynchronizer, rev: &str) -> Result<Oid> {
    let obj = sync
        .repository()
        .revparse_single(rev)
        .with_context(|| format!("unknown revision: {}", rev))?;
    Ok(obj.id())
}

fn report(sync: &GitFileSynchronizer, path: &str) -> Result<()> {
    if let Some(head) = sync.current_head()? {
        println!("{}: committed {}", path, head.id());
    }
    Ok(())
}
