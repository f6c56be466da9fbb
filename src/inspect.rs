use anyhow::{Result, anyhow};
use std::path::Path;
use std::sync::Arc;

use crate::config::load_config;
use crate::git::TracingNotifier;
use crate::sync::job_for;

/// CLI command: print the revision information a later `commit --base`
/// needs for `path`.
///
/// Example output:
/// ```text
/// path:   notes/a.org
/// blob:   3b18e512dba79e4c8300dd08aeb37f8e728b8dad
/// commit: 9fceb02d0ae598e95dc970b74767f19372d61af8
/// head:   9fceb02d0ae598e95dc970b74767f19372d61af8
/// ```
pub fn cmd_revision(repo: &str, path: &str) -> Result<()> {
    let cfg = load_config()?;
    let job = job_for(&cfg, repo)?;
    let sync = job.open(Arc::new(TracingNotifier))?;

    let head = sync
        .current_head()?
        .ok_or_else(|| anyhow!("{} has no commits", job.display))?;
    let blob = sync
        .file_revision(path, &head)?
        .ok_or_else(|| anyhow!("{} is not tracked at {}", path, head.id()))?;
    let latest = sync.latest_commit_of_file(path)?;

    println!("path:   {}", path);
    println!("blob:   {}", blob);
    if let Some(c) = latest {
        println!("commit: {}", c.id());
    }
    println!("head:   {}", head.id());
    Ok(())
}

/// CLI command: copy the working-tree version of `path` to `dest`.
pub fn cmd_retrieve(repo: &str, path: &str, dest: &Path) -> Result<()> {
    let cfg = load_config()?;
    let job = job_for(&cfg, repo)?;
    let sync = job.open(Arc::new(TracingNotifier))?;
    sync.retrieve_latest_version_of_file(path, dest)?;
    Ok(())
}
