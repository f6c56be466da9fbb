use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, RepoEntry};
use crate::git::{CredentialTransport, GitFileSynchronizer, Notifier, RepoSettings};

/// Everything needed to open one configured repository.
///
/// Jobs are plain data so they can be handed to worker threads; the
/// synchronizer itself is opened on the thread that uses it.
#[derive(Clone)]
pub struct SyncJob {
    pub display: String,
    pub worktree: PathBuf,
    pub settings: RepoSettings,
    pub transport: CredentialTransport,
}

impl SyncJob {
    pub fn new(cfg: &Config, entry: &RepoEntry) -> Self {
        SyncJob {
            display: entry.display(),
            worktree: entry.worktree(),
            settings: entry.settings(&cfg.author),
            transport: cfg.transport.transport(),
        }
    }

    pub fn open(&self, notifier: Arc<dyn Notifier>) -> Result<GitFileSynchronizer> {
        let sync = GitFileSynchronizer::open(&self.worktree, self.settings.clone())
            .with_context(|| format!("open {}", self.display))?
            .with_transport(Arc::new(self.transport.clone()))
            .with_notifier(notifier);
        Ok(sync)
    }
}

/// Build one job per `[[repos]]` entry, skipping entries without a path.
pub fn build_jobs(cfg: &Config) -> Vec<SyncJob> {
    cfg.repos
        .iter()
        .filter(|r| !r.path.as_os_str().is_empty())
        .map(|r| SyncJob::new(cfg, r))
        .collect()
}

/// Job for the repository selected by name or path on the command line.
pub fn job_for(cfg: &Config, key: &str) -> Result<SyncJob> {
    Ok(SyncJob::new(cfg, cfg.find_repo(key)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_jobs_skips_empty_paths() {
        let cfg = Config::from_toml(
            r#"
[[repos]]
name = "notes"
path = "/srv/notes"

[[repos]]
name = "broken"
path = ""
"#,
        )
        .unwrap();
        let jobs = build_jobs(&cfg);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].display, "notes");
        assert_eq!(jobs[0].settings.branch, "main");
    }

    #[test]
    fn job_for_unknown_repo_fails() {
        let cfg = Config::from_toml("").unwrap();
        assert!(job_for(&cfg, "notes").is_err());
    }
}
