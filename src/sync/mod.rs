mod jobs;
mod progress;

use anyhow::{Result, anyhow};
use indicatif::{MultiProgress, ProgressBar};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::load_config;
use crate::git::{Notifier, TracingNotifier};

pub use jobs::{SyncJob, build_jobs, job_for};
use progress::{ProgressNotifier, err_style, ok_style, spinner_style, warn_style};

/// Synchronize every repository defined in `config.toml`.
///
/// High-level flow, per repository and **in parallel** (each repository
/// has its own handle, so sessions never share a working tree):
/// 1. Record the marker branch, fetch, and merge the remote head
///    (see [`GitFileSynchronizer::set_branch_and_get_latest`]).
/// 2. Push once if the local head differs from the remote head.
///
/// Each job gets its own spinner. Errors are shown on the job's line;
/// processing continues for the rest, and the command fails at the end if
/// any repository failed.
///
/// [`GitFileSynchronizer::set_branch_and_get_latest`]: crate::git::GitFileSynchronizer::set_branch_and_get_latest
pub fn cmd_sync() -> Result<()> {
    let cfg = load_config()?;
    let jobs = build_jobs(&cfg);
    if jobs.is_empty() {
        eprintln!("no repositories in config");
        return Ok(());
    }

    let mp = MultiProgress::new();
    let mut bars: Vec<ProgressBar> = Vec::with_capacity(jobs.len());
    for j in &jobs {
        let pb = mp.add(ProgressBar::new_spinner());
        pb.set_style(spinner_style());
        pb.set_message(format!("syncing {}", j.display));
        pb.enable_steady_tick(Duration::from_millis(80));
        bars.push(pb);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get().min(jobs.len()).max(1))
        .build()?;

    let failures: usize = pool.install(|| {
        jobs.par_iter()
            .enumerate()
            .map(|(idx, job)| {
                let pb = &bars[idx];
                let notifier = Arc::new(ProgressNotifier {
                    display: job.display.clone(),
                    pb: pb.clone(),
                });
                match sync_one(job, pb, notifier) {
                    Ok(summary) => {
                        pb.set_style(ok_style());
                        pb.finish_with_message(format!("{} ({})", job.display, summary));
                        0
                    }
                    Err(e) => {
                        error!(repo = %job.display, "sync failed: {:#}", e);
                        pb.set_style(err_style());
                        pb.finish_with_message(format!("{} (error: {:#})", job.display, e));
                        1
                    }
                }
            })
            .sum()
    });

    if failures > 0 {
        return Err(anyhow!("{} of {} repositories failed to sync", failures, jobs.len()));
    }
    Ok(())
}

fn sync_one(job: &SyncJob, pb: &ProgressBar, notifier: Arc<dyn Notifier>) -> Result<&'static str> {
    let sync = job.open(notifier)?;
    pb.set_message(format!("fetching {}", job.display));
    sync.set_branch_and_get_latest()?;
    pb.set_message(format!("pushing {}", job.display));
    let pushed = sync.try_push_if_head_differs_from_remote()?;
    info!(repo = %job.display, pushed, "synchronized");
    Ok(if pushed { "pushed" } else { "up to date" })
}

/// Fetch and merge the remote head of one repository.
pub fn cmd_merge(repo: &str) -> Result<()> {
    let cfg = load_config()?;
    let job = job_for(&cfg, repo)?;
    let sync = job.open(Arc::new(TracingNotifier))?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb.set_message(format!("merging {}", job.display));

    if sync.merge_with_remote()? {
        pb.set_style(ok_style());
        pb.finish_with_message(format!("{} merged with {}", job.display, job.settings.remote));
    } else {
        pb.set_style(warn_style());
        pb.finish_with_message(format!(
            "{}: conflicts with {}, no changes applied, will retry next sync",
            job.display, job.settings.remote
        ));
    }
    Ok(())
}

/// Push one repository if its head differs from the remote head.
pub fn cmd_push(repo: &str) -> Result<()> {
    let cfg = load_config()?;
    let job = job_for(&cfg, repo)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb.set_message(format!("pushing {}", job.display));

    let notifier = Arc::new(ProgressNotifier {
        display: job.display.clone(),
        pb: pb.clone(),
    });
    let sync = job.open(notifier)?;
    match sync.try_push_if_head_differs_from_remote() {
        Ok(true) => {
            pb.set_style(ok_style());
            pb.finish_with_message(format!("{} pushed", job.display));
        }
        Ok(false) => {
            pb.set_style(ok_style());
            pb.finish_with_message(format!("{} already up to date", job.display));
        }
        Err(e) => {
            pb.set_style(err_style());
            pb.finish_with_message(format!("{} (error: {})", job.display, e));
            return Err(e.into());
        }
    }
    Ok(())
}
