use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;

use crate::config::load_config;
use crate::git::TracingNotifier;
use crate::sync::build_jobs;

/// CLI command: print configured repositories with their current state.
///
/// Example output:
/// ```text
/// - notes (/home/me/notes) [origin/main] on main, clean
/// - work (/home/me/work) [origin/main] on merge-x, dirty
/// - old (/home/me/old) [origin/main] error: failed to open repository ...
/// ```
///
/// # Errors
/// - Returns an error if `config.toml` cannot be loaded or parsed.
pub fn cmd_list() -> Result<()> {
    let cfg = load_config()?;
    for job in build_jobs(&cfg) {
        let head = format!(
            "- {} ({}) [{}/{}]",
            job.display.bold(),
            job.worktree.display(),
            job.settings.remote,
            job.settings.branch
        );
        let state = job
            .open(Arc::new(TracingNotifier))
            .and_then(|sync| Ok((sync.current_branch()?, sync.is_clean()?)));
        match state {
            Ok((branch, true)) => println!("{} on {}, {}", head, branch, "clean".green()),
            Ok((branch, false)) => println!("{} on {}, {}", head, branch, "dirty".yellow()),
            Err(e) => println!("{} {}", head, format!("error: {:#}", e).red()),
        }
    }
    Ok(())
}
