use git2::{BranchType, FetchOptions, FetchPrune, PushOptions, RemoteCallbacks, Repository};
use std::cell::RefCell;
use std::path::Path;
use std::sync::{Arc, mpsc};
use std::thread;
use tracing::{debug, info, warn};

use super::error::{Result, SyncError};
use super::notify::Notifier;
use super::synchronizer::GitFileSynchronizer;
use super::transport::TransportSetter;

/// What the remote said about a push that did not fail outright.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushOutcome {
    /// Informational lines sent by the remote (`remote: ...`).
    pub messages: Vec<String>,
    /// Refs the remote refused, with the reason it gave.
    pub rejected: Vec<(String, String)>,
}

impl PushOutcome {
    pub fn is_rejected(&self) -> bool {
        !self.rejected.is_empty()
    }

    /// Everything worth showing to the user, one line per message.
    pub fn diagnostics(&self) -> String {
        let mut lines = self.messages.clone();
        lines.extend(
            self.rejected
                .iter()
                .map(|(r, why)| format!("{} rejected: {}", r, why)),
        );
        lines.join("\n")
    }
}

impl GitFileSynchronizer {
    fn network_error(&self, op: &'static str, e: impl ToString) -> SyncError {
        SyncError::NetworkOrAuth {
            op,
            remote: self.settings.remote.clone(),
            message: e.to_string(),
        }
    }

    /// Fetch all branches from the configured remote, pruning
    /// remote-tracking refs that no longer exist there.
    ///
    /// # Errors
    /// [`SyncError::NetworkOrAuth`] on transport or authentication failure.
    pub fn fetch(&self) -> Result<()> {
        let remote_name = self.settings.remote.clone();
        let mut remote = self
            .repo
            .find_remote(&remote_name)
            .map_err(|e| self.network_error("fetch", e))?;

        let mut cb = RemoteCallbacks::new();
        self.transport.set_transport(&mut cb);
        let mut fo = FetchOptions::new();
        fo.remote_callbacks(cb).prune(FetchPrune::On);

        let refspec = format!("+refs/heads/*:refs/remotes/{}/*", remote_name);
        remote
            .fetch(&[refspec.as_str()], Some(&mut fo), None)
            .map_err(|e| self.network_error("fetch", e))?;
        debug!(remote = %remote_name, "fetched");
        Ok(())
    }

    /// Short names (`<branch>`) of the remote-tracking branches of the
    /// configured remote.
    pub fn remote_branches(&self) -> Result<Vec<String>> {
        let prefix = format!("{}/", self.settings.remote);
        let mut out = Vec::new();
        for item in self.repo.branches(Some(BranchType::Remote))? {
            let (branch, _) = item?;
            let Some(name) = branch.name()? else {
                continue;
            };
            if let Some(short) = name.strip_prefix(&prefix)
                && short != "HEAD"
            {
                out.push(short.to_string());
            }
        }
        Ok(out)
    }

    /// Whether `<remote>/<branch>` exists as a remote-tracking branch.
    pub fn remote_branch_exists(&self, branch: &str) -> Result<bool> {
        Ok(self.remote_branches()?.iter().any(|b| b == branch))
    }

    /// Push the current branch to the configured remote.
    ///
    /// The push runs on a dedicated thread with its own repository handle;
    /// this call blocks until it reports back. Diagnostics sent by the
    /// remote are forwarded to the notifier even when the push succeeded.
    ///
    /// # Errors
    /// [`SyncError::NetworkOrAuth`] if the push failed or a ref was rejected.
    /// [`SyncError::DetachedHead`] if there is no branch to push.
    pub fn push(&self) -> Result<PushOutcome> {
        let branch = self.require_branch()?;
        let git_dir = self.repo.path().to_path_buf();
        let remote_name = self.settings.remote.clone();
        let transport = Arc::clone(&self.transport);

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("git-push".into())
            .spawn(move || {
                let res = push_branch(&git_dir, &remote_name, &branch, transport.as_ref());
                let _ = tx.send(res);
            })?;

        let res = rx
            .recv()
            .unwrap_or_else(|_| Err(git2::Error::from_str("push worker exited without result")));

        let outcome = settle_push(self.notifier.as_ref(), res)
            .map_err(|message| self.network_error("push", message))?;
        info!(remote = %self.settings.remote, "pushed");
        Ok(outcome)
    }

    /// Push only if the current branch's head differs from its
    /// remote-tracking head. Returns whether a push happened.
    ///
    /// This is the single push call site of a sync cycle, so a cycle that
    /// touched many files still pushes at most once.
    pub fn try_push_if_head_differs_from_remote(&self) -> Result<bool> {
        let Some(local) = self.current_head()? else {
            debug!("nothing to push from an empty repository");
            return Ok(false);
        };
        let branch = self.require_branch()?;
        let remote = self.remote_tracking_commit(&branch)?;
        if remote.as_ref().map(|c| c.id()) == Some(local.id()) {
            debug!(%branch, head = %local.id(), "head matches remote, skipping push");
            return Ok(false);
        }
        self.push()?;
        Ok(true)
    }
}

/// Tell the user what came back from a push.
///
/// Remote messages are forwarded even when the push succeeded. Returns the
/// failure text when the push failed or a ref was rejected.
fn settle_push(
    notifier: &dyn Notifier,
    res: std::result::Result<PushOutcome, git2::Error>,
) -> std::result::Result<PushOutcome, String> {
    match res {
        Ok(outcome) => {
            if outcome.is_rejected() || !outcome.messages.is_empty() {
                notifier.notify(&outcome.diagnostics());
            }
            if outcome.is_rejected() {
                return Err(outcome.diagnostics());
            }
            Ok(outcome)
        }
        Err(e) => {
            notifier.notify(&format!("Failed to push to remote: {}", e.message()));
            Err(e.message().to_string())
        }
    }
}

fn push_branch(
    git_dir: &Path,
    remote_name: &str,
    branch: &str,
    transport: &dyn TransportSetter,
) -> std::result::Result<PushOutcome, git2::Error> {
    let repo = Repository::open(git_dir)?;
    let mut remote = repo.find_remote(remote_name)?;

    let messages = RefCell::new(Vec::new());
    let rejected = RefCell::new(Vec::new());
    {
        let mut cb = RemoteCallbacks::new();
        transport.set_transport(&mut cb);
        cb.sideband_progress(|data| {
            let text = String::from_utf8_lossy(data);
            messages.borrow_mut().extend(
                text.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string),
            );
            true
        });
        cb.push_update_reference(|refname, status| {
            if let Some(why) = status {
                warn!(refname, why, "remote rejected ref");
                rejected
                    .borrow_mut()
                    .push((refname.to_string(), why.to_string()));
            }
            Ok(())
        });

        let mut po = PushOptions::new();
        po.remote_callbacks(cb);
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch);
        remote.push(&[refspec.as_str()], Some(&mut po))?;
    }

    Ok(PushOutcome {
        messages: messages.into_inner(),
        rejected: rejected.into_inner(),
    })
}
