use git2::{
    BranchType, Commit, ErrorCode, ObjectType, Oid, Repository, Signature, Sort,
    build::CheckoutBuilder,
};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::{Result, SyncError};
use super::notify::{Notifier, TracingNotifier};
use super::transport::{NoCredentials, TransportSetter};

/// Bookkeeping branch pointing at the last known-good synchronization point.
pub const MARKER_BRANCH: &str = "orgzly-pre-sync-marker";

const DEFAULT_AUTHOR_NAME: &str = "orgsync";
const DEFAULT_AUTHOR_EMAIL: &str = "orgsync@localhost";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

/// Per-repository settings supplied by the caller.
#[derive(Debug, Clone)]
pub struct RepoSettings {
    /// Remote to fetch from and push to.
    pub remote: String,
    /// Primary branch the session should end up on.
    pub branch: String,
    /// Commit author. Falls back to the repository's `user.*` config.
    pub author: Option<Author>,
}

impl RepoSettings {
    pub fn new(remote: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            branch: branch.into(),
            author: None,
        }
    }
}

/// Keeps tracked files of one local repository in sync with its remote.
///
/// Operations assume exclusive access to the repository: the working tree
/// is shared mutable state and nothing here locks it. Independent
/// repositories can be synchronized in parallel from separate handles.
pub struct GitFileSynchronizer {
    pub(crate) repo: Repository,
    pub(crate) settings: RepoSettings,
    pub(crate) transport: Arc<dyn TransportSetter>,
    pub(crate) notifier: Arc<dyn Notifier>,
}

impl GitFileSynchronizer {
    /// Open an existing non-bare repository.
    pub fn open(path: &Path, settings: RepoSettings) -> Result<Self> {
        let repo =
            Repository::open(path).map_err(|e| SyncError::OpenRepo(path.to_path_buf(), e))?;
        Self::from_repository(repo, settings)
    }

    pub fn from_repository(repo: Repository, settings: RepoSettings) -> Result<Self> {
        if repo.is_bare() {
            return Err(SyncError::Bare(repo.path().to_path_buf()));
        }
        Ok(Self {
            repo,
            settings,
            transport: Arc::new(NoCredentials),
            notifier: Arc::new(TracingNotifier),
        })
    }

    pub fn with_transport(mut self, transport: Arc<dyn TransportSetter>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn settings(&self) -> &RepoSettings {
        &self.settings
    }

    /// Root of the working tree.
    pub fn repo_path(&self) -> Result<&Path> {
        self.repo
            .workdir()
            .ok_or_else(|| SyncError::Bare(self.repo.path().to_path_buf()))
    }

    /// Location of a tracked path inside the working tree.
    pub fn repo_directory_file(&self, path: &str) -> Result<PathBuf> {
        let rel = normalize_repo_path(path)?;
        Ok(self.repo_path()?.join(rel))
    }

    pub fn is_empty_repo(&self) -> Result<bool> {
        Ok(self.current_head()?.is_none())
    }

    pub fn current_head(&self) -> Result<Option<Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?)),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Full name of the branch HEAD points to (`refs/heads/<name>`), also
    /// on an unborn branch. A detached HEAD yields the commit id.
    pub fn current_full_branch(&self) -> Result<String> {
        let head = self.repo.find_reference("HEAD")?;
        if let Some(target) = head.symbolic_target() {
            return Ok(target.to_string());
        }
        Ok(head
            .target()
            .map(|oid| oid.to_string())
            .unwrap_or_else(|| "HEAD".to_string()))
    }

    /// Short name of the branch HEAD is attached to.
    ///
    /// # Errors
    /// [`SyncError::DetachedHead`] when HEAD points directly at a commit.
    pub(crate) fn require_branch(&self) -> Result<String> {
        let full = self.current_full_branch()?;
        match full.strip_prefix("refs/heads/") {
            Some(branch) => Ok(branch.to_string()),
            None => Err(SyncError::DetachedHead(self.repo_path()?.to_path_buf())),
        }
    }

    /// Short name of the current branch.
    pub fn current_branch(&self) -> Result<String> {
        let full = self.current_full_branch()?;
        Ok(full
            .strip_prefix("refs/heads/")
            .map(str::to_string)
            .unwrap_or(full))
    }

    /// Resolve a branch or ref name using git's short-name rules
    /// (`orgzly-pre-sync-marker`, `origin/main`, `HEAD`, ...).
    pub fn get_commit(&self, name: &str) -> Result<Option<Commit<'_>>> {
        if self.is_empty_repo()? {
            return Ok(None);
        }
        match self.repo.resolve_reference_from_short_name(name) {
            Ok(r) => Ok(Some(r.peel_to_commit()?)),
            Err(e) if is_missing(&e) || e.code() == ErrorCode::InvalidSpec => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Head of `refs/remotes/<remote>/<branch>`, if it exists locally.
    pub fn remote_tracking_commit(&self, branch: &str) -> Result<Option<Commit<'_>>> {
        let name = format!("refs/remotes/{}/{}", self.settings.remote, branch);
        match self.repo.find_reference(&name) {
            Ok(r) => Ok(Some(r.peel_to_commit()?)),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Blob id of `path` in the tree of `commit`, or `None` when absent.
    pub fn file_revision(&self, path: &str, commit: &Commit<'_>) -> Result<Option<Oid>> {
        let rel = normalize_repo_path(path)?;
        match commit.tree()?.get_path(Path::new(&rel)) {
            Ok(entry) => Ok(Some(entry.id())),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn file_matches_in_revisions(
        &self,
        path: &str,
        start: &Commit<'_>,
        end: &Commit<'_>,
    ) -> Result<bool> {
        Ok(self.file_revision(path, start)? == self.file_revision(path, end)?)
    }

    /// Newest commit reachable from HEAD that changed `path`.
    ///
    /// A commit changed the path when its blob differs from the blob in
    /// every parent (or the path is new in a root commit).
    pub fn latest_commit_of_file(&self, path: &str) -> Result<Option<Commit<'_>>> {
        if self.is_empty_repo()? {
            return Ok(None);
        }
        let mut walk = self.repo.revwalk()?;
        walk.push_head()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

        for oid in walk {
            let commit = self.repo.find_commit(oid?)?;
            let Some(rev) = self.file_revision(path, &commit)? else {
                continue;
            };
            let mut touched = true;
            for parent in commit.parents() {
                if self.file_revision(path, &parent)? == Some(rev) {
                    touched = false;
                    break;
                }
            }
            if touched {
                return Ok(Some(commit));
            }
        }
        Ok(None)
    }

    /// Copy the working-tree version of `path` to `destination`.
    pub fn retrieve_latest_version_of_file(&self, path: &str, destination: &Path) -> Result<()> {
        let src = self.repo_directory_file(path)?;
        if !src.exists() {
            return Err(SyncError::NotFound(src));
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&src, destination)?;
        Ok(())
    }

    pub(crate) fn require_head(&self) -> Result<Commit<'_>> {
        self.current_head()?
            .ok_or_else(|| SyncError::Git(git2::Error::from_str("repository has no commits")))
    }

    /// Checkout the configured primary branch.
    ///
    /// If it only exists as a remote-tracking branch, a local branch is
    /// created there with its upstream set.
    ///
    /// # Errors
    /// [`SyncError::DirtyRepository`] if the working tree has uncommitted
    /// changes; no ref is touched in that case.
    pub fn checkout_selected(&self) -> Result<()> {
        self.ensure_clean()?;
        self.switch_to_primary()
    }

    /// [`checkout_selected`](Self::checkout_selected) for callers that
    /// already checked the working tree.
    pub(crate) fn switch_to_primary(&self) -> Result<()> {
        let branch = self.settings.branch.clone();
        let missing = match self.repo.find_branch(&branch, BranchType::Local) {
            Ok(_) => false,
            Err(e) if is_missing(&e) => true,
            Err(e) => return Err(e.into()),
        };
        if missing && let Some(remote_tip) = self.remote_tracking_commit(&branch)? {
            let mut b = self.repo.branch(&branch, &remote_tip, false)?;
            b.set_upstream(Some(&format!("{}/{}", self.settings.remote, branch)))?;
            info!(%branch, "created local branch from remote");
        }
        self.checkout_branch(&branch)
    }

    /// Attach HEAD to a local branch and update the working tree.
    ///
    /// `name` may be short (`main`) or full (`refs/heads/main`). The
    /// checkout is safe: local modifications are never overwritten.
    pub(crate) fn checkout_branch(&self, name: &str) -> Result<()> {
        let full = if name.starts_with("refs/") {
            name.to_string()
        } else {
            format!("refs/heads/{}", name)
        };
        let wrap = |source: git2::Error| SyncError::Checkout {
            branch: full.clone(),
            source,
        };
        let target = self
            .repo
            .find_reference(&full)
            .and_then(|r| r.peel(ObjectType::Commit))
            .map_err(wrap)?;
        self.repo
            .checkout_tree(&target, Some(CheckoutBuilder::new().safe()))
            .map_err(wrap)?;
        self.repo.set_head(&full).map_err(wrap)?;
        debug!(branch = %full, "checked out");
        Ok(())
    }

    /// Create (or move) branch `name` to `start` and check it out, forcing
    /// the working tree to match `start` exactly.
    pub(crate) fn create_branch_and_checkout(&self, name: &str, start: &Commit<'_>) -> Result<()> {
        let branch = self.repo.branch(name, start, true)?;
        let full = branch
            .get()
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("refs/heads/{}", name));
        self.repo
            .checkout_tree(start.as_object(), Some(CheckoutBuilder::new().force()))?;
        self.repo.set_head(&full)?;
        info!(branch = name, start = %start.id(), "created branch");
        Ok(())
    }

    /// Delete a local branch. A missing branch is not an error.
    pub(crate) fn delete_branch(&self, name: &str) -> Result<()> {
        let short = name.strip_prefix("refs/heads/").unwrap_or(name);
        match self.repo.find_branch(short, BranchType::Local) {
            Ok(mut b) => {
                b.delete()?;
                debug!(branch = short, "deleted branch");
                Ok(())
            }
            Err(e) if is_missing(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn signature(&self) -> Result<Signature<'static>> {
        if let Some(a) = &self.settings.author {
            return Ok(Signature::now(&a.name, &a.email)?);
        }
        match self.repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Ok(Signature::now(DEFAULT_AUTHOR_NAME, DEFAULT_AUTHOR_EMAIL)?),
        }
    }

    /// Abbreviated object id, falling back to the full hash.
    pub(crate) fn short_id(&self, oid: Oid) -> String {
        let short = self
            .repo
            .find_object(oid, None)
            .and_then(|o| o.short_id())
            .ok()
            .and_then(|buf| buf.as_str().map(str::to_string));
        match short {
            Some(s) => s,
            None => {
                warn!(%oid, "error while abbreviating hash, falling back to full hash");
                oid.to_string()
            }
        }
    }
}

pub(crate) fn is_missing(e: &git2::Error) -> bool {
    matches!(e.code(), ErrorCode::NotFound | ErrorCode::UnbornBranch)
}

/// Normalize a tracked path to a relative, `/`-separated form.
///
/// A leading `/` is dropped. Parent components are rejected so a path can
/// never escape the working tree.
pub(crate) fn normalize_repo_path(path: &str) -> Result<String> {
    let trimmed = path.trim_start_matches('/');
    let mut parts = Vec::new();
    for c in Path::new(trimmed).components() {
        match c {
            Component::Normal(s) => match s.to_str() {
                Some(".git") if parts.is_empty() => {
                    return Err(SyncError::InvalidPath(path.to_string()));
                }
                Some(s) => parts.push(s),
                None => return Err(SyncError::InvalidPath(path.to_string())),
            },
            Component::CurDir => {}
            _ => return Err(SyncError::InvalidPath(path.to_string())),
        }
    }
    if parts.is_empty() {
        return Err(SyncError::InvalidPath(path.to_string()));
    }
    Ok(parts.join("/"))
}
