#![allow(dead_code)]

use git2::{BranchType, Oid, Repository, RepositoryInitOptions, Signature};
use orgsync::git::{GitFileSynchronizer, Notifier, RepoSettings};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const TEN_LINES: &str = "l1\nl2\nl3\nl4\nl5\nl6\nl7\nl8\nl9\nl10\n";

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

/// A bare "remote" and a local clone wired to it as `origin`, both on `main`.
pub struct Fixture {
    pub dir: TempDir,
    pub remote: PathBuf,
    pub local: PathBuf,
    pub notifier: Arc<RecordingNotifier>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let remote = dir.path().join("remote.git");
        let local = dir.path().join("local");
        init_bare(&remote);
        let repo = init_repo(&local);
        repo.remote("origin", remote.to_str().unwrap()).unwrap();
        Fixture {
            dir,
            remote,
            local,
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    /// Fixture whose local and remote `main` both hold one commit with
    /// `path` set to `content`. Returns the commit.
    pub fn seeded(path: &str, content: &str) -> (Self, Oid) {
        let fx = Fixture::new();
        let repo = Repository::open(&fx.local).unwrap();
        let oid = commit_file(&repo, path, content);
        push_main(&repo);
        (fx, oid)
    }

    pub fn sync(&self) -> GitFileSynchronizer {
        GitFileSynchronizer::open(&self.local, RepoSettings::new("origin", "main"))
            .unwrap()
            .with_notifier(self.notifier.clone())
    }

    /// Another working copy of the remote, standing in for a second device.
    pub fn other(&self, name: &str) -> Repository {
        let dest = self.dir.path().join(name);
        let repo = Repository::clone(self.remote.to_str().unwrap(), &dest).unwrap();
        configure(&repo);
        repo
    }

    /// Write `content` to a file outside every repository.
    pub fn source(&self, name: &str, content: &str) -> PathBuf {
        let p = self.dir.path().join(name);
        fs::write(&p, content).unwrap();
        p
    }

    pub fn remote_head(&self) -> Option<Oid> {
        let remote = Repository::open_bare(&self.remote).unwrap();
        remote
            .find_reference("refs/heads/main")
            .ok()
            .and_then(|r| r.target())
    }
}

pub fn init_bare(path: &Path) -> Repository {
    let mut opts = RepositoryInitOptions::new();
    opts.bare(true).initial_head("main");
    Repository::init_opts(path, &opts).unwrap()
}

pub fn init_repo(path: &Path) -> Repository {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = Repository::init_opts(path, &opts).unwrap();
    configure(&repo);
    repo
}

fn configure(repo: &Repository) {
    let mut cfg = repo.config().unwrap();
    cfg.set_str("user.name", "Test").unwrap();
    cfg.set_str("user.email", "test@test.com").unwrap();
}

/// Write `content` to `path` in the working tree and commit it on HEAD.
pub fn commit_file(repo: &Repository, path: &str, content: &str) -> Oid {
    let workdir = repo.workdir().unwrap();
    let full = workdir.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(&full, content).unwrap();

    let mut index = repo.index().unwrap();
    index.read(false).unwrap();
    index.add_path(Path::new(path)).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("Test", "test@test.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<_> = parent.iter().collect();
    repo.commit(
        Some("HEAD"),
        &sig,
        &sig,
        &format!("edit {}", path),
        &tree,
        &parents,
    )
    .unwrap()
}

pub fn push_main(repo: &Repository) {
    let mut remote = repo.find_remote("origin").unwrap();
    remote
        .push(&["refs/heads/main:refs/heads/main"], None)
        .unwrap();
    remote
        .fetch(&["+refs/heads/*:refs/remotes/origin/*"], None, None)
        .unwrap();
}

pub fn head_id(repo: &Repository) -> Oid {
    repo.head().unwrap().target().unwrap()
}

pub fn blob_of(repo: &Repository, commit: Oid, path: &str) -> Oid {
    repo.find_commit(commit)
        .unwrap()
        .tree()
        .unwrap()
        .get_path(Path::new(path))
        .unwrap()
        .id()
}

pub fn read(repo: &Repository, path: &str) -> String {
    fs::read_to_string(repo.workdir().unwrap().join(path)).unwrap()
}

pub fn local_branches(repo: &Repository) -> Vec<String> {
    repo.branches(Some(BranchType::Local))
        .unwrap()
        .map(|b| b.unwrap().0.name().unwrap().unwrap().to_string())
        .collect()
}

pub fn merge_branches(repo: &Repository) -> Vec<String> {
    local_branches(repo)
        .into_iter()
        .filter(|b| b.starts_with("merge-"))
        .collect()
}

/// Every ref with its target, for before/after comparisons.
pub fn snapshot_refs(repo: &Repository) -> Vec<(String, Option<Oid>)> {
    let mut out: Vec<_> = repo
        .references()
        .unwrap()
        .map(|r| {
            let r = r.unwrap();
            (r.name().unwrap().to_string(), r.target())
        })
        .collect();
    out.sort();
    out
}

pub fn is_ancestor(repo: &Repository, ancestor: Oid, of: Oid) -> bool {
    ancestor == of || repo.graph_descendant_of(of, ancestor).unwrap()
}
