mod common;

use common::*;
use git2::{BranchType, Repository};
use orgsync::git::SyncError;
use std::fs;

#[test]
fn identical_content_is_a_no_op() {
    let (fx, a) = Fixture::seeded("notes/a.org", "X\n");
    let sync = fx.sync();
    let src = fx.source("a.org", "X\n");

    let got = sync.update_and_commit_existing_file(&src, "notes/a.org").unwrap();
    assert!(got.is_none());
    assert_eq!(head_id(sync.repository()), a);
}

#[test]
fn add_new_file_commits_once_then_refuses() {
    let (fx, a) = Fixture::seeded("notes/a.org", "X\n");
    let sync = fx.sync();
    let src = fx.source("b.org", "* new\n");

    let oid = sync
        .add_and_commit_new_file(&src, "notes/sub/b.org")
        .unwrap()
        .unwrap();
    let repo = sync.repository();
    assert_eq!(head_id(repo), oid);
    let commit = repo.find_commit(oid).unwrap();
    assert_eq!(commit.parent_id(0).unwrap(), a);
    assert_eq!(commit.message(), Some("Orgzly update: notes/sub/b.org"));
    assert_eq!(read(repo, "notes/sub/b.org"), "* new\n");

    let err = sync
        .add_and_commit_new_file(&src, "notes/sub/b.org")
        .unwrap_err();
    assert!(matches!(err, SyncError::AlreadyExists(_)));
    assert_eq!(head_id(repo), oid);
}

#[test]
fn update_existing_requires_the_file() {
    let (fx, a) = Fixture::seeded("notes/a.org", "X\n");
    let sync = fx.sync();
    let src = fx.source("c.org", "Y\n");

    let err = sync
        .update_and_commit_existing_file(&src, "notes/c.org")
        .unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));
    assert_eq!(head_id(sync.repository()), a);
}

#[test]
fn leading_slash_is_stripped_and_escapes_are_rejected() {
    let (fx, _) = Fixture::seeded("notes/a.org", "X\n");
    let sync = fx.sync();
    let src = fx.source("a.org", "Y\n");

    let oid = sync
        .update_and_commit_existing_file(&src, "/notes/a.org")
        .unwrap();
    assert!(oid.is_some());
    assert_eq!(read(sync.repository(), "notes/a.org"), "Y\n");

    let err = sync.add_and_commit_new_file(&src, "../outside.org").unwrap_err();
    assert!(matches!(err, SyncError::InvalidPath(_)));
    assert!(!fx.dir.path().join("outside.org").exists());
}

#[test]
fn revision_gated_commit_applies_only_on_current_base() {
    let (fx, a) = Fixture::seeded("notes/a.org", "X\n");
    let sync = fx.sync();
    let repo = sync.repository();
    let base = blob_of(repo, a, "notes/a.org");

    let src = fx.source("a.org", "Y\n");
    assert!(
        sync.update_and_commit_file_from_revision(&src, "notes/a.org", base)
            .unwrap()
    );
    let b = head_id(repo);
    assert_ne!(b, a);
    assert_eq!(read(repo, "notes/a.org"), "Y\n");

    // Same base again is now stale.
    let src = fx.source("a2.org", "Z\n");
    assert!(
        !sync
            .update_and_commit_file_from_revision(&src, "notes/a.org", base)
            .unwrap()
    );
    assert_eq!(head_id(repo), b);
    assert_eq!(read(repo, "notes/a.org"), "Y\n");
}

#[test]
fn dirty_tree_blocks_every_mutation() {
    let (fx, a) = Fixture::seeded("notes/a.org", "X\n");
    let sync = fx.sync();
    let repo = sync.repository();
    let base = blob_of(repo, a, "notes/a.org");
    fs::write(fx.local.join("notes/a.org"), "dirty\n").unwrap();
    let before = snapshot_refs(repo);
    let src = fx.source("n.org", "N\n");

    let results = vec![
        sync.add_and_commit_new_file(&src, "notes/n.org").map(|_| ()),
        sync.update_and_commit_existing_file(&src, "notes/a.org")
            .map(|_| ()),
        sync.update_and_commit_file_from_revision(&src, "notes/a.org", base)
            .map(|_| ()),
        sync.update_and_commit_file_from_revision_and_merge(&src, "notes/a.org", base, a)
            .map(|_| ()),
        sync.merge_with_remote().map(|_| ()),
        sync.set_branch_and_get_latest(),
        sync.attempt_return_to_main_branch().map(|_| ()),
        sync.checkout_selected(),
    ];
    for r in results {
        assert!(matches!(r, Err(SyncError::DirtyRepository(_))), "{:?}", r);
    }

    assert_eq!(snapshot_refs(repo), before);
    assert_eq!(read(repo, "notes/a.org"), "dirty\n");
    assert!(!fx.local.join("notes/n.org").exists());
}

#[test]
fn untracked_files_do_not_make_the_tree_dirty() {
    let (fx, _) = Fixture::seeded("notes/a.org", "X\n");
    let sync = fx.sync();
    fs::write(fx.local.join("scratch.txt"), "tmp").unwrap();
    assert!(sync.is_clean().unwrap());
    sync.ensure_clean().unwrap();
}

#[test]
fn latest_commit_of_file_skips_unrelated_commits() {
    let (fx, a) = Fixture::seeded("notes/a.org", "X\n");
    let sync = fx.sync();
    let repo = sync.repository();
    let b = commit_file(repo, "notes/a.org", "Y\n");
    commit_file(repo, "notes/other.org", "O\n");

    let latest = sync.latest_commit_of_file("notes/a.org").unwrap().unwrap();
    assert_eq!(latest.id(), b);
    assert_ne!(latest.id(), a);
    assert!(sync.latest_commit_of_file("notes/none.org").unwrap().is_none());
}

#[test]
fn revision_queries_compare_blobs() {
    let (fx, a) = Fixture::seeded("notes/a.org", "X\n");
    let sync = fx.sync();
    let repo = sync.repository();
    let b = commit_file(repo, "notes/other.org", "O\n");
    let c = commit_file(repo, "notes/a.org", "Y\n");

    let (a, b, c) = (
        repo.find_commit(a).unwrap(),
        repo.find_commit(b).unwrap(),
        repo.find_commit(c).unwrap(),
    );
    assert!(sync.file_matches_in_revisions("notes/a.org", &a, &b).unwrap());
    assert!(!sync.file_matches_in_revisions("notes/a.org", &b, &c).unwrap());
    assert_eq!(
        sync.file_revision("notes/a.org", &a).unwrap(),
        Some(blob_of(repo, a.id(), "notes/a.org"))
    );
    assert_eq!(sync.file_revision("notes/none.org", &a).unwrap(), None);
}

#[test]
fn retrieve_copies_working_tree_file() {
    let (fx, _) = Fixture::seeded("notes/a.org", "X\n");
    let sync = fx.sync();
    let dest = fx.dir.path().join("out/a.org");

    sync.retrieve_latest_version_of_file("notes/a.org", &dest)
        .unwrap();
    assert_eq!(fs::read_to_string(&dest).unwrap(), "X\n");

    let err = sync
        .retrieve_latest_version_of_file("notes/none.org", &dest)
        .unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));
}

#[test]
fn empty_repository_queries() {
    let fx = Fixture::new();
    let sync = fx.sync();
    assert!(sync.is_empty_repo().unwrap());
    assert!(sync.current_head().unwrap().is_none());
    assert_eq!(sync.current_branch().unwrap(), "main");
    assert!(sync.get_commit("main").unwrap().is_none());

    let src = fx.source("a.org", "X\n");
    let oid = sync
        .add_and_commit_new_file(&src, "a.org")
        .unwrap()
        .unwrap();
    let repo = Repository::open(&fx.local).unwrap();
    assert_eq!(head_id(&repo), oid);
    assert_eq!(repo.find_commit(oid).unwrap().parent_count(), 0);
}

#[test]
fn checkout_of_primary_refuses_a_dirty_tree() {
    let (fx, a) = Fixture::seeded("notes/a.org", "X\n");
    let sync = fx.sync();
    let repo = sync.repository();
    repo.branch("side", &repo.find_commit(a).unwrap(), false)
        .unwrap();
    repo.set_head("refs/heads/side").unwrap();
    repo.find_branch("main", BranchType::Local)
        .unwrap()
        .delete()
        .unwrap();
    fs::write(fx.local.join("notes/a.org"), "dirty\n").unwrap();
    let before = snapshot_refs(repo);

    let err = sync.checkout_selected().unwrap_err();
    assert!(matches!(err, SyncError::DirtyRepository(_)));
    assert_eq!(sync.current_branch().unwrap(), "side");
    assert_eq!(snapshot_refs(repo), before);
    assert!(!local_branches(repo).contains(&"main".to_string()));
    assert_eq!(read(repo, "notes/a.org"), "dirty\n");
}

#[test]
fn checkout_of_primary_recreates_it_from_the_remote() {
    let (fx, a) = Fixture::seeded("notes/a.org", "X\n");
    let sync = fx.sync();
    let repo = sync.repository();
    repo.branch("side", &repo.find_commit(a).unwrap(), false)
        .unwrap();
    repo.set_head("refs/heads/side").unwrap();
    repo.find_branch("main", BranchType::Local)
        .unwrap()
        .delete()
        .unwrap();

    sync.checkout_selected().unwrap();
    assert_eq!(sync.current_branch().unwrap(), "main");
    assert_eq!(head_id(repo), a);
    let main = repo.find_branch("main", BranchType::Local).unwrap();
    let upstream = main.upstream().unwrap();
    assert_eq!(upstream.name().unwrap(), Some("origin/main"));
}
