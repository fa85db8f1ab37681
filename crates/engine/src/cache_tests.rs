// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bender_adapters::CopySnapshotter;
use bender_core::{Event, EventKind, Repo};
use std::collections::HashMap;
use std::path::Path;

fn job_with_tags(data_dir: &Path, id: &str, tags: &[&str]) -> Job {
    let _ = data_dir;
    Job {
        event: Event {
            kind: EventKind::Push,
            attributes: HashMap::new(),
            repo: Repo {
                id: 1,
                owner: "org".to_string(),
                name: "widgets".to_string(),
                default_branch: "main".to_string(),
                clone_url: "https://github.com/org/widgets.git".to_string(),
            },
            clone_url: "https://github.com/org/widgets.git".to_string(),
            sha: "abc123".to_string(),
            installation_id: 1,
            cache_tags: tags.iter().map(|t| t.to_string()).collect(),
            trusted: true,
            pull_number: None,
        },
        id: id.to_string(),
        name: "build".to_string(),
        script: ".github/ci/build.sh".to_string(),
        permissions: Default::default(),
        permission_repos: Vec::new(),
    }
}

fn manager(data_dir: &Path) -> CacheManager<CopySnapshotter> {
    CacheManager::new(data_dir.to_path_buf(), CopySnapshotter::new())
}

#[tokio::test]
async fn provision_without_base_creates_an_empty_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let cache = manager(dir.path());
    let job = job_with_tags(dir.path(), "job1", &["branch-main", "branch-main"]);

    let base = cache.provision(&job).await.unwrap();
    assert_eq!(base, None);
    let per_run = dir.path().join("jobs/job1/cache");
    assert!(per_run.is_dir());
    assert_eq!(std::fs::read_dir(&per_run).unwrap().count(), 0);
}

#[tokio::test]
async fn provision_snapshots_the_first_existing_tag() {
    let dir = tempfile::tempdir().unwrap();
    let cache = manager(dir.path());
    let tag_dir = dir.path().join("cache/org/widgets/build/branch-main");
    std::fs::create_dir_all(&tag_dir).unwrap();
    std::fs::write(tag_dir.join("state.txt"), "warm").unwrap();

    let job = job_with_tags(dir.path(), "job1", &["pr-42", "branch-main", "branch-dev"]);
    let base = cache.provision(&job).await.unwrap();
    assert_eq!(base.as_deref(), Some("branch-main"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("jobs/job1/cache/state.txt")).unwrap(),
        "warm"
    );
}

#[tokio::test]
async fn commit_moves_the_snapshot_onto_the_primary() {
    let dir = tempfile::tempdir().unwrap();
    let cache = manager(dir.path());
    let job = job_with_tags(dir.path(), "job1", &["branch-main", "branch-main"]);

    cache.provision(&job).await.unwrap();
    std::fs::write(dir.path().join("jobs/job1/cache/built.txt"), "v1").unwrap();
    cache.commit(&job).await;

    let primary = dir.path().join("cache/org/widgets/build/branch-main");
    assert!(primary.is_dir());
    assert_eq!(std::fs::read_to_string(primary.join("built.txt")).unwrap(), "v1");
    // the per-run snapshot is gone after commit
    assert!(!dir.path().join("jobs/job1/cache").exists());
}

#[tokio::test]
async fn commit_replaces_an_existing_primary() {
    let dir = tempfile::tempdir().unwrap();
    let cache = manager(dir.path());
    let job = job_with_tags(dir.path(), "job1", &["branch-main"]);
    cache.provision(&job).await.unwrap();
    std::fs::write(dir.path().join("jobs/job1/cache/built.txt"), "new").unwrap();

    // a concurrent run committed the same primary in the meantime
    let primary = dir.path().join("cache/org/widgets/build/branch-main");
    std::fs::create_dir_all(&primary).unwrap();
    std::fs::write(primary.join("built.txt"), "old").unwrap();
    std::fs::write(primary.join("stale.txt"), "stale").unwrap();

    cache.commit(&job).await;

    assert_eq!(std::fs::read_to_string(primary.join("built.txt")).unwrap(), "new");
    // the old primary's contents were replaced wholesale, not merged
    assert!(!primary.join("stale.txt").exists());
}

#[tokio::test]
async fn sequential_runs_reuse_the_committed_primary() {
    let dir = tempfile::tempdir().unwrap();
    let cache = manager(dir.path());

    let first = job_with_tags(dir.path(), "job1", &["branch-main", "branch-main"]);
    cache.provision(&first).await.unwrap();
    std::fs::write(dir.path().join("jobs/job1/cache/incremental.txt"), "state").unwrap();
    cache.commit(&first).await;

    let second = job_with_tags(dir.path(), "job2", &["branch-main", "branch-main"]);
    let base = cache.provision(&second).await.unwrap();
    assert_eq!(base.as_deref(), Some("branch-main"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("jobs/job2/cache/incremental.txt")).unwrap(),
        "state"
    );
}

#[tokio::test]
async fn commit_without_a_snapshot_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let cache = manager(dir.path());
    let job = job_with_tags(dir.path(), "job1", &["branch-main"]);

    cache.commit(&job).await;
    assert!(!dir.path().join("cache/org/widgets/build/branch-main").exists());
}

#[tokio::test]
async fn discard_removes_a_leftover_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let cache = manager(dir.path());
    let job = job_with_tags(dir.path(), "job1", &["branch-main"]);

    cache.provision(&job).await.unwrap();
    assert!(dir.path().join("jobs/job1/cache").exists());
    cache.discard("job1").await;
    assert!(!dir.path().join("jobs/job1/cache").exists());

    // idempotent
    cache.discard("job1").await;
}
