// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bender_adapters::CopySnapshotter;

#[test]
fn oldest_walks_to_exactly_the_subvolume_depth() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("org/widgets/build/branch-main");
    std::fs::create_dir_all(&first).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(30));
    let second = dir.path().join("org/widgets/test/pr-42");
    std::fs::create_dir_all(&second).unwrap();

    let mut best = None;
    oldest(dir.path(), 4, &mut best).unwrap();
    let (path, _) = best.unwrap();
    assert_eq!(path, first);
}

#[test]
fn oldest_of_an_empty_tree_finds_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut best = None;
    oldest(dir.path(), 4, &mut best).unwrap();
    assert!(best.is_none());
}

#[tokio::test]
async fn tick_deletes_nothing_when_space_is_plentiful() {
    let dir = tempfile::tempdir().unwrap();
    let tag = dir.path().join("cache/org/widgets/build/branch-main");
    std::fs::create_dir_all(&tag).unwrap();

    // free space on a tempdir is far above a zero minimum
    let gc = CacheGc::new(dir.path().to_path_buf(), 0, CopySnapshotter::new());
    gc.tick().await;
    assert!(tag.exists());
}

#[tokio::test]
async fn tick_deletes_the_single_oldest_subvolume_under_pressure() {
    let dir = tempfile::tempdir().unwrap();
    let old_tag = dir.path().join("cache/org/widgets/build/branch-main");
    std::fs::create_dir_all(&old_tag).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(30));
    let new_tag = dir.path().join("cache/org/widgets/build/pr-42");
    std::fs::create_dir_all(&new_tag).unwrap();

    // an impossible minimum forces the low-space path
    let gc = CacheGc::new(dir.path().to_path_buf(), u64::MAX, CopySnapshotter::new());
    gc.tick().await;

    assert!(!old_tag.exists());
    assert!(new_tag.exists());

    // exactly one deletion per tick
    gc.tick().await;
    assert!(!new_tag.exists());
}
