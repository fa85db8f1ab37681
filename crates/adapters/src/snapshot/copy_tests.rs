// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn create_snapshot_delete_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let snaps = CopySnapshotter::new();

    let original = dir.path().join("original");
    snaps.create(&original).await.unwrap();
    std::fs::write(original.join("state.txt"), "v1").unwrap();
    std::fs::create_dir(original.join("nested")).unwrap();
    std::fs::write(original.join("nested/deep.txt"), "v2").unwrap();

    let clone = dir.path().join("clone");
    snaps.snapshot(&original, &clone).await.unwrap();
    assert_eq!(std::fs::read_to_string(clone.join("state.txt")).unwrap(), "v1");
    assert_eq!(
        std::fs::read_to_string(clone.join("nested/deep.txt")).unwrap(),
        "v2"
    );

    // the clone is independent of the original
    std::fs::write(clone.join("state.txt"), "changed").unwrap();
    assert_eq!(
        std::fs::read_to_string(original.join("state.txt")).unwrap(),
        "v1"
    );

    snaps.delete(&clone).await.unwrap();
    assert!(!clone.exists());
    assert!(original.exists());
}

#[tokio::test]
async fn delete_of_missing_path_errors() {
    let dir = tempfile::tempdir().unwrap();
    let snaps = CopySnapshotter::new();
    assert!(snaps.delete(&dir.path().join("missing")).await.is_err());
}
