// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Btrfs subvolume adapter

use super::{SnapshotError, Snapshotter};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Snapshotter shelling out to `btrfs subvolume`
#[derive(Clone, Default)]
pub struct BtrfsSnapshotter;

impl BtrfsSnapshotter {
    pub fn new() -> Self {
        Self
    }
}

async fn run_btrfs(args: &[&str]) -> Result<(), SnapshotError> {
    tracing::debug!(command = %format!("btrfs {}", args.join(" ")), "executing");
    let output = Command::new("btrfs").args(args).output().await?;
    if !output.status.success() {
        return Err(SnapshotError::CommandFailed {
            command: format!("btrfs {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl Snapshotter for BtrfsSnapshotter {
    async fn create(&self, path: &Path) -> Result<(), SnapshotError> {
        run_btrfs(&["subvolume", "create", &path.display().to_string()]).await
    }

    async fn snapshot(&self, src: &Path, dst: &Path) -> Result<(), SnapshotError> {
        run_btrfs(&[
            "subvolume",
            "snapshot",
            &src.display().to_string(),
            &dst.display().to_string(),
        ])
        .await
    }

    async fn delete(&self, path: &Path) -> Result<(), SnapshotError> {
        run_btrfs(&["subvolume", "delete", &path.display().to_string()]).await
    }
}
