// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem subvolume adapter

mod btrfs;
mod copy;

pub use btrfs::BtrfsSnapshotter;
pub use copy::CopySnapshotter;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from subvolume operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("command failed: {command}: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Adapter for snapshotting subvolumes.
///
/// A subvolume is a directory tree that can be cloned in O(1) and deleted as
/// one atomic operation. Renaming a subvolume is a plain directory rename,
/// which the cache manager relies on as its commit linearisation point.
#[async_trait]
pub trait Snapshotter: Clone + Send + Sync + 'static {
    /// Create a new empty subvolume at `path`
    async fn create(&self, path: &Path) -> Result<(), SnapshotError>;

    /// Snapshot the subvolume at `src` to a new subvolume at `dst`
    async fn snapshot(&self, src: &Path, dst: &Path) -> Result<(), SnapshotError>;

    /// Delete the subvolume at `path`
    async fn delete(&self, path: &Path) -> Result<(), SnapshotError>;
}
