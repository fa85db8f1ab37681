// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cache garbage collector.
//!
//! A long-lived task that checks free space every 20 seconds and, when it
//! falls below the configured minimum, deletes the single oldest committed
//! subvolume. One deletion per tick keeps the loop self-throttling.

use bender_adapters::Snapshotter;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const GC_INTERVAL: Duration = Duration::from_secs(20);

/// Committed subvolumes sit at depth 4 below the cache root:
/// `<owner>/<repo>/<job-name>/<tag>`.
const SUBVOLUME_DEPTH: u32 = 4;

/// Free-space driven cache eviction
#[derive(Clone)]
pub struct CacheGc<S> {
    data_dir: PathBuf,
    min_free_space_mb: u64,
    snapshots: S,
}

impl<S: Snapshotter> CacheGc<S> {
    pub fn new(data_dir: PathBuf, min_free_space_mb: u64, snapshots: S) -> Self {
        Self {
            data_dir,
            min_free_space_mb,
            snapshots,
        }
    }

    /// Run the collection loop for the life of the process
    pub async fn run(self) {
        loop {
            tokio::time::sleep(GC_INTERVAL).await;
            self.tick().await;
        }
    }

    /// One collection pass: delete at most one subvolume
    pub async fn tick(&self) {
        let cache_dir = self.data_dir.join("cache");

        let free_mb = match free_space_mb(&cache_dir) {
            Ok(mb) => mb,
            Err(err) => {
                tracing::warn!(error = %err, "failed to stat cache filesystem");
                return;
            }
        };
        if free_mb > self.min_free_space_mb {
            return;
        }

        tracing::info!(
            free_mb,
            min_free_mb = self.min_free_space_mb,
            "free space below minimum, deleting one old cache"
        );

        let mut best: Option<(PathBuf, SystemTime)> = None;
        if let Err(err) = oldest(&cache_dir, SUBVOLUME_DEPTH, &mut best) {
            tracing::warn!(error = %err, "failed to scan for oldest cache");
        }

        let Some((path, _)) = best else {
            tracing::warn!("no cache to delete");
            return;
        };

        tracing::info!(path = %path.display(), "deleting oldest cache");
        if let Err(err) = self.snapshots.delete(&path).await {
            tracing::warn!(path = %path.display(), error = %err, "failed to delete oldest cache");
        }
    }
}

fn free_space_mb(path: &Path) -> std::io::Result<u64> {
    let stat = nix::sys::statvfs::statvfs(path).map_err(std::io::Error::from)?;
    Ok(stat.blocks_available() as u64 * stat.fragment_size() as u64 / 1024 / 1024)
}

/// Find the entry with the oldest mtime at exactly `depth` levels below `path`
fn oldest(
    path: &Path,
    depth: u32,
    best: &mut Option<(PathBuf, SystemTime)>,
) -> std::io::Result<()> {
    if depth == 0 {
        let meta = std::fs::symlink_metadata(path)?;
        let mtime = meta.modified()?;
        let replace = match best {
            Some((_, current)) => *current > mtime,
            None => true,
        };
        if replace {
            *best = Some((path.to_path_buf(), mtime));
        }
        return Ok(());
    }

    for entry in std::fs::read_dir(path)? {
        oldest(&entry?.path(), depth - 1, best)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "gc_tests.rs"]
mod tests;
