// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain-directory snapshotter.
//!
//! Emulates subvolume semantics with ordinary directories and deep copies.
//! Used on filesystems without snapshot support and throughout the test
//! suite; it is not O(1) but preserves the same observable behavior.

use super::{SnapshotError, Snapshotter};
use async_trait::async_trait;
use std::path::Path;

/// Snapshotter backed by recursive directory copies
#[derive(Clone, Default)]
pub struct CopySnapshotter;

impl CopySnapshotter {
    pub fn new() -> Self {
        Self
    }
}

fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), target)?;
        }
        // symlinks are not carried over
    }
    Ok(())
}

#[async_trait]
impl Snapshotter for CopySnapshotter {
    async fn create(&self, path: &Path) -> Result<(), SnapshotError> {
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    async fn snapshot(&self, src: &Path, dst: &Path) -> Result<(), SnapshotError> {
        copy_tree(src, dst)?;
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<(), SnapshotError> {
        std::fs::remove_dir_all(path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "copy_tests.rs"]
mod tests;
