// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cgroup bootstrap.
//!
//! At startup two sibling groups are created beneath the supervisor's own
//! cgroup: `bender`, which the supervisor migrates itself into, and `jobs`,
//! which receives container tasks (directly or in nested per-container
//! groups) and is the selector of the egress filter. The supervisor must
//! never sit in `jobs`, and job descendants must never land in `bender`.

use std::path::{Path, PathBuf};
use thiserror::Error;

const CGROUP_MOUNTPOINT: &str = "/sys/fs/cgroup";

/// Errors from cgroup bootstrap; fatal at startup
#[derive(Debug, Error)]
pub enum CgroupError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unexpected /proc/self/cgroup contents: {0:?}")]
    Parse(String),
    #[error("failed to create cgroup {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to join cgroup {path}: {source}")]
    Join {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The process's cgroup layout after bootstrap
#[derive(Debug, Clone)]
pub struct Cgroups {
    mountpoint: PathBuf,
    /// Cgroup path of the original root, e.g. `/system.slice/bender.service`
    root: String,
}

/// Extract the unified-hierarchy cgroup path from `/proc/self/cgroup`
pub(crate) fn parse_self_cgroup(contents: &str) -> Option<String> {
    contents
        .lines()
        .find_map(|line| line.strip_prefix("0::"))
        .map(|path| path.trim().to_string())
}

impl Cgroups {
    /// Create the `bender` and `jobs` groups and migrate this process into
    /// `bender`.
    pub fn init() -> Result<Self, CgroupError> {
        let proc_path = Path::new("/proc/self/cgroup");
        let contents = std::fs::read_to_string(proc_path).map_err(|source| CgroupError::Read {
            path: proc_path.to_path_buf(),
            source,
        })?;
        let root = parse_self_cgroup(&contents)
            .ok_or_else(|| CgroupError::Parse(contents.clone()))?;
        Self::init_at(PathBuf::from(CGROUP_MOUNTPOINT), root)
    }

    fn init_at(mountpoint: PathBuf, root: String) -> Result<Self, CgroupError> {
        let cg = Self { mountpoint, root };

        for group in [cg.bender_dir(), cg.jobs_dir()] {
            // pre-existing groups from a previous run are fine
            if let Err(source) = std::fs::create_dir(&group) {
                if source.kind() != std::io::ErrorKind::AlreadyExists {
                    return Err(CgroupError::Create {
                        path: group,
                        source,
                    });
                }
            }
        }

        let procs = cg.bender_dir().join("cgroup.procs");
        std::fs::write(&procs, std::process::id().to_string()).map_err(|source| {
            CgroupError::Join {
                path: procs.clone(),
                source,
            }
        })?;

        Ok(cg)
    }

    fn relative(path: &str) -> &str {
        path.trim_start_matches('/')
    }

    fn bender_dir(&self) -> PathBuf {
        self.mountpoint
            .join(Self::relative(&self.root))
            .join("bender")
    }

    fn jobs_dir(&self) -> PathBuf {
        self.mountpoint.join(Self::relative(&self.root)).join("jobs")
    }

    /// Absolute cgroup path of the jobs group, e.g. `/system.slice/jobs`.
    /// Container tasks are placed beneath it.
    pub fn jobs_path(&self) -> String {
        let root = self.root.trim_end_matches('/');
        format!("{root}/jobs")
    }

    /// The packet-filter selector for the jobs group: its cgroup path without
    /// the leading slash, and the matching hierarchy level.
    pub fn nft_selector(&self) -> (String, u32) {
        let path = self.jobs_path();
        let trimmed = path.trim_start_matches('/').to_string();
        let level = trimmed.split('/').count() as u32;
        (trimmed, level)
    }
}

#[cfg(test)]
#[path = "cgroup_tests.rs"]
mod tests;
