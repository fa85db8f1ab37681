// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container runtime adapter

mod ctr;

pub use ctr::CtrRuntime;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeRuntime;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from container runtime operations
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("command failed: {command}: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bind mount into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: PathBuf,
    /// Absolute path inside the container
    pub target: String,
    pub read_only: bool,
}

impl Mount {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only: false,
        }
    }

    pub fn read_only(source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only: true,
        }
    }
}

/// Everything needed to create one job container.
///
/// The runtime layers `env` over the image's own environment (with the
/// distribution default PATH) when generating the container spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container ID; also keys the rootfs snapshot.
    pub id: String,
    pub image: String,
    pub command: Vec<String>,
    pub cwd: String,
    /// `uid:gid` the payload runs as.
    pub user: String,
    pub env: Vec<(String, String)>,
    pub mounts: Vec<Mount>,
    /// Absolute cgroup path the task is placed under.
    pub cgroup: String,
    /// Share the host network namespace; isolation comes from the packet
    /// filter, not a namespace.
    pub host_network: bool,
}

/// Adapter for the container runtime daemon
#[async_trait]
pub trait ContainerRuntime: Clone + Send + Sync + 'static {
    /// Handle of a started task, consumed by [`ContainerRuntime::wait`].
    type Task: Send;

    /// Whether the image is already present in the runtime's store
    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError>;

    /// Pull and unpack an image
    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError>;

    /// Create a container (and its rootfs snapshot) from a spec
    async fn create(&self, spec: &ContainerSpec) -> Result<(), RuntimeError>;

    /// Create and start the container's task with stdout and stderr both
    /// appended to the log file
    async fn start(&self, id: &str, log_path: &Path) -> Result<Self::Task, RuntimeError>;

    /// Wait for the task to exit; returns its exit code
    async fn wait(&self, task: Self::Task) -> Result<i64, RuntimeError>;

    /// Kill the task (SIGKILL, all processes)
    async fn kill(&self, id: &str) -> Result<(), RuntimeError>;

    /// Delete the task
    async fn remove_task(&self, id: &str) -> Result<(), RuntimeError>;

    /// Delete the container and its rootfs snapshot
    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError>;
}
