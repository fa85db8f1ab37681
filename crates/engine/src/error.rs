// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job execution errors

use bender_adapters::{FirewallError, GithubError, RuntimeError, SnapshotError};
use bender_core::event::PermissionError;
use thiserror::Error;

/// Errors that fail a single job.
///
/// Per-job failures never leak into other jobs; they surface as a `failure`
/// status and a tail line in the job log.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Permission(#[from] PermissionError),
    #[error("github error: {0}")]
    Github(#[from] GithubError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("cache error: {0}")]
    Cache(#[from] crate::cache::CacheError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("exited with code {0}")]
    TaskFailed(i64),
    #[error("panic: {0}")]
    Panic(String),
}

impl From<SnapshotError> for JobError {
    fn from(err: SnapshotError) -> Self {
        JobError::Cache(err.into())
    }
}

/// Errors that fail sandbox startup
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("firewall error: {0}")]
    Firewall(#[from] FirewallError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
