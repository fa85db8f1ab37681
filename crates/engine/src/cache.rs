// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cache manager.
//!
//! Owns the on-disk layout under `<data>/cache/<owner>/<repo>/<job-name>/<tag>`
//! and the per-run snapshot at `<data>/jobs/<job>/cache`. Commit moves the
//! per-run snapshot onto the primary tag with a rename, so readers observe
//! either the old primary or the new one, never absence.

use bender_adapters::{SnapshotError, Snapshotter};
use bender_core::Job;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from cache provisioning
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Manages committed cache subvolumes and per-run snapshots
#[derive(Clone)]
pub struct CacheManager<S> {
    data_dir: PathBuf,
    snapshots: S,
}

impl<S: Snapshotter> CacheManager<S> {
    pub fn new(data_dir: PathBuf, snapshots: S) -> Self {
        Self { data_dir, snapshots }
    }

    /// `<data>/cache/<owner>/<repo>/<job-name>`
    fn repo_cache_dir(&self, job: &Job) -> PathBuf {
        self.data_dir
            .join("cache")
            .join(&job.event.repo.owner)
            .join(&job.event.repo.name)
            .join(&job.name)
    }

    /// `<data>/jobs/<job>/cache`
    fn per_run_dir(&self, job_id: &str) -> PathBuf {
        self.data_dir.join("jobs").join(job_id).join("cache")
    }

    /// Provision the per-run snapshot for a job.
    ///
    /// Scans the job's cache tags in order and snapshots the first existing
    /// subvolume; creates a fresh empty subvolume when none exists. Returns
    /// the tag the snapshot was based on, if any.
    pub async fn provision(&self, job: &Job) -> Result<Option<String>, CacheError> {
        let cache_dir = self.repo_cache_dir(job);
        std::fs::create_dir_all(&cache_dir)?;

        let per_run = self.per_run_dir(&job.id);
        for tag in &job.event.cache_tags {
            tracing::debug!(tag = %tag, "checking cache");
            let candidate = cache_dir.join(tag);
            if candidate.is_dir() {
                self.snapshots.snapshot(&candidate, &per_run).await?;
                return Ok(Some(tag.clone()));
            }
        }

        self.snapshots.create(&per_run).await?;
        Ok(None)
    }

    /// Commit the per-run snapshot to the job's primary tag.
    ///
    /// Runs after every task wait regardless of the exit code, so failing
    /// builds still warm the cache for the next run. Failures are logged,
    /// never propagated.
    pub async fn commit(&self, job: &Job) {
        let per_run = self.per_run_dir(&job.id);
        if !per_run.exists() {
            tracing::debug!(job = %job.id, "no per-run snapshot to commit");
            return;
        }
        let Some(primary) = job.event.cache_tags.first() else {
            return;
        };

        tracing::info!(primary = %primary, "committing cache");
        let primary_path = self.repo_cache_dir(job).join(primary);
        if primary_path.exists() {
            if let Err(err) = self.snapshots.delete(&primary_path).await {
                tracing::warn!(
                    path = %primary_path.display(),
                    error = %err,
                    "failed to delete old primary cache, trying recursive delete"
                );
                if let Err(err) = std::fs::remove_dir_all(&primary_path) {
                    tracing::warn!(
                        path = %primary_path.display(),
                        error = %err,
                        "failed to recursively delete old primary cache"
                    );
                }
            }
        }

        if let Err(err) = std::fs::rename(&per_run, &primary_path) {
            tracing::warn!(
                from = %per_run.display(),
                to = %primary_path.display(),
                error = %err,
                "failed to rename cache onto primary"
            );
        }
    }

    /// Delete the per-run snapshot if it still exists.
    ///
    /// Runs during job cleanup; after a successful commit the snapshot has
    /// already been renamed away and this is a no-op.
    pub async fn discard(&self, job_id: &str) {
        let per_run = self.per_run_dir(job_id);
        if !per_run.exists() {
            return;
        }
        tracing::info!(path = %per_run.display(), "deleting per-run cache");
        if let Err(err) = self.snapshots.delete(&per_run).await {
            tracing::warn!(path = %per_run.display(), error = %err, "failed to delete per-run cache");
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
