// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event and job model.
//!
//! An [`Event`] is the internal form of one provider webhook; it lives only
//! for the duration of one pipeline invocation. A [`Job`] pairs an event with
//! one matching script file and is what the executor runs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

/// Kind of a CI-triggering event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    PullRequest,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the repository an event targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    pub id: u64,
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub clone_url: String,
}

impl Repo {
    /// `owner/name` form used in logs
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Internal form of one webhook delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub attributes: HashMap<String, String>,
    pub repo: Repo,
    /// Clone URL of the commit source; differs from `repo.clone_url` for
    /// fork pull requests.
    pub clone_url: String,
    pub sha: String,
    pub installation_id: u64,
    /// Ordered cache tag list. Element 0 is the primary the post-run
    /// snapshot is committed to; the rest are fallbacks.
    pub cache_tags: Vec<String>,
    pub trusted: bool,
    /// Set for pull-request events; used for comment posting.
    pub pull_number: Option<u64>,
}

/// Rewrite a merge-queue branch (`gh-readonly-queue/<target>/…`) to its
/// target branch. Returns `None` for ordinary branches.
pub fn merge_queue_target(branch: &str) -> Option<&str> {
    let rest = branch.strip_prefix("gh-readonly-queue/")?;
    let (target, _) = rest.split_once('/')?;
    Some(target)
}

/// Cache tags for a push: `[branch-<br>, branch-<default>]`, with merge-queue
/// branches rewritten to their target branch.
pub fn push_cache_tags(branch: &str, default_branch: &str) -> Vec<String> {
    let cache_branch = merge_queue_target(branch).unwrap_or(branch);
    vec![
        format!("branch-{cache_branch}"),
        format!("branch-{default_branch}"),
    ]
}

/// Cache tags for a pull request: `[pr-<N>, branch-<base>, branch-<default>]`.
/// The per-PR primary lets reruns reuse their previous state.
pub fn pr_cache_tags(number: u64, base: &str, default_branch: &str) -> Vec<String> {
    vec![
        format!("pr-{number}"),
        format!("branch-{base}"),
        format!("branch-{default_branch}"),
    ]
}

/// One runnable (event, script) pairing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(flatten)]
    pub event: Event,
    pub id: String,
    /// Display name: the script file name minus its extension
    pub name: String,
    /// In-repo path of the script
    pub script: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub permissions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permission_repos: Vec<String>,
}

/// Strip the last `.extension` from a file name, if any
pub fn remove_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => name,
    }
}

/// Permission keys accepted in trusted metadata
pub const ALLOWED_PERMISSIONS: &[&str] = &[
    "actions",
    "checks",
    "contents",
    "deployments",
    "issues",
    "packages",
    "pages",
    "pull_requests",
    "repository_projects",
    "security_events",
    "statuses",
];

/// Error for a permission request outside the accepted set
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("unknown permission: {0:?}")]
    UnknownKey(String),
    #[error("invalid permission {value:?} for {key:?}")]
    BadValue { key: String, value: String },
}

/// Validate declared permissions against the closed key/value set
pub fn validate_permissions(
    permissions: &BTreeMap<String, String>,
) -> Result<(), PermissionError> {
    for (key, value) in permissions {
        if value != "read" && value != "write" {
            return Err(PermissionError::BadValue {
                key: key.clone(),
                value: value.clone(),
            });
        }
        if !ALLOWED_PERMISSIONS.contains(&key.as_str()) {
            return Err(PermissionError::UnknownKey(key.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
