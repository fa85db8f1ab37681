// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake GitHub client for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{
    CommitStatus, Contents, DirEntry, GithubClient, GithubError, PullInfo, TokenRequest,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A commit status recorded by the fake
#[derive(Debug, Clone)]
pub struct RecordedStatus {
    pub owner: String,
    pub repo: String,
    pub sha: String,
    pub status: CommitStatus,
}

/// An issue comment recorded by the fake
#[derive(Debug, Clone)]
pub struct RecordedComment {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub body: String,
}

#[derive(Default)]
struct FakeGithubState {
    /// `owner/repo/path` -> file content, served at any ref
    files: HashMap<String, String>,
    /// user -> permission level
    permissions: HashMap<String, String>,
    pulls: HashMap<u64, PullInfo>,
    statuses: Vec<RecordedStatus>,
    comments: Vec<RecordedComment>,
    token_requests: Vec<TokenRequest>,
    fail_contents: bool,
}

/// Fake GitHub client serving seeded repository contents and recording writes
#[derive(Clone, Default)]
pub struct FakeGithub {
    inner: Arc<Mutex<FakeGithubState>>,
}

impl FakeGithub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file at `owner/repo/path`
    pub fn add_file(&self, owner: &str, repo: &str, path: &str, content: &str) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .files
            .insert(format!("{owner}/{repo}/{path}"), content.to_string());
    }

    /// Seed a user's repository permission level
    pub fn set_permission(&self, user: &str, level: &str) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .permissions
            .insert(user.to_string(), level.to_string());
    }

    /// Seed a pull request
    pub fn add_pull(&self, pull: PullInfo) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pulls
            .insert(pull.number, pull);
    }

    /// Make every contents fetch fail with an API error
    pub fn fail_contents(&self) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .fail_contents = true;
    }

    pub fn statuses(&self) -> Vec<RecordedStatus> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .statuses
            .clone()
    }

    pub fn comments(&self) -> Vec<RecordedComment> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .comments
            .clone()
    }

    pub fn token_requests(&self) -> Vec<TokenRequest> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .token_requests
            .clone()
    }
}

#[async_trait]
impl GithubClient for FakeGithub {
    async fn get_contents(
        &self,
        _installation_id: u64,
        owner: &str,
        repo: &str,
        path: &str,
        _git_ref: &str,
    ) -> Result<Contents, GithubError> {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if state.fail_contents {
            return Err(GithubError::Api {
                status: 500,
                message: "injected failure".to_string(),
            });
        }

        let key = format!("{owner}/{repo}/{path}");
        if let Some(content) = state.files.get(&key) {
            return Ok(Contents::File(content.clone()));
        }

        // A directory exists when seeded files sit directly beneath it.
        let prefix = format!("{key}/");
        let mut entries = Vec::new();
        for file_key in state.files.keys() {
            if let Some(rest) = file_key.strip_prefix(&prefix) {
                let (name, kind) = match rest.split_once('/') {
                    Some((child, _)) => (child, "dir"),
                    None => (rest, "file"),
                };
                if entries.iter().any(|e: &DirEntry| e.name == name) {
                    continue;
                }
                entries.push(DirEntry {
                    name: name.to_string(),
                    path: format!("{path}/{name}"),
                    kind: kind.to_string(),
                });
            }
        }
        if entries.is_empty() {
            return Err(GithubError::NotFound);
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Contents::Dir(entries))
    }

    async fn create_status(
        &self,
        _installation_id: u64,
        owner: &str,
        repo: &str,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<(), GithubError> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .statuses
            .push(RecordedStatus {
                owner: owner.to_string(),
                repo: repo.to_string(),
                sha: sha.to_string(),
                status: status.clone(),
            });
        Ok(())
    }

    async fn create_comment(
        &self,
        _installation_id: u64,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), GithubError> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .comments
            .push(RecordedComment {
                owner: owner.to_string(),
                repo: repo.to_string(),
                number,
                body: body.to_string(),
            });
        Ok(())
    }

    async fn permission_level(
        &self,
        _installation_id: u64,
        _owner: &str,
        _repo: &str,
        user: &str,
    ) -> Result<String, GithubError> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .permissions
            .get(user)
            .cloned()
            .unwrap_or_else(|| "none".to_string()))
    }

    async fn get_pull(
        &self,
        _installation_id: u64,
        _owner: &str,
        _repo: &str,
        number: u64,
    ) -> Result<PullInfo, GithubError> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pulls
            .get(&number)
            .cloned()
            .ok_or(GithubError::NotFound)
    }

    async fn create_token(
        &self,
        _installation_id: u64,
        request: &TokenRequest,
    ) -> Result<String, GithubError> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .token_requests
            .push(request.clone());
        Ok("fake-token".to_string())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
