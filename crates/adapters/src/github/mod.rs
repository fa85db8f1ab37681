// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GitHub API adapter

mod rest;
pub mod webhook;

pub use rest::RestGithub;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeGithub, RecordedComment, RecordedStatus};

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from GitHub API operations
#[derive(Debug, Error)]
pub enum GithubError {
    #[error("not found")]
    NotFound,
    #[error("api error: status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// One entry of a directory listing from the contents API
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    /// `file`, `dir`, `symlink`, or `submodule`
    pub kind: String,
}

/// Result of a contents fetch: either a directory listing or a decoded file
#[derive(Debug, Clone)]
pub enum Contents {
    Dir(Vec<DirEntry>),
    File(String),
}

/// Commit status state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusState {
    Pending,
    Success,
    Failure,
}

impl StatusState {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusState::Pending => "pending",
            StatusState::Success => "success",
            StatusState::Failure => "failure",
        }
    }
}

/// A commit status to post
#[derive(Debug, Clone)]
pub struct CommitStatus {
    pub state: StatusState,
    pub context: String,
    pub target_url: String,
}

/// The subset of a pull request the pipeline needs
#[derive(Debug, Clone)]
pub struct PullInfo {
    pub number: u64,
    pub base_ref: String,
    pub head_sha: String,
    pub head_clone_url: String,
    pub head_owner: String,
}

/// Scope of a short-lived installation token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenRequest {
    pub repositories: Vec<String>,
    pub permissions: BTreeMap<String, String>,
}

/// Adapter for the GitHub REST API, authenticated per installation
#[async_trait]
pub trait GithubClient: Clone + Send + Sync + 'static {
    /// Fetch a file or directory at a ref. 404 maps to [`GithubError::NotFound`].
    async fn get_contents(
        &self,
        installation_id: u64,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<Contents, GithubError>;

    /// Post a commit status
    async fn create_status(
        &self,
        installation_id: u64,
        owner: &str,
        repo: &str,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<(), GithubError>;

    /// Post an issue / pull-request comment
    async fn create_comment(
        &self,
        installation_id: u64,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), GithubError>;

    /// Repository permission level of a user (`admin`, `write`, `read`, `none`)
    async fn permission_level(
        &self,
        installation_id: u64,
        owner: &str,
        repo: &str,
        user: &str,
    ) -> Result<String, GithubError>;

    /// Fetch a pull request
    async fn get_pull(
        &self,
        installation_id: u64,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullInfo, GithubError>;

    /// Mint a short-lived installation token restricted to the given
    /// repositories and permissions
    async fn create_token(
        &self,
        installation_id: u64,
        request: &TokenRequest,
    ) -> Result<String, GithubError>;
}
