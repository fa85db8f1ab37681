// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook signature verification and payload decoding.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

/// Verify an `X-Hub-Signature-256` header against the raw request body.
///
/// Any malformed or absent header verifies false; the comparison itself is
/// constant-time.
pub fn verify_signature(secret: &str, signature_header: Option<&str>, body: &[u8]) -> bool {
    let Some(header) = signature_header else {
        return false;
    };
    let Some(hex_digest) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Repository fields shared by all payloads of interest
#[derive(Debug, Clone, Deserialize)]
pub struct WireRepo {
    pub id: u64,
    pub name: String,
    pub owner: WireAccount,
    pub default_branch: String,
    pub clone_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireAccount {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireInstallation {
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireCommit {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Absent for branch deletions.
    pub head_commit: Option<WireCommit>,
    pub repository: WireRepo,
    pub installation: WireInstallation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WirePullBase {
    #[serde(rename = "ref")]
    pub git_ref: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WirePullHeadRepo {
    pub owner: WireAccount,
    pub clone_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WirePullHead {
    pub sha: String,
    pub repo: WirePullHeadRepo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WirePull {
    pub number: u64,
    pub base: WirePullBase,
    pub head: WirePullHead,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestPayload {
    pub action: String,
    pub pull_request: WirePull,
    pub repository: WireRepo,
    pub installation: WireInstallation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireComment {
    pub body: String,
    pub user: WireAccount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireIssue {
    pub number: u64,
    /// Present iff the issue is a pull request.
    pub pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentPayload {
    pub action: String,
    pub comment: WireComment,
    pub issue: WireIssue,
    pub repository: WireRepo,
    pub installation: WireInstallation,
}

/// Tagged variant over the webhook payload kinds the pipeline consumes
#[derive(Debug, Clone)]
pub enum WebhookPayload {
    Push(PushPayload),
    PullRequest(PullRequestPayload),
    IssueComment(IssueCommentPayload),
}

/// Decode a webhook body according to its `X-GitHub-Event` header.
///
/// Returns `Ok(None)` for event kinds the pipeline does not consume.
pub fn parse_payload(
    event_name: &str,
    body: &[u8],
) -> Result<Option<WebhookPayload>, serde_json::Error> {
    Ok(Some(match event_name {
        "push" => WebhookPayload::Push(serde_json::from_slice(body)?),
        "pull_request" => WebhookPayload::PullRequest(serde_json::from_slice(body)?),
        "issue_comment" => WebhookPayload::IssueComment(serde_json::from_slice(body)?),
        _ => return Ok(None),
    }))
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
