// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event pipeline.
//!
//! Translates webhook payloads into internal events, handles `bender`
//! commands from PR comments, discovers matching job scripts at the event's
//! commit, and fans matching files out into independent executor tasks.

use crate::executor::{run_job, JobContext};
use bender_adapters::github::webhook::{
    IssueCommentPayload, PullRequestPayload, PushPayload, WebhookPayload, WireRepo,
};
use bender_adapters::{
    ContainerRuntime, Contents, GithubClient, GithubError, PullInfo, Snapshotter,
};
use bender_core::event::{merge_queue_target, pr_cache_tags, push_cache_tags, remove_extension};
use bender_core::meta::{parse_directive, parse_meta, DirectiveError};
use bender_core::{Event, EventKind, IdGen, Job, Repo};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that fail a whole webhook delivery (surfaced as a 500)
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("github error: {0}")]
    Github(#[from] GithubError),
}

/// Errors of a single `bender` command line, aggregated into a reply comment
#[derive(Debug, Error)]
enum CommandError {
    #[error("no command?")]
    Empty,
    #[error("'run' takes no arguments")]
    RunArgs,
    #[error("permission denied")]
    PermissionDenied,
    #[error("this is not a pull request")]
    NotAPullRequest,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error(transparent)]
    Directive(#[from] DirectiveError),
    #[error(transparent)]
    Github(#[from] GithubError),
}

fn convert_repo(wire: WireRepo) -> Repo {
    Repo {
        id: wire.id,
        owner: wire.owner.login,
        name: wire.name,
        default_branch: wire.default_branch,
        clone_url: wire.clone_url,
    }
}

/// Build a pull-request event; shared by webhook deliveries and the `run`
/// command.
fn pull_event(repo: Repo, installation_id: u64, pull: &PullInfo) -> Event {
    Event {
        kind: EventKind::PullRequest,
        attributes: HashMap::from([("branch".to_string(), pull.base_ref.clone())]),
        cache_tags: pr_cache_tags(pull.number, &pull.base_ref, &repo.default_branch),
        clone_url: pull.head_clone_url.clone(),
        sha: pull.head_sha.clone(),
        installation_id,
        // trusted iff the PR is not from a fork
        trusted: pull.head_owner == repo.owner,
        pull_number: Some(pull.number),
        repo,
    }
}

/// Webhook-to-jobs pipeline over a shared job context
pub struct Pipeline<G, R, S, I> {
    ctx: Arc<JobContext<G, R, S>>,
    ids: I,
}

impl<G, R, S, I> Pipeline<G, R, S, I>
where
    G: GithubClient,
    R: ContainerRuntime,
    S: Snapshotter,
    I: IdGen + 'static,
{
    pub fn new(ctx: Arc<JobContext<G, R, S>>, ids: I) -> Self {
        Self { ctx, ids }
    }

    /// Handle one validated webhook delivery: emit events, discover jobs,
    /// spawn one executor task per job.
    pub async fn handle_payload(&self, payload: WebhookPayload) -> Result<(), PipelineError> {
        let events = self.events_from_payload(payload).await?;
        for event in events {
            let jobs = self.discover_jobs(&event).await?;
            for job in jobs {
                tracing::info!(job = %job.id, name = %job.name, script = %job.script, "spawning job");
                tokio::spawn(run_job(Arc::clone(&self.ctx), job));
            }
        }
        Ok(())
    }

    /// Translate a payload into zero or more internal events
    pub async fn events_from_payload(
        &self,
        payload: WebhookPayload,
    ) -> Result<Vec<Event>, PipelineError> {
        match payload {
            WebhookPayload::Push(push) => Ok(push_event(push).into_iter().collect()),
            WebhookPayload::PullRequest(pr) => Ok(pr_event(pr).into_iter().collect()),
            WebhookPayload::IssueComment(comment) => self.comment_events(comment).await,
        }
    }

    /// Handle `bender <command>` lines in a newly-created PR comment.
    /// Per-command failures accumulate into one aggregated reply comment.
    async fn comment_events(
        &self,
        payload: IssueCommentPayload,
    ) -> Result<Vec<Event>, PipelineError> {
        if payload.action != "created" {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        let mut errors = String::new();
        let body = payload.comment.body.clone();
        for line in body.lines() {
            let Some(command) = line.strip_prefix("bender ") else {
                continue;
            };
            if let Err(err) = self.handle_command(&payload, command, &mut events).await {
                tracing::warn!(command = %command, error = %err, "failed to handle command");
                errors.push_str(&format!("`{command}`: {err}\n"));
            }
        }

        if !errors.is_empty() {
            if let Err(err) = self
                .ctx
                .github
                .create_comment(
                    payload.installation.id,
                    &payload.repository.owner.login,
                    &payload.repository.name,
                    payload.issue.number,
                    &errors,
                )
                .await
            {
                tracing::warn!(error = %err, "failed to post comment with command errors");
            }
        }

        Ok(events)
    }

    async fn handle_command(
        &self,
        payload: &IssueCommentPayload,
        command: &str,
        events: &mut Vec<Event>,
    ) -> Result<(), CommandError> {
        let directive = parse_directive(command)?;
        let Some(verb) = directive.args.first() else {
            return Err(CommandError::Empty);
        };

        match verb.as_str() {
            "run" => {
                if directive.args.len() != 1 || !directive.conditions.is_empty() {
                    return Err(CommandError::RunArgs);
                }

                let owner = &payload.repository.owner.login;
                let repo_name = &payload.repository.name;
                let level = self
                    .ctx
                    .github
                    .permission_level(
                        payload.installation.id,
                        owner,
                        repo_name,
                        &payload.comment.user.login,
                    )
                    .await?;
                if level != "admin" && level != "write" {
                    return Err(CommandError::PermissionDenied);
                }

                if payload.issue.pull_request.is_none() {
                    return Err(CommandError::NotAPullRequest);
                }
                let pull = self
                    .ctx
                    .github
                    .get_pull(
                        payload.installation.id,
                        owner,
                        repo_name,
                        payload.issue.number,
                    )
                    .await?;

                let repo = convert_repo(payload.repository.clone());
                events.push(pull_event(repo, payload.installation.id, &pull));
                Ok(())
            }
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    /// Fetch `.github/ci/` at the event's commit and instantiate a job for
    /// every file whose metadata matches the event.
    pub async fn discover_jobs(&self, event: &Event) -> Result<Vec<Job>, PipelineError> {
        let owner = &event.repo.owner;
        let repo_name = &event.repo.name;

        let contents = match self
            .ctx
            .github
            .get_contents(event.installation_id, owner, repo_name, ".github/ci", &event.sha)
            .await
        {
            Err(GithubError::NotFound) => {
                tracing::info!("`.github/ci` directory does not exist");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
            Ok(contents) => contents,
        };
        let Contents::Dir(entries) = contents else {
            tracing::info!("`.github/ci` is not a directory");
            return Ok(Vec::new());
        };

        let mut jobs = Vec::new();
        for entry in entries {
            if entry.kind != "file" {
                continue;
            }

            let contents = self
                .ctx
                .github
                .get_contents(event.installation_id, owner, repo_name, &entry.path, &event.sha)
                .await?;
            let Contents::File(content) = contents else {
                continue;
            };

            let meta = match parse_meta(&content) {
                Ok(meta) => meta,
                Err(err) => {
                    tracing::warn!(file = %entry.name, error = %err, "failed to parse meta");
                    continue;
                }
            };

            if !meta.matches(event.kind.as_str(), &event.attributes) {
                continue;
            }

            jobs.push(Job {
                event: event.clone(),
                id: self.ids.next(),
                name: remove_extension(&entry.name).to_string(),
                script: entry.path,
                permissions: meta.permissions,
                permission_repos: meta.permission_repos,
            });
        }

        Ok(jobs)
    }
}

fn push_event(payload: PushPayload) -> Option<Event> {
    let Some(branch) = payload.git_ref.strip_prefix("refs/heads/") else {
        tracing::warn!(git_ref = %payload.git_ref, "unknown ref");
        return None;
    };
    let Some(head) = payload.head_commit else {
        // branch deletion
        return None;
    };

    if let Some(target) = merge_queue_target(branch) {
        tracing::info!(branch = %branch, target = %target, "merge queue branch, using target branch for cache");
    }

    let repo = convert_repo(payload.repository);
    Some(Event {
        kind: EventKind::Push,
        attributes: HashMap::from([("branch".to_string(), branch.to_string())]),
        cache_tags: push_cache_tags(branch, &repo.default_branch),
        clone_url: repo.clone_url.clone(),
        sha: head.id,
        installation_id: payload.installation.id,
        trusted: true,
        pull_number: None,
        repo,
    })
}

fn pr_event(payload: PullRequestPayload) -> Option<Event> {
    if payload.action != "opened" && payload.action != "synchronize" {
        return None;
    }

    let pull = PullInfo {
        number: payload.pull_request.number,
        base_ref: payload.pull_request.base.git_ref,
        head_sha: payload.pull_request.head.sha,
        head_clone_url: payload.pull_request.head.repo.clone_url,
        head_owner: payload.pull_request.head.repo.owner.login,
    };
    let repo = convert_repo(payload.repository);
    Some(pull_event(repo, payload.installation.id, &pull))
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
