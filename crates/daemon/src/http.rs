// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface: webhook ingestion, live log streaming, artifact serving.
//!
//! Job IDs coming in from URLs are validated against `^[a-z0-9]+$` before
//! any filesystem access. Webhook deliveries that fail signature
//! verification are answered 200 with no side effect.

use axum::body::{Body, Bytes};
use axum::extract::{Path, Request, State};
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use bender_adapters::github::webhook::{parse_payload, verify_signature};
use bender_adapters::{ContainerRuntime, GithubClient, Snapshotter};
use bender_core::IdGen;
use bender_engine::{JobContext, Pipeline};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tower::util::ServiceExt;
use tower_http::services::ServeDir;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(60);
const LOG_POLL_INTERVAL: Duration = Duration::from_millis(500);
const LOG_CHUNK: usize = 32 * 1024;

/// Padding written while the job is live so browsers start rendering the
/// page as soon as it arrives; they hold back until a minimum amount of the
/// document has been received.
const LOG_PADDING: usize = 32 * 1024;

const LOG_PRELUDE: &str = r#"
<!DOCTYPE html>
<html>
	<head>
		<title>bender job</title>
		<style type="text/css">
			#main {
				overflow-anchor: none;
				font-family: monospace;
				white-space: pre;
			}
			body::after {
				overflow-anchor: auto;
				content: "   ";
				display: block;
				height: 1px;
			}
		</style>
	</head>
	<body>
		<div id="main">"#;

/// Shared state of every route
pub struct AppState<G, R, S, I> {
    pub ctx: Arc<JobContext<G, R, S>>,
    pub pipeline: Arc<Pipeline<G, R, S, I>>,
}

impl<G, R, S, I> Clone for AppState<G, R, S, I> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

/// Build the daemon router
pub fn router<G, R, S, I>(state: AppState<G, R, S, I>) -> Router
where
    G: GithubClient,
    R: ContainerRuntime,
    S: Snapshotter,
    I: IdGen + 'static,
{
    Router::new()
        .route("/jobs/{id}", get(job_logs::<G, R, S, I>))
        .route("/jobs/{id}/artifacts", get(artifacts_redirect::<G, R, S, I>))
        .route("/jobs/{id}/artifacts/{*path}", get(job_artifacts::<G, R, S, I>))
        .route("/webhook", post(webhook::<G, R, S, I>))
        .with_state(state)
}

fn valid_job_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

fn not_found() -> Response {
    status_response(StatusCode::NOT_FOUND)
}

fn status_response(status: StatusCode) -> Response {
    Response::builder()
        .status(status)
        .body(Body::empty())
        .unwrap_or_default()
}

/// Escape log bytes on their way into the HTML page
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&#34;"),
            other => out.push(other),
        }
    }
    out
}

struct LogStream {
    file: tokio::fs::File,
    registry: bender_core::RunningJobs,
    id: String,
    phase: u8,
    pad: bool,
}

async fn job_logs<G, R, S, I>(
    State(state): State<AppState<G, R, S, I>>,
    Path(id): Path<String>,
) -> Response
where
    G: GithubClient,
    R: ContainerRuntime,
    S: Snapshotter,
    I: IdGen + 'static,
{
    if !valid_job_id(&id) {
        tracing::warn!(id = %id, "invalid job id");
        return not_found();
    }

    let log_path = state.ctx.config.data_dir.join("logs").join(&id);
    let file = match tokio::fs::File::open(&log_path).await {
        Ok(file) => file,
        Err(err) => {
            tracing::warn!(error = %err, "failed to open log file");
            return not_found();
        }
    };

    let stream_state = LogStream {
        file,
        registry: state.ctx.registry.clone(),
        pad: state.ctx.registry.contains(&id),
        id,
        phase: 0,
    };

    let stream = futures_util::stream::unfold(stream_state, |mut s| async move {
        loop {
            match s.phase {
                // padding while the job is live
                0 => {
                    s.phase = 1;
                    if s.pad {
                        return Some((
                            Ok::<Bytes, std::io::Error>(Bytes::from(vec![b' '; LOG_PADDING])),
                            s,
                        ));
                    }
                }
                1 => {
                    s.phase = 2;
                    return Some((Ok(Bytes::from_static(LOG_PRELUDE.as_bytes())), s));
                }
                // incremental re-read until EOF with the job gone
                _ => {
                    let mut buf = vec![0u8; LOG_CHUNK];
                    match s.file.read(&mut buf).await {
                        Err(err) => return Some((Err(err), s)),
                        Ok(0) => {
                            if !s.registry.contains(&s.id) {
                                return None;
                            }
                            tokio::time::sleep(LOG_POLL_INTERVAL).await;
                        }
                        Ok(n) => {
                            let escaped = escape_html(&String::from_utf8_lossy(&buf[..n]));
                            return Some((Ok(Bytes::from(escaped)), s));
                        }
                    }
                }
            }
        }
    });

    Response::builder()
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .header("X-Content-Type-Options", "nosniff")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| status_response(StatusCode::INTERNAL_SERVER_ERROR))
}

async fn artifacts_redirect<G, R, S, I>(
    State(_state): State<AppState<G, R, S, I>>,
    Path(id): Path<String>,
) -> Response
where
    G: GithubClient,
    R: ContainerRuntime,
    S: Snapshotter,
    I: IdGen + 'static,
{
    if !valid_job_id(&id) {
        return not_found();
    }
    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(LOCATION, "artifacts/")
        .body(Body::empty())
        .unwrap_or_else(|_| status_response(StatusCode::INTERNAL_SERVER_ERROR))
}

async fn job_artifacts<G, R, S, I>(
    State(state): State<AppState<G, R, S, I>>,
    Path((id, rest)): Path<(String, String)>,
) -> Response
where
    G: GithubClient,
    R: ContainerRuntime,
    S: Snapshotter,
    I: IdGen + 'static,
{
    if !valid_job_id(&id) {
        tracing::warn!(id = %id, "invalid job id");
        return not_found();
    }

    let dir = state.ctx.config.data_dir.join("artifacts").join(&id);
    let request = match Request::builder()
        .uri(format!("/{rest}"))
        .body(Body::empty())
    {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(error = %err, "invalid artifact path");
            return not_found();
        }
    };

    match ServeDir::new(dir).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(infallible) => match infallible {},
    }
}

async fn webhook<G, R, S, I>(
    State(state): State<AppState<G, R, S, I>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode
where
    G: GithubClient,
    R: ContainerRuntime,
    S: Snapshotter,
    I: IdGen + 'static,
{
    let signature = headers
        .get("X-Hub-Signature-256")
        .and_then(|value| value.to_str().ok());
    if !verify_signature(&state.ctx.config.github.webhook_secret, signature, &body) {
        tracing::warn!("webhook signature verification failed");
        return StatusCode::OK;
    }

    let Some(event_name) = headers
        .get("X-GitHub-Event")
        .and_then(|value| value.to_str().ok())
    else {
        tracing::warn!("webhook without event header");
        return StatusCode::OK;
    };

    let payload = match parse_payload(event_name, &body) {
        Ok(Some(payload)) => payload,
        Ok(None) => return StatusCode::OK,
        Err(err) => {
            tracing::warn!(error = %err, "could not parse webhook");
            return StatusCode::OK;
        }
    };

    match tokio::time::timeout(WEBHOOK_TIMEOUT, state.pipeline.handle_payload(payload)).await {
        Ok(Ok(())) => StatusCode::OK,
        Ok(Err(err)) => {
            tracing::error!(error = %err, "webhook handling failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        Err(_) => {
            tracing::error!("webhook handling timed out");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
