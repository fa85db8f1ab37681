// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job executor.
//!
//! Runs one job through its lifecycle: register, log setup, pending status,
//! token mint, image fetch, staging, cache provision, container run, cache
//! commit, comment, final status, cleanup. Failures after staging still
//! traverse the commit and the final status; panics become a `failure`
//! result. Cleanup of the job directory and the registry entry is guaranteed
//! on every exit path.

use crate::cache::CacheManager;
use crate::error::JobError;
use bender_adapters::{
    CommitStatus, ContainerRuntime, ContainerSpec, GithubClient, Mount, Snapshotter, StatusState,
    TokenRequest,
};
use bender_core::event::validate_permissions;
use bender_core::{Config, Job, RunningJobs};
use futures_util::FutureExt;
use std::io::Write as _;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;

const GITCONFIG: &str = "\
[user]
email = ci@bender.dev
name = Bender CI
[init]
defaultBranch = main
[advice]
detachedHead = false
";

/// Shared dependencies of every job run
pub struct JobContext<G, R, S> {
    pub config: Config,
    pub github: G,
    pub runtime: R,
    pub cache: CacheManager<S>,
    pub registry: RunningJobs,
    /// Absolute cgroup path containers are nested under.
    pub jobs_cgroup: String,
}

/// Run one job to completion. Never fails; all errors end up in the job log
/// and the final commit status.
pub async fn run_job<G, R, S>(ctx: Arc<JobContext<G, R, S>>, job: Job)
where
    G: GithubClient,
    R: ContainerRuntime,
    S: Snapshotter,
{
    let span = tracing::info_span!(
        "job",
        id = %job.id,
        name = %job.name,
        repo = %job.event.repo.full_name()
    );
    run_job_impl(ctx, job).instrument(span).await;
}

async fn run_job_impl<G, R, S>(ctx: Arc<JobContext<G, R, S>>, job: Job)
where
    G: GithubClient,
    R: ContainerRuntime,
    S: Snapshotter,
{
    ctx.registry.insert(&job.id);

    let log_path = ctx.config.data_dir.join("logs").join(&job.id);
    if let Err(err) = std::fs::File::create(&log_path) {
        tracing::error!(error = %err, "error creating log file");
        ctx.registry.remove(&job.id);
        return;
    }

    let target_url = format!("{}/jobs/{}", ctx.config.external_url, job.id);
    let pending = CommitStatus {
        state: StatusState::Pending,
        context: format!("ci/{}", job.name),
        target_url: target_url.clone(),
    };
    if let Err(err) = post_status(&ctx, &job, &pending).await {
        tracing::warn!(error = %err, "error creating pending status");
    }

    let result = match AssertUnwindSafe(run_job_inner(&ctx, &job, &log_path))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(JobError::Panic(panic_message(panic.as_ref()))),
    };

    let state = match &result {
        Ok(()) => StatusState::Success,
        Err(err) => {
            append_log_line(&log_path, &format!("run failed: {err}"));
            tracing::error!(error = %err, "job run failed");
            StatusState::Failure
        }
    };

    let final_status = CommitStatus {
        state,
        context: format!("ci/{}", job.name),
        target_url,
    };
    if let Err(err) = post_status(&ctx, &job, &final_status).await {
        tracing::warn!(error = %err, "error creating result status");
    }

    // Cleanup. The per-run snapshot must go before its parent directory, and
    // the job directory before the registry entry; artifacts and the log file
    // survive.
    ctx.cache.discard(&job.id).await;
    let job_dir = ctx.config.data_dir.join("jobs").join(&job.id);
    if job_dir.exists() {
        tracing::info!(path = %job_dir.display(), "deleting job dir");
        if let Err(err) = std::fs::remove_dir_all(&job_dir) {
            tracing::warn!(error = %err, "error deleting job dir");
        }
    }
    ctx.registry.remove(&job.id);
}

async fn run_job_inner<G, R, S>(
    ctx: &JobContext<G, R, S>,
    job: &Job,
    log_path: &Path,
) -> Result<(), JobError>
where
    G: GithubClient,
    R: ContainerRuntime,
    S: Snapshotter,
{
    // TOKEN
    validate_permissions(&job.permissions)?;
    let token = mint_token(ctx, job).await?;

    // IMAGE
    if !ctx.runtime.image_exists(&ctx.config.image).await? {
        tracing::info!(image = %ctx.config.image, "image not found, pulling");
        ctx.runtime.pull_image(&ctx.config.image).await?;
    }

    // STAGE through WAIT; whatever happens in there, the commit and the
    // comment still run.
    let staged = stage_and_run(ctx, job, &token, log_path).await;

    // COMMIT
    ctx.cache.commit(job).await;

    // COMMENT
    if let Err(err) = post_comment(ctx, job).await {
        tracing::warn!(error = %err, "failed to post pull request comment");
    }

    let exit_code = staged?;
    if exit_code != 0 {
        return Err(JobError::TaskFailed(exit_code));
    }
    Ok(())
}

/// Mint the job's installation token. Custom permissions and extra
/// repositories apply only to trusted events.
async fn mint_token<G, R, S>(ctx: &JobContext<G, R, S>, job: &Job) -> Result<String, JobError>
where
    G: GithubClient,
    R: ContainerRuntime,
    S: Snapshotter,
{
    let mut request = TokenRequest {
        repositories: vec![job.event.repo.name.clone()],
        ..Default::default()
    };
    request
        .permissions
        .insert("metadata".to_string(), "read".to_string());
    request
        .permissions
        .insert("contents".to_string(), "read".to_string());

    if job.event.trusted {
        for (key, value) in &job.permissions {
            request.permissions.insert(key.clone(), value.clone());
        }
        request
            .repositories
            .extend(job.permission_repos.iter().cloned());
    }

    let token = ctx
        .github
        .create_token(job.event.installation_id, &request)
        .await?;
    Ok(token)
}

async fn stage_and_run<G, R, S>(
    ctx: &JobContext<G, R, S>,
    job: &Job,
    token: &str,
    log_path: &Path,
) -> Result<i64, JobError>
where
    G: GithubClient,
    R: ContainerRuntime,
    S: Snapshotter,
{
    // STAGE
    let home = stage(ctx, job, token)?;

    match ctx.cache.provision(job).await? {
        Some(base) => tracing::info!(base = %base, "using base cache"),
        None => tracing::info!("no base cache found"),
    }

    // CONTAINER
    tracing::info!("creating container");
    let spec = container_spec(ctx, job, &home)?;
    ctx.runtime.create(&spec).await?;

    // TASK_RUN / WAIT, with kill and delete guaranteed afterwards
    let result = start_and_wait(ctx, &spec.id, log_path).await;
    release_task(ctx, &spec.id).await;
    result
}

async fn start_and_wait<G, R, S>(
    ctx: &JobContext<G, R, S>,
    container_id: &str,
    log_path: &Path,
) -> Result<i64, JobError>
where
    G: GithubClient,
    R: ContainerRuntime,
    S: Snapshotter,
{
    tracing::info!("starting task");
    let task = ctx.runtime.start(container_id, log_path).await?;
    let exit_code = ctx.runtime.wait(task).await?;
    tracing::info!(exit_code, "task exited");
    Ok(exit_code)
}

async fn release_task<G, R, S>(ctx: &JobContext<G, R, S>, container_id: &str)
where
    G: GithubClient,
    R: ContainerRuntime,
    S: Snapshotter,
{
    if let Err(err) = ctx.runtime.kill(container_id).await {
        tracing::debug!(error = %err, "task kill failed");
    }
    if let Err(err) = ctx.runtime.remove_task(container_id).await {
        tracing::debug!(error = %err, "task delete failed");
    }
    if let Err(err) = ctx.runtime.remove_container(container_id).await {
        tracing::debug!(error = %err, "container delete failed");
    }
}

/// Create the artifact, job, and home directories and write the staged files
pub(crate) fn stage<G, R, S>(
    ctx: &JobContext<G, R, S>,
    job: &Job,
    token: &str,
) -> Result<PathBuf, JobError> {
    let data = &ctx.config.data_dir;

    let artifacts = data.join("artifacts").join(&job.id);
    std::fs::create_dir_all(&artifacts)?;

    let home = data.join("jobs").join(&job.id).join("home");
    std::fs::create_dir_all(&home)?;

    let netrc = format!("machine github.com\nlogin x-access-token\npassword {token}");
    write_file(&home.join(".netrc"), netrc.as_bytes(), 0o600)?;

    write_file(&home.join(".gitconfig"), GITCONFIG.as_bytes(), 0o600)?;

    let payload = serde_json::to_vec(job)?;
    write_file(&home.join("job.json"), &payload, 0o600)?;

    let entrypoint = format!(
        "#!/bin/bash\nset -euxo pipefail\ngit clone -n {clone_url} code\ncd code\ngit checkout {sha}\nexec {script}\n",
        clone_url = job.event.clone_url,
        sha = job.event.sha,
        script = job.script,
    );
    write_file(&home.join("entrypoint.sh"), entrypoint.as_bytes(), 0o700)?;

    Ok(home)
}

/// Build the container spec: payload command, mount set, environment, and
/// cgroup placement
pub(crate) fn container_spec<G, R, S>(
    ctx: &JobContext<G, R, S>,
    job: &Job,
    home: &Path,
) -> Result<ContainerSpec, JobError> {
    let data = &ctx.config.data_dir;
    let mut mounts = vec![
        Mount::new(home, "/ci"),
        Mount::new(data.join("jobs").join(&job.id).join("cache"), "/ci/cache"),
        Mount::new(data.join("artifacts").join(&job.id), "/ci/artifacts"),
    ];

    if ctx.config.sandboxed() {
        mounts.push(Mount::read_only(
            data.join("resolv.conf"),
            "/etc/resolv.conf",
        ));
    } else {
        mounts.push(Mount::read_only("/etc/resolv.conf", "/etc/resolv.conf"));
    }

    if job.event.trusted {
        let secrets = data
            .join("secrets")
            .join(&job.event.repo.owner)
            .join(&job.event.repo.name);
        std::fs::create_dir_all(&secrets)?;
        mounts.push(Mount::new(secrets, "/ci/secrets"));
    }

    Ok(ContainerSpec {
        id: format!("job-{}", job.id),
        image: ctx.config.image.clone(),
        command: vec![
            "/bin/bash".to_string(),
            "-c".to_string(),
            "./entrypoint.sh 2>&1".to_string(),
        ],
        cwd: "/ci".to_string(),
        user: "1000:1000".to_string(),
        env: vec![("HOME".to_string(), "/ci".to_string())],
        mounts,
        cgroup: format!("{}/job-{}", ctx.jobs_cgroup, job.id),
        host_network: true,
    })
}

/// Post `home/comment.md` as a PR comment if the job belongs to a pull
/// request and the file is a regular non-symlink file
async fn post_comment<G, R, S>(ctx: &JobContext<G, R, S>, job: &Job) -> Result<(), JobError>
where
    G: GithubClient,
    R: ContainerRuntime,
    S: Snapshotter,
{
    let Some(number) = job.event.pull_number else {
        return Ok(());
    };

    let path = ctx
        .config
        .data_dir
        .join("jobs")
        .join(&job.id)
        .join("home")
        .join("comment.md");
    let meta = match std::fs::symlink_metadata(&path) {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err.into()),
        Ok(meta) => meta,
    };
    // directories and symlinks are ignored
    if !meta.is_file() {
        return Ok(());
    }

    let body = std::fs::read_to_string(&path)?;
    ctx.github
        .create_comment(
            job.event.installation_id,
            &job.event.repo.owner,
            &job.event.repo.name,
            number,
            &body,
        )
        .await?;
    Ok(())
}

async fn post_status<G, R, S>(
    ctx: &JobContext<G, R, S>,
    job: &Job,
    status: &CommitStatus,
) -> Result<(), JobError>
where
    G: GithubClient,
    R: ContainerRuntime,
    S: Snapshotter,
{
    ctx.github
        .create_status(
            job.event.installation_id,
            &job.event.repo.owner,
            &job.event.repo.name,
            &job.event.sha,
            status,
        )
        .await?;
    Ok(())
}

fn write_file(path: &Path, content: &[u8], mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, content)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

fn append_log_line(log_path: &Path, line: &str) {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path);
    match file {
        Ok(mut file) => {
            let _ = writeln!(file, "{line}");
        }
        Err(err) => tracing::warn!(error = %err, "failed to append to job log"),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
