// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bender_adapters::{FakeGithub, FakeRuntime};
use bender_adapters::CopySnapshotter;
use bender_core::{CacheConfig, Event, EventKind, GithubConfig, Repo};
use std::collections::{BTreeMap, HashMap};
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
    github: FakeGithub,
    runtime: FakeRuntime,
    ctx: Arc<JobContext<FakeGithub, FakeRuntime, CopySnapshotter>>,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("logs")).unwrap();

    let config = Config {
        data_dir: dir.path().to_path_buf(),
        external_url: "http://ci.test".to_string(),
        listen_port: 8000,
        image: "test-image".to_string(),
        net_sandbox: None,
        github: GithubConfig {
            webhook_secret: "s".to_string(),
            app_id: 1,
            private_key: "k".to_string(),
        },
        cache: CacheConfig::default(),
    };

    let github = FakeGithub::new();
    let runtime = FakeRuntime::new();
    runtime.add_image("test-image");
    let cache = CacheManager::new(dir.path().to_path_buf(), CopySnapshotter::new());

    let ctx = Arc::new(JobContext {
        config,
        github: github.clone(),
        runtime: runtime.clone(),
        cache,
        registry: RunningJobs::new(),
        jobs_cgroup: "/bender-test/jobs".to_string(),
    });

    Harness {
        dir,
        github,
        runtime,
        ctx,
    }
}

fn push_job(id: &str) -> Job {
    Job {
        event: Event {
            kind: EventKind::Push,
            attributes: HashMap::from([("branch".to_string(), "main".to_string())]),
            repo: Repo {
                id: 1,
                owner: "org".to_string(),
                name: "widgets".to_string(),
                default_branch: "main".to_string(),
                clone_url: "https://github.com/org/widgets.git".to_string(),
            },
            clone_url: "https://github.com/org/widgets.git".to_string(),
            sha: "abc123".to_string(),
            installation_id: 7,
            cache_tags: vec!["branch-main".to_string(), "branch-main".to_string()],
            trusted: true,
            pull_number: None,
        },
        id: id.to_string(),
        name: "build".to_string(),
        script: ".github/ci/build.sh".to_string(),
        permissions: BTreeMap::new(),
        permission_repos: Vec::new(),
    }
}

fn pr_job(id: &str, trusted: bool) -> Job {
    let mut job = push_job(id);
    job.event.kind = EventKind::PullRequest;
    job.event.trusted = trusted;
    job.event.pull_number = Some(42);
    job.event.cache_tags = vec![
        "pr-42".to_string(),
        "branch-main".to_string(),
        "branch-main".to_string(),
    ];
    job
}

fn states(github: &FakeGithub) -> Vec<StatusState> {
    github.statuses().iter().map(|s| s.status.state).collect()
}

#[tokio::test]
async fn successful_run_posts_pending_then_success() {
    let h = harness();
    let job = push_job("aaa111");

    run_job(Arc::clone(&h.ctx), job).await;

    assert_eq!(
        states(&h.github),
        vec![StatusState::Pending, StatusState::Success]
    );
    let status = &h.github.statuses()[0];
    assert_eq!(status.status.context, "ci/build");
    assert_eq!(status.status.target_url, "http://ci.test/jobs/aaa111");
    assert_eq!(status.sha, "abc123");

    // registry is clean, the job dir is gone, artifacts and logs survive
    assert!(!h.ctx.registry.contains("aaa111"));
    assert!(!h.dir.path().join("jobs/aaa111").exists());
    assert!(h.dir.path().join("artifacts/aaa111").is_dir());
    assert!(h.dir.path().join("logs/aaa111").is_file());

    // the cache was committed to the primary
    assert!(h.dir.path().join("cache/org/widgets/build/branch-main").is_dir());

    // the task was killed, deleted, and its container removed
    assert_eq!(h.runtime.started(), vec!["job-aaa111".to_string()]);
    assert_eq!(h.runtime.killed(), vec!["job-aaa111".to_string()]);
    assert_eq!(h.runtime.removed_tasks(), vec!["job-aaa111".to_string()]);
    assert_eq!(h.runtime.removed_containers(), vec!["job-aaa111".to_string()]);
}

#[tokio::test]
async fn container_spec_carries_the_mount_set_and_identity() {
    let h = harness();
    let job = push_job("aaa111");

    run_job(Arc::clone(&h.ctx), job).await;

    let specs = h.runtime.specs();
    assert_eq!(specs.len(), 1);
    let spec = &specs[0];
    assert_eq!(spec.id, "job-aaa111");
    assert_eq!(spec.image, "test-image");
    assert_eq!(
        spec.command,
        vec!["/bin/bash", "-c", "./entrypoint.sh 2>&1"]
    );
    assert_eq!(spec.cwd, "/ci");
    assert_eq!(spec.user, "1000:1000");
    assert_eq!(spec.env, vec![("HOME".to_string(), "/ci".to_string())]);
    assert_eq!(spec.cgroup, "/bender-test/jobs/job-aaa111");
    assert!(spec.host_network);

    let targets: Vec<&str> = spec.mounts.iter().map(|m| m.target.as_str()).collect();
    assert_eq!(
        targets,
        vec!["/ci", "/ci/cache", "/ci/artifacts", "/etc/resolv.conf", "/ci/secrets"]
    );
    // without a sandbox the host resolv.conf is what gets bound, read-only
    let resolv = &spec.mounts[3];
    assert_eq!(resolv.source, std::path::PathBuf::from("/etc/resolv.conf"));
    assert!(resolv.read_only);
}

#[tokio::test]
async fn staged_home_contains_credentials_and_entrypoint() {
    let h = harness();
    let job = push_job("aaa111");

    let home = stage(h.ctx.as_ref(), &job, "tok123").unwrap();

    let netrc = std::fs::read_to_string(home.join(".netrc")).unwrap();
    assert_eq!(
        netrc,
        "machine github.com\nlogin x-access-token\npassword tok123"
    );

    let gitconfig = std::fs::read_to_string(home.join(".gitconfig")).unwrap();
    assert!(gitconfig.contains("defaultBranch = main"));
    assert!(gitconfig.contains("detachedHead = false"));

    let entrypoint = std::fs::read_to_string(home.join("entrypoint.sh")).unwrap();
    assert_eq!(
        entrypoint,
        "#!/bin/bash\nset -euxo pipefail\n\
         git clone -n https://github.com/org/widgets.git code\n\
         cd code\ngit checkout abc123\nexec .github/ci/build.sh\n"
    );

    let payload: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(home.join("job.json")).unwrap()).unwrap();
    assert_eq!(payload["id"], "aaa111");
    assert_eq!(payload["sha"], "abc123");

    use std::os::unix::fs::PermissionsExt;
    let mode = |name: &str| {
        std::fs::metadata(home.join(name)).unwrap().permissions().mode() & 0o777
    };
    assert_eq!(mode(".netrc"), 0o600);
    assert_eq!(mode("entrypoint.sh"), 0o700);
}

#[tokio::test]
async fn failing_task_posts_failure_and_still_commits() {
    let h = harness();
    h.runtime.set_exit_code(1);
    h.runtime.set_log_output("compiling...\nerror: boom\n");
    let job = push_job("bbb222");

    run_job(Arc::clone(&h.ctx), job).await;

    assert_eq!(
        states(&h.github),
        vec![StatusState::Pending, StatusState::Failure]
    );
    // the cache still committed, so the next run resumes incrementally
    assert!(h.dir.path().join("cache/org/widgets/build/branch-main").is_dir());

    let log = std::fs::read_to_string(h.dir.path().join("logs/bbb222")).unwrap();
    assert!(log.contains("error: boom"));
    assert!(log.contains("run failed: exited with code 1"));
    assert!(!h.ctx.registry.contains("bbb222"));
}

#[tokio::test]
async fn image_pull_failure_aborts_before_any_cache_work() {
    let h = harness();
    h.runtime.fail_at("pull");
    let mut job = push_job("ccc333");
    job.event.repo.name = "gadgets".to_string();
    // the image is configured but not present, forcing the pull
    let ctx = Arc::new(JobContext {
        config: Config {
            image: "missing-image".to_string(),
            ..h.ctx.config.clone()
        },
        github: h.github.clone(),
        runtime: h.runtime.clone(),
        cache: CacheManager::new(h.dir.path().to_path_buf(), CopySnapshotter::new()),
        registry: RunningJobs::new(),
        jobs_cgroup: "/bender-test/jobs".to_string(),
    });
    job.event.cache_tags = vec!["branch-main".to_string()];

    run_job(ctx, job).await;

    assert_eq!(
        states(&h.github),
        vec![StatusState::Pending, StatusState::Failure]
    );
    // no staging, no cache
    assert!(!h.dir.path().join("artifacts/ccc333").exists());
    assert!(!h.dir.path().join("cache/org/gadgets").exists());
    assert!(h.runtime.specs().is_empty());
}

#[tokio::test]
async fn container_create_failure_still_commits_the_cache() {
    let h = harness();
    h.runtime.fail_at("create");
    let job = push_job("ddd444");

    run_job(Arc::clone(&h.ctx), job).await;

    assert_eq!(
        states(&h.github),
        vec![StatusState::Pending, StatusState::Failure]
    );
    // provision ran, and the failure path still committed the snapshot
    assert!(h.dir.path().join("cache/org/widgets/build/branch-main").is_dir());
    assert!(!h.dir.path().join("jobs/ddd444").exists());
}

#[tokio::test]
async fn untrusted_jobs_get_no_secrets_and_no_custom_permissions() {
    let h = harness();
    let mut job = pr_job("eee555", false);
    job.permissions
        .insert("contents".to_string(), "write".to_string());
    job.permission_repos.push("other-repo".to_string());

    run_job(Arc::clone(&h.ctx), job).await;

    let spec = &h.runtime.specs()[0];
    assert!(spec.mounts.iter().all(|m| m.target != "/ci/secrets"));

    let requests = h.github.token_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].repositories, vec!["widgets".to_string()]);
    assert_eq!(
        requests[0].permissions.get("contents"),
        Some(&"read".to_string())
    );
    assert_eq!(
        requests[0].permissions.get("metadata"),
        Some(&"read".to_string())
    );
}

#[tokio::test]
async fn trusted_jobs_apply_custom_permissions_and_mount_secrets() {
    let h = harness();
    let mut job = push_job("fff666");
    job.permissions
        .insert("checks".to_string(), "write".to_string());
    job.permission_repos.push("other-repo".to_string());

    run_job(Arc::clone(&h.ctx), job).await;

    let spec = &h.runtime.specs()[0];
    let secrets = spec
        .mounts
        .iter()
        .find(|m| m.target == "/ci/secrets")
        .expect("secrets mount");
    assert_eq!(
        secrets.source,
        h.dir.path().join("secrets/org/widgets")
    );
    assert!(secrets.source.is_dir());

    let requests = h.github.token_requests();
    assert_eq!(
        requests[0].repositories,
        vec!["widgets".to_string(), "other-repo".to_string()]
    );
    assert_eq!(
        requests[0].permissions.get("checks"),
        Some(&"write".to_string())
    );
}

#[tokio::test]
async fn unknown_permission_fails_before_container_creation() {
    let h = harness();
    let mut job = push_job("abc987");
    job.permissions
        .insert("admin".to_string(), "write".to_string());

    run_job(Arc::clone(&h.ctx), job).await;

    assert_eq!(
        states(&h.github),
        vec![StatusState::Pending, StatusState::Failure]
    );
    assert!(h.runtime.specs().is_empty());
    assert!(h.github.token_requests().is_empty());

    let log = std::fs::read_to_string(h.dir.path().join("logs/abc987")).unwrap();
    assert!(log.contains("run failed: unknown permission: \"admin\""));
    assert!(!h.ctx.registry.contains("abc987"));
}

#[tokio::test]
async fn comment_md_is_posted_for_pull_requests() {
    let h = harness();
    h.runtime.write_on_start("/ci/comment.md", "### build report");
    let job = pr_job("ggg777", true);

    run_job(Arc::clone(&h.ctx), job).await;

    let comments = h.github.comments();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].number, 42);
    assert_eq!(comments[0].body, "### build report");
}

#[tokio::test]
async fn comment_md_is_ignored_for_pushes() {
    let h = harness();
    h.runtime.write_on_start("/ci/comment.md", "### build report");
    let job = push_job("hhh888");

    run_job(Arc::clone(&h.ctx), job).await;

    assert!(h.github.comments().is_empty());
}

#[tokio::test]
async fn pr_reruns_reuse_their_per_pr_primary() {
    let h = harness();
    h.runtime.write_on_start("/ci/cache/state.txt", "from-run-1");
    run_job(Arc::clone(&h.ctx), pr_job("run00001", true)).await;

    let primary = h.dir.path().join("cache/org/widgets/build/pr-42");
    assert_eq!(
        std::fs::read_to_string(primary.join("state.txt")).unwrap(),
        "from-run-1"
    );

    // second run provisions from the pr primary
    run_job(Arc::clone(&h.ctx), pr_job("run00002", true)).await;
    assert_eq!(
        std::fs::read_to_string(primary.join("state.txt")).unwrap(),
        "from-run-1"
    );
}
