// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! benderd: self-hosted CI executor daemon.
//!
//! Consumes repository webhooks, discovers per-commit job scripts, and runs
//! each one in an isolated, cached, sandboxed container.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod http;

use anyhow::Context as _;
use bender_adapters::{BtrfsSnapshotter, CtrRuntime, NftFirewall, RestGithub};
use bender_core::{Config, HexIdGen, RunningJobs};
use bender_engine::{
    sandbox, CacheGc, CacheManager, Cgroups, JobContext, NetSandbox, Pipeline, SystemResolver,
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Namespace jobs live under in the container runtime
const RUNTIME_NAMESPACE: &str = "bender";

const DATA_SUBDIRS: &[&str] = &["logs", "fifo", "cache", "jobs", "artifacts", "secrets"];

#[derive(Parser)]
#[command(name = "benderd", about = "Self-hosted CI executor")]
struct Args {
    /// Path to the configuration file
    #[arg(short = 'c', long = "config", default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging();

    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;

    for subdir in DATA_SUBDIRS {
        let path = config.data_dir.join(subdir);
        std::fs::create_dir_all(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
    }

    let cgroups = Cgroups::init().context("failed to set up cgroups")?;

    let github = RestGithub::new(config.github.app_id, config.github.private_key.clone());
    let runtime = CtrRuntime::new(RUNTIME_NAMESPACE, config.data_dir.join("fifo"));
    let snapshots = BtrfsSnapshotter::new();
    let registry = RunningJobs::new();

    let ctx = Arc::new(JobContext {
        github,
        runtime,
        cache: CacheManager::new(config.data_dir.clone(), snapshots.clone()),
        registry,
        jobs_cgroup: cgroups.jobs_path(),
        config: config.clone(),
    });

    if let Some(net_config) = &config.net_sandbox {
        sandbox::write_resolv_conf(&config.data_dir).context("failed to write resolv.conf")?;
        let net = NetSandbox::new(
            net_config.allowed_domains.clone(),
            NftFirewall::new(),
            SystemResolver,
        );
        let (selector, level) = cgroups.nft_selector();
        net.install_filter(&selector, level)
            .await
            .context("failed to install the packet filter")?;
        tokio::spawn(async move {
            if let Err(err) = net.run().await {
                tracing::error!(error = %err, "stub resolver failed");
            }
        });
    }

    let gc = CacheGc::new(
        config.data_dir.clone(),
        config.cache.min_free_space_mb,
        snapshots,
    );
    tokio::spawn(gc.run());

    let pipeline = Arc::new(Pipeline::new(Arc::clone(&ctx), HexIdGen));
    let app = http::router(http::AppState { ctx, pipeline });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "server started");
    axum::serve(listener, app).await.context("server failed")?;

    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
