// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container runtime adapter driving the containerd daemon through `ctr`.

use super::{ContainerRuntime, ContainerSpec, RuntimeError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};

const DEFAULT_ADDRESS: &str = "/run/containerd/containerd.sock";

/// Runtime adapter shelling out to `ctr` under a dedicated namespace
#[derive(Clone)]
pub struct CtrRuntime {
    address: String,
    namespace: String,
    /// Directory for the transient task I/O FIFOs.
    fifo_dir: PathBuf,
}

/// A started `ctr task start` child whose stdio is the job log
pub struct CtrTask {
    child: Child,
}

impl CtrRuntime {
    pub fn new(namespace: impl Into<String>, fifo_dir: impl Into<PathBuf>) -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            namespace: namespace.into(),
            fifo_dir: fifo_dir.into(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("ctr");
        cmd.arg("--address")
            .arg(&self.address)
            .arg("--namespace")
            .arg(&self.namespace);
        cmd.args(args);
        cmd
    }

    async fn run(&self, args: &[&str]) -> Result<String, RuntimeError> {
        tracing::debug!(command = %format!("ctr {}", args.join(" ")), "executing");
        let output = self.command(args).output().await?;
        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                command: format!("ctr {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl ContainerRuntime for CtrRuntime {
    type Task = CtrTask;

    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        let listing = self.run(&["images", "ls", "-q"]).await?;
        Ok(listing.lines().any(|line| line.trim() == image))
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        self.run(&["images", "pull", image]).await?;
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        let mut args: Vec<String> = vec!["containers".into(), "create".into()];

        for mount in &spec.mounts {
            let mut options = String::from("rbind");
            if mount.read_only {
                options.push_str(":ro");
            }
            args.push("--mount".into());
            args.push(format!(
                "type=bind,src={},dst={},options={}",
                mount.source.display(),
                mount.target,
                options
            ));
        }
        for (key, value) in &spec.env {
            args.push("--env".into());
            args.push(format!("{key}={value}"));
        }
        args.push("--cwd".into());
        args.push(spec.cwd.clone());
        args.push("--user".into());
        args.push(spec.user.clone());
        args.push("--cgroup".into());
        args.push(spec.cgroup.clone());
        if spec.host_network {
            args.push("--net-host".into());
        }

        args.push(spec.image.clone());
        args.push(spec.id.clone());
        args.extend(spec.command.iter().cloned());

        let borrowed: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&borrowed).await?;
        Ok(())
    }

    async fn start(&self, id: &str, log_path: &Path) -> Result<Self::Task, RuntimeError> {
        let log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        let log_err = log.try_clone()?;

        let child = self
            .command(&[
                "tasks",
                "start",
                "--fifo-dir",
                &self.fifo_dir.display().to_string(),
                id,
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()?;

        Ok(CtrTask { child })
    }

    async fn wait(&self, mut task: Self::Task) -> Result<i64, RuntimeError> {
        let status = task.child.wait().await?;
        Ok(i64::from(status.code().unwrap_or(-1)))
    }

    async fn kill(&self, id: &str) -> Result<(), RuntimeError> {
        self.run(&["tasks", "kill", "--signal", "SIGKILL", "--all", id])
            .await?;
        Ok(())
    }

    async fn remove_task(&self, id: &str) -> Result<(), RuntimeError> {
        self.run(&["tasks", "delete", id]).await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.run(&["containers", "delete", id]).await?;
        Ok(())
    }
}
