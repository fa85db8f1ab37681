// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake container runtime for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ContainerRuntime, ContainerSpec, RuntimeError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::io::Write as _;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeRuntimeState {
    images: HashSet<String>,
    pulled: Vec<String>,
    specs: Vec<ContainerSpec>,
    started: Vec<String>,
    killed: Vec<String>,
    removed_tasks: Vec<String>,
    removed_containers: Vec<String>,
    exit_code: i64,
    log_output: String,
    /// (path inside the container, content) pairs written into the matching
    /// mount source when the task starts, emulating payload writes.
    writes_on_start: Vec<(String, String)>,
    fail_point: Option<&'static str>,
}

/// Fake runtime recording calls and simulating task exits
#[derive(Clone, Default)]
pub struct FakeRuntime {
    inner: Arc<Mutex<FakeRuntimeState>>,
}

/// Fake task handle carrying the simulated exit code
pub struct FakeTask {
    exit_code: i64,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed an image as already pulled
    pub fn add_image(&self, image: &str) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .images
            .insert(image.to_string());
    }

    /// Exit code the next task wait returns (default 0)
    pub fn set_exit_code(&self, code: i64) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).exit_code = code;
    }

    /// Text the task "writes" to its log when started
    pub fn set_log_output(&self, output: &str) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .log_output = output.to_string();
    }

    /// Write a file at a container path (resolved through the recorded
    /// mounts) when the task starts
    pub fn write_on_start(&self, container_path: &str, content: &str) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .writes_on_start
            .push((container_path.to_string(), content.to_string()));
    }

    /// Make one operation fail: `pull`, `create`, or `start`
    pub fn fail_at(&self, point: &'static str) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).fail_point = Some(point);
    }

    pub fn specs(&self) -> Vec<ContainerSpec> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .specs
            .clone()
    }

    pub fn pulled(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pulled
            .clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .started
            .clone()
    }

    pub fn killed(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .killed
            .clone()
    }

    pub fn removed_tasks(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .removed_tasks
            .clone()
    }

    pub fn removed_containers(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .removed_containers
            .clone()
    }

    fn check_fail(&self, point: &str) -> Result<(), RuntimeError> {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if state.fail_point == Some(point) {
            return Err(RuntimeError::CommandFailed {
                command: point.to_string(),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    type Task = FakeTask;

    async fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .images
            .contains(image))
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        self.check_fail("pull")?;
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.pulled.push(image.to_string());
        state.images.insert(image.to_string());
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        self.check_fail("create")?;
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .specs
            .push(spec.clone());
        Ok(())
    }

    async fn start(&self, id: &str, log_path: &Path) -> Result<Self::Task, RuntimeError> {
        self.check_fail("start")?;
        let (exit_code, log_output, writes, spec) = {
            let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            state.started.push(id.to_string());
            (
                state.exit_code,
                state.log_output.clone(),
                state.writes_on_start.clone(),
                state.specs.iter().find(|s| s.id == id).cloned(),
            )
        };

        if !log_output.is_empty() {
            let mut log = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?;
            log.write_all(log_output.as_bytes())?;
        }

        // Emulate the payload writing files into its mounts.
        if let Some(spec) = spec {
            for (container_path, content) in writes {
                let mount = spec
                    .mounts
                    .iter()
                    .filter(|m| {
                        container_path.starts_with(&format!("{}/", m.target))
                            || container_path == m.target
                    })
                    .max_by_key(|m| m.target.len());
                if let Some(mount) = mount {
                    let rest = container_path
                        .strip_prefix(&mount.target)
                        .unwrap_or("")
                        .trim_start_matches('/');
                    let dest = mount.source.join(rest);
                    if let Some(parent) = dest.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(dest, content)?;
                }
            }
        }

        Ok(FakeTask { exit_code })
    }

    async fn wait(&self, task: Self::Task) -> Result<i64, RuntimeError> {
        Ok(task.exit_code)
    }

    async fn kill(&self, id: &str) -> Result<(), RuntimeError> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .killed
            .push(id.to_string());
        Ok(())
    }

    async fn remove_task(&self, id: &str) -> Result<(), RuntimeError> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .removed_tasks
            .push(id.to_string());
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .removed_containers
            .push(id.to_string());
        Ok(())
    }
}
