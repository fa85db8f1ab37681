// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration, loaded from a YAML file at startup.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Top-level daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Data directory; must sit on a snapshotting filesystem.
    pub data_dir: PathBuf,
    /// Public base URL used in status target links.
    pub external_url: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Container image jobs run in.
    pub image: String,
    /// Egress sandbox; absent disables it.
    #[serde(default)]
    pub net_sandbox: Option<NetSandboxConfig>,
    pub github: GithubConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetSandboxConfig {
    /// Domain patterns jobs may resolve: `example.com` or `*.example.com`.
    pub allowed_domains: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    pub webhook_secret: String,
    pub app_id: u64,
    /// PEM-encoded app private key.
    pub private_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_min_free_space_mb")]
    pub min_free_space_mb: u64,
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            min_free_space_mb: default_min_free_space_mb(),
            max_size_mb: default_max_size_mb(),
        }
    }
}

fn default_listen_port() -> u16 {
    8000
}

fn default_min_free_space_mb() -> u64 {
    20480
}

fn default_max_size_mb() -> u64 {
    40960
}

impl Config {
    /// Load and validate configuration from a YAML file.
    ///
    /// The data directory is made absolute so later chdir-independent path
    /// joins are stable.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.data_dir =
            std::path::absolute(&config.data_dir).map_err(|source| ConfigError::Read {
                path: config.data_dir.clone(),
                source,
            })?;
        Ok(config)
    }

    /// Whether the egress network sandbox is configured.
    pub fn sandboxed(&self) -> bool {
        self.net_sandbox.is_some()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
