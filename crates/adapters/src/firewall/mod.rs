// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Packet-filter adapter

mod nft;

pub use nft::NftFirewall;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeFirewall;

use async_trait::async_trait;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Errors from packet-filter operations
#[derive(Debug, Error)]
pub enum FirewallError {
    #[error("command failed: {command}: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Adapter for the egress packet filter.
///
/// The installed ruleset confines traffic from the jobs cgroup to a dynamic
/// allow set of IPv4 addresses; the stub resolver feeds the set as it answers
/// queries.
#[async_trait]
pub trait Firewall: Clone + Send + Sync + 'static {
    /// Install the ruleset, idempotently (delete-then-create).
    ///
    /// `jobs_cgroup` is the cgroupfs path of the sandboxed group without a
    /// leading slash, `level` its component count, and `resolver_ip` is
    /// pre-seeded into the allow set.
    async fn install(
        &self,
        jobs_cgroup: &str,
        level: u32,
        resolver_ip: Ipv4Addr,
    ) -> Result<(), FirewallError>;

    /// Add one address to the allow set. Idempotent; best-effort.
    async fn allow(&self, ip: Ipv4Addr) -> Result<(), FirewallError>;
}
