// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake packet filter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Firewall, FirewallError};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeFirewallState {
    installs: Vec<(String, u32, Ipv4Addr)>,
    allowed: Vec<Ipv4Addr>,
}

/// Fake firewall recording the installed ruleset and the allow set
#[derive(Clone, Default)]
pub struct FakeFirewall {
    inner: Arc<Mutex<FakeFirewallState>>,
}

impl FakeFirewall {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn installs(&self) -> Vec<(String, u32, Ipv4Addr)> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .installs
            .clone()
    }

    pub fn allowed(&self) -> Vec<Ipv4Addr> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .allowed
            .clone()
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .allowed
            .contains(&ip)
    }
}

#[async_trait]
impl Firewall for FakeFirewall {
    async fn install(
        &self,
        jobs_cgroup: &str,
        level: u32,
        resolver_ip: Ipv4Addr,
    ) -> Result<(), FirewallError> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state
            .installs
            .push((jobs_cgroup.to_string(), level, resolver_ip));
        state.allowed.push(resolver_ip);
        Ok(())
    }

    async fn allow(&self, ip: Ipv4Addr) -> Result<(), FirewallError> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .allowed
            .push(ip);
        Ok(())
    }
}
