// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! nftables packet-filter adapter.
//!
//! The ruleset is the public contract to system administrators: an
//! `inet bender` table with an `allow` set of IPv4 addresses, an output hook
//! routing jobs-cgroup traffic into a gated chain, and rejects (TCP reset,
//! otherwise host-prohibited) for everything not in the set.

use super::{Firewall, FirewallError};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Packet-filter adapter shelling out to `nft`
#[derive(Clone, Default)]
pub struct NftFirewall;

impl NftFirewall {
    pub fn new() -> Self {
        Self
    }
}

fn ruleset(jobs_cgroup: &str, level: u32, resolver_ip: Ipv4Addr) -> String {
    format!(
        r#"table inet bender
delete table inet bender

table inet bender {{
	set allow {{
		type ipv4_addr
		elements = {{ {resolver_ip} }}
	}}

	chain output {{
		type filter hook output priority 0; policy accept;
		socket cgroupv2 level {level} "{jobs_cgroup}" goto bender-output
	}}

	chain bender-output {{
		ip daddr @allow accept
		ip protocol tcp reject with tcp reset
		reject with icmp type host-prohibited
	}}
}}
"#
    )
}

#[async_trait]
impl Firewall for NftFirewall {
    async fn install(
        &self,
        jobs_cgroup: &str,
        level: u32,
        resolver_ip: Ipv4Addr,
    ) -> Result<(), FirewallError> {
        let script = ruleset(jobs_cgroup, level, resolver_ip);
        let mut child = Command::new("nft")
            .args(["-f", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(script.as_bytes()).await?;
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(FirewallError::CommandFailed {
                command: "nft -f -".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    async fn allow(&self, ip: Ipv4Addr) -> Result<(), FirewallError> {
        let ip = ip.to_string();
        let args = ["add", "element", "inet", "bender", "allow", "{", &ip, "}"];
        tracing::debug!(command = %format!("nft {}", args.join(" ")), "executing");
        let output = Command::new("nft").args(args).output().await?;
        if !output.status.success() {
            // additions race and repeat; failure here must not break resolution
            tracing::warn!(
                ip = %ip,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "failed to add allow-set element"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "nft_tests.rs"]
mod tests;
