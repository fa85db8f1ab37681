// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Egress network sandbox.
//!
//! Two cooperating parts: a packet-filter ruleset that confines traffic from
//! the jobs cgroup to a dynamic allow set, and a stub DNS resolver on a
//! loopback address that checks each query against the configured domain
//! patterns and injects every answer address into the allow set before
//! returning it. Jobs can only reach addresses they resolved through us.

use crate::error::SandboxError;
use async_trait::async_trait;
use bender_adapters::Firewall;
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{RData, Record, RecordType};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use tokio::net::UdpSocket;

/// Loopback address the stub resolver listens on
pub const RESOLVER_IP: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 93);
pub const RESOLVER_PORT: u16 = 53;

const ANSWER_TTL: u32 = 60;

/// Match a domain against an allow-list pattern.
///
/// `example.com` matches exactly that host; `*.example.com` matches both
/// `example.com` and any direct subdomain. Trailing dots are normalised on
/// both sides.
pub fn domain_matches(domain: &str, pattern: &str) -> bool {
    let mut pattern = pattern.to_string();
    if !pattern.ends_with('.') {
        pattern.push('.');
    }
    let mut domain = domain.to_string();
    if !domain.ends_with('.') {
        domain.push('.');
    }

    if domain == pattern {
        return true;
    }
    if format!("*.{domain}") == pattern {
        return true;
    }
    pattern.starts_with("*.") && domain.ends_with(&pattern[1..])
}

/// Upstream host resolution seam
#[async_trait]
pub trait HostResolver: Clone + Send + Sync + 'static {
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>>;
}

/// Resolves through the host's own resolver
#[derive(Clone, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0u16)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Write the resolv.conf jobs get bind-mounted over `/etc/resolv.conf`
pub fn write_resolv_conf(data_dir: &Path) -> std::io::Result<()> {
    std::fs::write(
        data_dir.join("resolv.conf"),
        format!("nameserver {RESOLVER_IP}\n"),
    )
}

/// The stub resolver plus its firewall feed
#[derive(Clone)]
pub struct NetSandbox<F, R = SystemResolver> {
    allowed_domains: Vec<String>,
    firewall: F,
    resolver: R,
}

impl<F: Firewall, R: HostResolver> NetSandbox<F, R> {
    pub fn new(allowed_domains: Vec<String>, firewall: F, resolver: R) -> Self {
        Self {
            allowed_domains,
            firewall,
            resolver,
        }
    }

    pub fn domain_allowed(&self, domain: &str) -> bool {
        self.allowed_domains
            .iter()
            .any(|pattern| domain_matches(domain, pattern))
    }

    /// Install the packet-filter ruleset (idempotent, delete-then-create)
    pub async fn install_filter(&self, jobs_cgroup: &str, level: u32) -> Result<(), SandboxError> {
        self.firewall.install(jobs_cgroup, level, RESOLVER_IP).await?;
        Ok(())
    }

    /// Serve DNS queries for the life of the process
    pub async fn run(self) -> Result<(), SandboxError> {
        let socket = UdpSocket::bind((RESOLVER_IP, RESOLVER_PORT)).await?;
        tracing::info!(addr = %format!("{RESOLVER_IP}:{RESOLVER_PORT}"), "stub resolver listening");

        let mut buf = [0u8; 4096];
        loop {
            let (len, peer) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(err) => {
                    tracing::warn!(error = %err, "resolver receive failed");
                    continue;
                }
            };
            if let Some(response) = self.handle_packet(&buf[..len]).await {
                if let Err(err) = socket.send_to(&response, peer).await {
                    tracing::warn!(error = %err, "resolver send failed");
                }
            }
        }
    }

    /// Handle one raw DNS packet; `None` drops it without a reply
    pub async fn handle_packet(&self, packet: &[u8]) -> Option<Vec<u8>> {
        let request = match Message::from_vec(packet) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, "undecodable dns packet");
                return None;
            }
        };

        let mut response = Message::new();
        response.set_id(request.id());
        response.set_message_type(MessageType::Response);
        response.set_op_code(request.op_code());
        response.set_recursion_desired(request.recursion_desired());
        response.set_recursion_available(true);
        response.add_queries(request.queries().to_vec());

        if request.op_code() == OpCode::Query {
            self.answer(&request, &mut response).await;
        }

        match response.to_vec() {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode dns response");
                None
            }
        }
    }

    async fn answer(&self, request: &Message, response: &mut Message) {
        for query in request.queries() {
            if query.query_type() != RecordType::A {
                continue;
            }
            let name = query.name().to_utf8();
            tracing::info!(name = %name, "dns query");

            if !self.domain_allowed(&name) {
                tracing::warn!(name = %name, "domain not allowed");
                response.set_response_code(ResponseCode::NXDomain);
                return;
            }

            let ips = match self.resolver.lookup(&name).await {
                Ok(ips) => ips,
                Err(err) => {
                    tracing::warn!(name = %name, error = %err, "host lookup failed");
                    response.set_response_code(ResponseCode::ServFail);
                    return;
                }
            };

            for ip in ips {
                let IpAddr::V4(v4) = ip else {
                    // the allow set holds IPv4 only
                    continue;
                };
                if let Err(err) = self.firewall.allow(v4).await {
                    tracing::warn!(ip = %v4, error = %err, "failed to admit address");
                }
                response.add_answer(Record::from_rdata(
                    query.name().clone(),
                    ANSWER_TTL,
                    RData::A(A(v4)),
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
