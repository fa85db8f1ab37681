// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bender_adapters::FakeFirewall;
use hickory_proto::op::Query;
use hickory_proto::rr::Name;
use std::collections::HashMap;
use std::sync::Arc;

#[test]
fn exact_patterns_match_only_themselves() {
    assert!(domain_matches("example.com", "example.com"));
    assert!(domain_matches("example.com.", "example.com"));
    assert!(domain_matches("example.com", "example.com."));
    assert!(!domain_matches("foo.example.com", "example.com"));
    assert!(!domain_matches("evilexample.com", "example.com"));
    assert!(!domain_matches("example.com.evil", "example.com"));
}

#[test]
fn wildcard_patterns_match_the_apex_and_direct_subdomains() {
    assert!(domain_matches("example.com", "*.example.com"));
    assert!(domain_matches("foo.example.com", "*.example.com"));
    assert!(domain_matches("x.example.com.", "*.example.com"));
    assert!(!domain_matches("evilexample.com", "*.example.com"));
    assert!(!domain_matches("example.com.evil", "*.example.com"));
}

#[derive(Clone, Default)]
struct FakeResolver {
    hosts: Arc<HashMap<String, Vec<IpAddr>>>,
    fail: bool,
}

impl FakeResolver {
    fn with(host: &str, ips: Vec<IpAddr>) -> Self {
        Self {
            hosts: Arc::new(HashMap::from([(host.to_string(), ips)])),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            hosts: Arc::new(HashMap::new()),
            fail: true,
        }
    }
}

#[async_trait]
impl HostResolver for FakeResolver {
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        if self.fail {
            return Err(std::io::Error::other("injected lookup failure"));
        }
        Ok(self.hosts.get(host).cloned().unwrap_or_default())
    }
}

fn a_query(name: &str) -> Vec<u8> {
    let mut message = Message::new();
    message.set_id(42);
    message.set_message_type(MessageType::Query);
    message.set_op_code(OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(Query::query(Name::from_utf8(name).unwrap(), RecordType::A));
    message.to_vec().unwrap()
}

fn answer_ips(response: &Message) -> Vec<Ipv4Addr> {
    response
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            Some(RData::A(a)) => Some(a.0),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn allowed_queries_answer_and_admit_addresses() {
    let firewall = FakeFirewall::new();
    let ip = Ipv4Addr::new(140, 82, 121, 3);
    let sandbox = NetSandbox::new(
        vec!["github.com".to_string()],
        firewall.clone(),
        FakeResolver::with("github.com.", vec![IpAddr::V4(ip)]),
    );

    let reply = sandbox.handle_packet(&a_query("github.com.")).await.unwrap();
    let response = Message::from_vec(&reply).unwrap();

    assert_eq!(response.id(), 42);
    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert_eq!(answer_ips(&response), vec![ip]);
    assert!(firewall.contains(ip));
}

#[tokio::test]
async fn disallowed_queries_get_nxdomain() {
    let firewall = FakeFirewall::new();
    let sandbox = NetSandbox::new(
        vec!["github.com".to_string()],
        firewall.clone(),
        FakeResolver::with("evil.example.", vec![IpAddr::V4(Ipv4Addr::new(6, 6, 6, 6))]),
    );

    let reply = sandbox.handle_packet(&a_query("evil.example.")).await.unwrap();
    let response = Message::from_vec(&reply).unwrap();

    assert_eq!(response.response_code(), ResponseCode::NXDomain);
    assert!(response.answers().is_empty());
    assert!(firewall.allowed().is_empty());
}

#[tokio::test]
async fn lookup_failures_get_servfail() {
    let sandbox = NetSandbox::new(
        vec!["github.com".to_string()],
        FakeFirewall::new(),
        FakeResolver::failing(),
    );

    let reply = sandbox.handle_packet(&a_query("github.com.")).await.unwrap();
    let response = Message::from_vec(&reply).unwrap();
    assert_eq!(response.response_code(), ResponseCode::ServFail);
}

#[tokio::test]
async fn ipv6_answers_are_not_admitted() {
    let firewall = FakeFirewall::new();
    let v4 = Ipv4Addr::new(140, 82, 121, 3);
    let sandbox = NetSandbox::new(
        vec!["github.com".to_string()],
        firewall.clone(),
        FakeResolver::with(
            "github.com.",
            vec![
                IpAddr::V6("2606:50c0::1".parse().unwrap()),
                IpAddr::V4(v4),
            ],
        ),
    );

    let reply = sandbox.handle_packet(&a_query("github.com.")).await.unwrap();
    let response = Message::from_vec(&reply).unwrap();

    assert_eq!(answer_ips(&response), vec![v4]);
    assert_eq!(firewall.allowed(), vec![v4]);
}

#[tokio::test]
async fn garbage_packets_are_dropped() {
    let sandbox = NetSandbox::new(
        vec!["github.com".to_string()],
        FakeFirewall::new(),
        FakeResolver::default(),
    );
    assert!(sandbox.handle_packet(&[0xff, 0x00, 0x01]).await.is_none());
}
