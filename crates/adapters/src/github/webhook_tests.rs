// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[test]
fn valid_signature_verifies() {
    let body = br#"{"zen":"Design for failure."}"#;
    let header = sign("hunter2", body);
    assert!(verify_signature("hunter2", Some(&header), body));
}

#[test]
fn wrong_secret_or_body_fails() {
    let body = b"payload";
    let header = sign("hunter2", body);
    assert!(!verify_signature("other", Some(&header), body));
    assert!(!verify_signature("hunter2", Some(&header), b"tampered"));
}

#[test]
fn malformed_headers_fail_closed() {
    let body = b"payload";
    assert!(!verify_signature("hunter2", None, body));
    assert!(!verify_signature("hunter2", Some("sha1=abcd"), body));
    assert!(!verify_signature("hunter2", Some("sha256=zznothex"), body));
    assert!(!verify_signature("hunter2", Some(""), body));
}

#[test]
fn push_payload_decodes() {
    let body = serde_json::json!({
        "ref": "refs/heads/main",
        "head_commit": { "id": "abc123" },
        "repository": {
            "id": 1,
            "name": "widgets",
            "owner": { "login": "org" },
            "default_branch": "main",
            "clone_url": "https://github.com/org/widgets.git",
        },
        "installation": { "id": 7 },
    });
    let payload = parse_payload("push", body.to_string().as_bytes())
        .unwrap()
        .unwrap();
    let WebhookPayload::Push(push) = payload else {
        panic!("expected push payload");
    };
    assert_eq!(push.git_ref, "refs/heads/main");
    assert_eq!(push.head_commit.unwrap().id, "abc123");
    assert_eq!(push.repository.owner.login, "org");
}

#[test]
fn branch_deletion_has_no_head_commit() {
    let body = serde_json::json!({
        "ref": "refs/heads/gone",
        "head_commit": null,
        "repository": {
            "id": 1,
            "name": "widgets",
            "owner": { "login": "org" },
            "default_branch": "main",
            "clone_url": "https://github.com/org/widgets.git",
        },
        "installation": { "id": 7 },
    });
    let payload = parse_payload("push", body.to_string().as_bytes())
        .unwrap()
        .unwrap();
    let WebhookPayload::Push(push) = payload else {
        panic!("expected push payload");
    };
    assert!(push.head_commit.is_none());
}

#[test]
fn uninteresting_events_decode_to_none() {
    assert!(parse_payload("watch", b"{}").unwrap().is_none());
}
