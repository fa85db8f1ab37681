// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: the GitHub API, the container runtime,
//! filesystem snapshots, and the packet filter.

pub mod firewall;
pub mod github;
pub mod runtime;
pub mod snapshot;

pub use firewall::{Firewall, FirewallError, NftFirewall};
pub use github::{
    CommitStatus, Contents, DirEntry, GithubClient, GithubError, PullInfo, RestGithub,
    StatusState, TokenRequest,
};
pub use runtime::{ContainerRuntime, ContainerSpec, CtrRuntime, Mount, RuntimeError};
pub use snapshot::{BtrfsSnapshotter, CopySnapshotter, SnapshotError, Snapshotter};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use firewall::FakeFirewall;
#[cfg(any(test, feature = "test-support"))]
pub use github::{FakeGithub, RecordedComment, RecordedStatus};
#[cfg(any(test, feature = "test-support"))]
pub use runtime::FakeRuntime;
