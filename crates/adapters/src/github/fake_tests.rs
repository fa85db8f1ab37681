// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::github::StatusState;

#[tokio::test]
async fn seeded_files_come_back_as_files() {
    let gh = FakeGithub::new();
    gh.add_file("org", "widgets", ".github/ci/build.sh", "## on push\n");

    let contents = gh
        .get_contents(1, "org", "widgets", ".github/ci/build.sh", "abc")
        .await
        .unwrap();
    let Contents::File(text) = contents else {
        panic!("expected a file");
    };
    assert_eq!(text, "## on push\n");
}

#[tokio::test]
async fn parent_paths_list_as_directories() {
    let gh = FakeGithub::new();
    gh.add_file("org", "widgets", ".github/ci/build.sh", "a");
    gh.add_file("org", "widgets", ".github/ci/test.sh", "b");
    gh.add_file("org", "widgets", ".github/ci/nested/deep.sh", "c");

    let contents = gh
        .get_contents(1, "org", "widgets", ".github/ci", "abc")
        .await
        .unwrap();
    let Contents::Dir(entries) = contents else {
        panic!("expected a directory");
    };
    let names: Vec<(&str, &str)> = entries
        .iter()
        .map(|e| (e.name.as_str(), e.kind.as_str()))
        .collect();
    assert_eq!(
        names,
        vec![("build.sh", "file"), ("nested", "dir"), ("test.sh", "file")]
    );
    assert_eq!(entries[0].path, ".github/ci/build.sh");
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let gh = FakeGithub::new();
    let err = gh
        .get_contents(1, "org", "widgets", ".github/ci", "abc")
        .await
        .unwrap_err();
    assert!(matches!(err, GithubError::NotFound));
}

#[tokio::test]
async fn writes_are_recorded() {
    let gh = FakeGithub::new();
    gh.create_status(
        1,
        "org",
        "widgets",
        "abc",
        &CommitStatus {
            state: StatusState::Pending,
            context: "ci/build".to_string(),
            target_url: "http://x/jobs/1".to_string(),
        },
    )
    .await
    .unwrap();
    gh.create_comment(1, "org", "widgets", 42, "hello").await.unwrap();

    assert_eq!(gh.statuses().len(), 1);
    assert_eq!(gh.comments()[0].number, 42);
}
