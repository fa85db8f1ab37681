// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn hex_ids_are_twelve_lowercase_hex_chars() {
    let gen = HexIdGen;
    for _ in 0..32 {
        let id = gen.next();
        assert_eq!(id.len(), 12);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}

#[test]
fn hex_ids_do_not_repeat_in_practice() {
    let gen = HexIdGen;
    let ids: std::collections::HashSet<String> = (0..64).map(|_| gen.next()).collect();
    assert_eq!(ids.len(), 64);
}

#[test]
fn sequential_ids_count_up() {
    let gen = SequentialIdGen::new("job");
    assert_eq!(gen.next(), "job1");
    assert_eq!(gen.next(), "job2");

    // clones share the counter
    let clone = gen.clone();
    assert_eq!(clone.next(), "job3");
}
