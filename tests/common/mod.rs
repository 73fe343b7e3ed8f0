//! Shared test utilities for the integration suites.

#![allow(dead_code)]

use std::path::PathBuf;

pub use kvtree::{KeyPath, LocalGroup, Tree};
use tempfile::TempDir;

/// Temporary directory plus a file-set prefix inside it.
pub fn temp_prefix(name: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("create temp dir");
    let prefix = dir.path().join(name);
    (dir, prefix)
}

/// Per-rank record shaped like a checkpoint summary.
pub fn rank_record(rank: usize) -> Tree {
    let mut t = Tree::new();
    t.set_int("RANK", rank as i32);
    t.set_path(
        &KeyPath::root().key("FILE").key(format!("rank_{}.dat", rank)),
        Tree::new(),
    )
    .set_bytecount("SIZE", 1024 * (rank as u64 + 1));
    t.set_crc32("CRC", 0xdead_0000 | rank as u32);
    t
}
