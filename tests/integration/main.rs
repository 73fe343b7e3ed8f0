//! Cross-crate integration tests for kvtree.

#[path = "../common/mod.rs"]
mod common;

mod checkpoint;
mod persistence;
