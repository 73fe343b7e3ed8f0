//! Durability layer for kvtree
//!
//! This crate turns trees into bytes and bytes into files:
//! - codec: packed binary encoding of a tree
//! - format: persisted image with header and CRC32 trailer
//! - file: single-file read/write, plain and under advisory locks
//! - lock: `LockedFile` guard for read-modify-write
//! - io: retrying open/read/write primitives
//! - shard: root-plus-shards file sets written from one process
//! - config: I/O retry and gather sizing settings

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod error;
pub mod file;
pub mod format;
pub mod io;
pub mod lock;
pub mod shard;

pub use codec::{pack, pack_size, unpack, MAX_DEPTH};
pub use config::{ConfigError, GatherConfig, IoConfig, ENTRIES_PER_FILE_ENV};
pub use error::{CodecError, FileError, Result};
pub use file::{
    lock_open_read, read_at, read_file, read_file_at, read_from, read_with_lock, write_file,
    write_with_lock,
};
pub use format::{persist_size, read_persist, write_persist, FileHeader};
pub use lock::{LockMode, LockedFile};
pub use shard::{read_scatter_single, write_to_gather};
