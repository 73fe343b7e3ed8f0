//! Collective file I/O for kvtree
//!
//! Every rank of a process group contributes one tree and the group writes
//! them as a hierarchical file set, or reads such a set back so that each
//! rank recovers its own tree:
//! - writer: segment-based writer election
//! - gather: recursive multi-level write
//! - scatter: recursive multi-level read
//!
//! The on-disk layout is shared with the single-process helpers in
//! `kvtree_durability::shard`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod gather;
pub mod scatter;
pub mod writer;

pub use error::{CollectiveError, Result};
pub use gather::{write_gather, write_gather_with};
pub use scatter::{read_scatter, read_scatter_with};
pub use writer::{pick_writer, WriterAssignment};
