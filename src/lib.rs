//! kvtree - recursive key/value trees with persistence and collective I/O
//!
//! A [`Tree`] is an ordered list of keyed elements, each owning a subtree.
//! Scalar values are stored as a key whose single child is the value.
//!
//! # Quick Start
//!
//! ```
//! use kvtree::Tree;
//!
//! let mut tree = Tree::new();
//! tree.set_kv("NAME", "ckpt");
//! tree.set_int("RANKS", 4);
//!
//! let bytes = kvtree::write_persist(&tree);
//! let mut back = Tree::new();
//! kvtree::read_persist(&bytes, &mut back).unwrap();
//! assert_eq!(back, tree);
//! ```
//!
//! # Architecture
//!
//! - `kvtree-core`: the tree, paths, typed helpers, printing
//! - `kvtree-durability`: binary codec, file format, locked file I/O,
//!   single-process shard sets
//! - `kvtree-exchange`: communicator trait, in-process groups, tree
//!   transfer and sparse all-to-all exchange
//! - `kvtree-collective`: gather/scatter of one tree per rank into a file
//!   set

pub use kvtree_core::*;

pub use kvtree_durability::{
    lock_open_read, pack, pack_size, persist_size, read_file, read_file_at, read_persist,
    read_scatter_single, read_with_lock, unpack, write_file, write_persist, write_to_gather,
    write_with_lock, CodecError, FileError, GatherConfig, IoConfig, LockMode, LockedFile,
};

pub use kvtree_exchange::{
    bcast, exchange, exchange_direction, exchange_direction_hops, recv, send, send_queue_insert,
    sendrecv, Communicator, Direction, ExchangeError, LocalComm, LocalGroup,
};

pub use kvtree_collective::{read_scatter, write_gather, CollectiveError};

/// Lower-level modules of each layer.
pub mod durability {
    pub use kvtree_durability::*;
}

/// Message passing primitives.
pub mod comm {
    pub use kvtree_exchange::*;
}

/// Gather/scatter internals.
pub mod collective {
    pub use kvtree_collective::*;
}
