//! Core tree type for kvtree
//!
//! This crate defines the in-memory data model shared by every other crate:
//! - Tree / Element: recursive, ordered key/value tree with head insertion
//! - KeyPath / PathSegment: typed paths for nested set/get
//! - Typed scalar helpers (ints, byte counts, checksums, doubles, strings)
//! - Text rendering in tree and key/value layouts
//! - Well-known keys used by the file layout
//! - TreeError: error type for value lookups

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod keys;
pub mod parse;
pub mod path;
pub mod print;
pub mod tree;
mod util;

pub use error::{Result, TreeError};
pub use path::{KeyPath, PathSegment};
pub use print::PrintMode;
pub use tree::{Element, SortDirection, Tree};
