//! Binary pack/unpack of trees.
//!
//! # Wire Format
//!
//! ```text
//! [u32 BE element_count]
//!   repeated element_count times:
//!     [key bytes][0x00]
//!     [packed subtree]
//! ```
//!
//! An empty tree packs as four zero bytes. Elements are written in list
//! order. [`unpack`] inserts each decoded element at the head, so a decoded
//! tree iterates in the reverse of on-disk order while holding the same
//! content.

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use kvtree_core::{Element, Tree};

use crate::error::CodecError;

const COUNT_SIZE: usize = 4;

/// Deepest subtree nesting [`unpack`] will decode.
pub const MAX_DEPTH: usize = 1024;

/// Number of bytes [`pack`] produces for `tree`.
pub fn pack_size(tree: &Tree) -> usize {
    tree.elements()
        .map(|e| e.key().len() + 1 + pack_size(e.tree()))
        .sum::<usize>()
        + COUNT_SIZE
}

/// Pack `tree` into a newly allocated buffer of exactly [`pack_size`] bytes.
pub fn pack(tree: &Tree) -> Vec<u8> {
    let mut buf = vec![0u8; pack_size(tree)];
    let written = pack_into(tree, &mut buf);
    debug_assert_eq!(written, buf.len());
    buf
}

/// Pack `tree` at the start of `buf`, returning the number of bytes written.
///
/// # Panics
///
/// Panics if `buf` is shorter than [`pack_size`]`(tree)`.
pub fn pack_into(tree: &Tree, buf: &mut [u8]) -> usize {
    BigEndian::write_u32(&mut buf[..COUNT_SIZE], tree.size() as u32);
    let mut pos = COUNT_SIZE;
    for elem in tree.elements() {
        let key = elem.key().as_bytes();
        buf[pos..pos + key.len()].copy_from_slice(key);
        pos += key.len();
        buf[pos] = 0;
        pos += 1;
        pos += pack_into(elem.tree(), &mut buf[pos..]);
    }
    pos
}

/// Decode a packed tree from the start of `buf`, inserting its elements at
/// the head of `tree`.
///
/// Returns the number of bytes consumed. On error `tree` may hold the
/// elements decoded before the failure.
pub fn unpack(buf: &[u8], tree: &mut Tree) -> Result<usize, CodecError> {
    let mut cursor = Cursor::new(buf);
    unpack_from(&mut cursor, tree, 0)?;
    Ok(cursor.position() as usize)
}

fn unpack_from(
    cursor: &mut Cursor<&[u8]>,
    tree: &mut Tree,
    depth: usize,
) -> Result<(), CodecError> {
    let offset = cursor.position() as usize;
    if depth > MAX_DEPTH {
        return Err(CodecError::TooDeep {
            offset,
            limit: MAX_DEPTH,
        });
    }
    let count = cursor
        .read_u32::<BigEndian>()
        .map_err(|_| CodecError::Truncated {
            offset,
            needed: COUNT_SIZE,
        })?;
    for _ in 0..count {
        let key = read_key(cursor)?;
        let mut subtree = Tree::new();
        unpack_from(cursor, &mut subtree, depth + 1)?;
        tree.push_front(Element::new(key, subtree));
    }
    Ok(())
}

fn read_key(cursor: &mut Cursor<&[u8]>) -> Result<String, CodecError> {
    let start = cursor.position() as usize;
    let rest = &cursor.get_ref()[start.min(cursor.get_ref().len())..];
    let len = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(CodecError::MissingTerminator { offset: start })?;
    let mut bytes = vec![0u8; len];
    cursor
        .read_exact(&mut bytes)
        .map_err(|_| CodecError::Truncated {
            offset: start,
            needed: len,
        })?;
    cursor.set_position((start + len + 1) as u64);
    String::from_utf8(bytes).map_err(|_| CodecError::InvalidKey { offset: start })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tree {
        let mut t = Tree::new();
        t.set_kv("RANKS", "3");
        t.set_kv("RANK", "0").set_kv("FILE", ".0.0");
        t
    }

    #[test]
    fn test_empty_tree_packs_as_zero_count() {
        let t = Tree::new();
        assert_eq!(pack_size(&t), 4);
        assert_eq!(pack(&t), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_single_leaf_layout() {
        let mut t = Tree::new();
        t.set("ab", Tree::new());
        let bytes = pack(&t);
        assert_eq!(bytes, vec![0, 0, 0, 1, b'a', b'b', 0, 0, 0, 0, 0]);
        assert_eq!(bytes.len(), pack_size(&t));
    }

    #[test]
    fn test_pack_size_matches_pack() {
        let t = sample();
        assert_eq!(pack(&t).len(), pack_size(&t));
    }

    #[test]
    fn test_roundtrip_content_equal() {
        let t = sample();
        let bytes = pack(&t);
        let mut out = Tree::new();
        let used = unpack(&bytes, &mut out).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(out, t);
    }

    #[test]
    fn test_unpack_reverses_order() {
        let mut t = Tree::new();
        t.set("a", Tree::new());
        t.set("b", Tree::new());
        t.set("c", Tree::new());
        let mut out = Tree::new();
        unpack(&pack(&t), &mut out).unwrap();
        let keys: Vec<&str> = out.keys().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unpack_preserves_duplicate_keys() {
        // two elements both named "k"
        let bytes = [0, 0, 0, 2, b'k', 0, 0, 0, 0, 0, b'k', 0, 0, 0, 0, 0];
        let mut out = Tree::new();
        unpack(&bytes, &mut out).unwrap();
        assert_eq!(out.size(), 2);
    }

    #[test]
    fn test_unpack_truncated_count() {
        let mut out = Tree::new();
        let err = unpack(&[0, 0], &mut out).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { offset: 0, .. }));
    }

    #[test]
    fn test_unpack_missing_terminator() {
        let bytes = [0, 0, 0, 1, b'a', b'b'];
        let mut out = Tree::new();
        let err = unpack(&bytes, &mut out).unwrap_err();
        assert!(matches!(err, CodecError::MissingTerminator { offset: 4 }));
    }

    #[test]
    fn test_unpack_truncated_subtree() {
        let bytes = [0, 0, 0, 1, b'a', 0, 0, 0];
        let mut out = Tree::new();
        let err = unpack(&bytes, &mut out).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { offset: 6, .. }));
    }

    #[test]
    fn test_unpack_invalid_utf8_key() {
        let bytes = [0, 0, 0, 1, 0xff, 0xfe, 0, 0, 0, 0, 0];
        let mut out = Tree::new();
        let err = unpack(&bytes, &mut out).unwrap_err();
        assert!(matches!(err, CodecError::InvalidKey { offset: 4 }));
    }

    fn nested(levels: usize) -> Vec<u8> {
        // each level is one element "a" whose subtree is the next level
        let mut bytes = Vec::with_capacity(levels * 6 + 4);
        for _ in 0..levels {
            bytes.extend_from_slice(&[0, 0, 0, 1, b'a', 0]);
        }
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes
    }

    #[test]
    fn test_unpack_accepts_max_depth() {
        let bytes = nested(MAX_DEPTH);
        let mut out = Tree::new();
        assert_eq!(unpack(&bytes, &mut out).unwrap(), bytes.len());
        assert_eq!(out.size(), 1);
    }

    #[test]
    fn test_unpack_rejects_excessive_nesting() {
        let bytes = nested(MAX_DEPTH + 1);
        let mut out = Tree::new();
        let err = unpack(&bytes, &mut out).unwrap_err();
        assert_eq!(
            err,
            CodecError::TooDeep {
                offset: (MAX_DEPTH + 1) * 6,
                limit: MAX_DEPTH,
            }
        );
    }

    #[test]
    fn test_unpack_rejects_deep_input_without_overflow() {
        let bytes = nested(200_000);
        let mut out = Tree::new();
        let err = unpack(&bytes, &mut out).unwrap_err();
        assert!(matches!(err, CodecError::TooDeep { .. }));
    }

    #[test]
    fn test_unpack_ignores_trailing_bytes() {
        let mut bytes = pack(&sample());
        let packed_len = bytes.len();
        bytes.extend_from_slice(&[1, 2, 3]);
        let mut out = Tree::new();
        assert_eq!(unpack(&bytes, &mut out).unwrap(), packed_len);
    }
}
