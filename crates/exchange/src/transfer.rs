//! Point-to-point and broadcast transfer of whole trees.
//!
//! A tree travels as two messages: its packed size as a big-endian `i32`,
//! then the packed bytes. Receivers clear their tree before decoding into
//! it.

use byteorder::{BigEndian, ByteOrder};
use kvtree_core::Tree;
use kvtree_durability::codec;

use crate::comm::Communicator;
use crate::error::{ExchangeError, Result};

/// Largest packed tree a single message may carry.
pub const MAX_MESSAGE_SIZE: usize = i32::MAX as usize;

/// Pack `tree` for sending.
///
/// # Panics
///
/// Panics if the packed size exceeds [`MAX_MESSAGE_SIZE`].
fn pack_checked(tree: &Tree, op: &str) -> Vec<u8> {
    let size = codec::pack_size(tree);
    if size > MAX_MESSAGE_SIZE {
        panic!(
            "{}: tree size {} is bigger than the maximum message size {}",
            op, size, MAX_MESSAGE_SIZE
        );
    }
    codec::pack(tree)
}

const HEADER_SIZE: usize = 4;

fn size_header(bytes: &[u8]) -> Vec<u8> {
    let mut header = vec![0u8; HEADER_SIZE];
    BigEndian::write_i32(&mut header, bytes.len() as i32);
    header
}

fn parse_size_header(header: &[u8], peer: usize) -> Result<usize> {
    if header.len() != HEADER_SIZE {
        return Err(ExchangeError::Malformed {
            peer,
            reason: format!("size header has {} bytes", header.len()),
        });
    }
    let size = BigEndian::read_i32(header);
    usize::try_from(size).map_err(|_| ExchangeError::Malformed {
        peer,
        reason: format!("negative size {}", size),
    })
}

fn decode_into(payload: &[u8], expected: usize, tree: &mut Tree, peer: usize) -> Result<()> {
    if payload.len() != expected {
        return Err(ExchangeError::Malformed {
            peer,
            reason: format!("expected {} bytes, got {}", expected, payload.len()),
        });
    }
    if expected > 0 {
        codec::unpack(payload, tree).map_err(|source| ExchangeError::Decode { peer, source })?;
    }
    Ok(())
}

/// Send `tree` to `dest`.
pub fn send<C: Communicator + ?Sized>(comm: &C, tree: &Tree, dest: usize) -> Result<()> {
    let bytes = pack_checked(tree, "send");
    comm.send_bytes(dest, size_header(&bytes))?;
    comm.send_bytes(dest, bytes)
}

/// Clear `tree` and fill it with a tree received from `src`.
pub fn recv<C: Communicator + ?Sized>(comm: &C, tree: &mut Tree, src: usize) -> Result<()> {
    tree.unset_all();
    let size = parse_size_header(&comm.recv_bytes(src)?, src)?;
    let payload = comm.recv_bytes(src)?;
    decode_into(&payload, size, tree, src)
}

/// Send `outgoing` to `dest` and receive into `incoming` from `src` in one
/// step. Either peer may be `None`; `incoming` is cleared only when a
/// source is given.
pub fn sendrecv<C: Communicator + ?Sized>(
    comm: &C,
    outgoing: &Tree,
    dest: Option<usize>,
    incoming: &mut Tree,
    src: Option<usize>,
) -> Result<()> {
    if let Some(dest) = dest {
        send(comm, outgoing, dest)?;
    }
    if let Some(src) = src {
        recv(comm, incoming, src)?;
    }
    Ok(())
}

/// Copy `tree` from `root` to every member. Non-roots clear their tree
/// before receiving.
pub fn bcast<C: Communicator + ?Sized>(comm: &C, tree: &mut Tree, root: usize) -> Result<()> {
    if comm.rank() == root {
        let bytes = pack_checked(tree, "bcast");
        let mut header = size_header(&bytes);
        comm.bcast_bytes(&mut header, root)?;
        let mut payload = bytes;
        comm.bcast_bytes(&mut payload, root)
    } else {
        tree.unset_all();
        let mut header = Vec::new();
        comm.bcast_bytes(&mut header, root)?;
        let size = parse_size_header(&header, root)?;
        let mut payload = Vec::new();
        comm.bcast_bytes(&mut payload, root)?;
        decode_into(&payload, size, tree, root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalGroup;

    fn sample() -> Tree {
        let mut t = Tree::new();
        t.set_kv("NAME", "payload");
        t.set_kv("RANK", "3").set_kv("FILE", ".0.3");
        t
    }

    #[test]
    fn test_send_recv() {
        let results = LocalGroup::run(2, |comm| {
            let mut t = Tree::new();
            if comm.rank() == 0 {
                send(comm, &sample(), 1).unwrap();
            } else {
                t.set_kv("STALE", "x");
                recv(comm, &mut t, 0).unwrap();
            }
            t
        });
        assert_eq!(results[1], sample());
    }

    #[test]
    fn test_sendrecv_ring() {
        let n = 4;
        let results = LocalGroup::run(n, |comm| {
            let rank = comm.rank();
            let mut out = Tree::new();
            out.set_kv_int("FROM", rank as i64);
            let mut incoming = Tree::new();
            sendrecv(
                comm,
                &out,
                Some((rank + 1) % n),
                &mut incoming,
                Some((rank + n - 1) % n),
            )
            .unwrap();
            incoming
        });
        for (rank, t) in results.iter().enumerate() {
            let from = ((rank + n - 1) % n) as i64;
            assert!(t.get_kv_int("FROM", from).is_some());
        }
    }

    #[test]
    fn test_sendrecv_null_peers() {
        let results = LocalGroup::run(2, |comm| {
            let mut incoming = Tree::new();
            incoming.set_kv("KEEP", "me");
            if comm.rank() == 0 {
                sendrecv(comm, &sample(), Some(1), &mut incoming, None).unwrap();
            } else {
                sendrecv(comm, &Tree::new(), None, &mut incoming, Some(0)).unwrap();
            }
            incoming
        });
        assert!(results[0].get_kv("KEEP", "me").is_some());
        assert_eq!(results[1], sample());
    }

    #[test]
    fn test_bcast_replaces_non_root_trees() {
        let results = LocalGroup::run(3, |comm| {
            let mut t = Tree::new();
            if comm.rank() == 1 {
                t = sample();
            } else {
                t.set_kv("OLD", "x");
            }
            bcast(comm, &mut t, 1).unwrap();
            t
        });
        for t in results {
            assert_eq!(t, sample());
        }
    }

    #[test]
    fn test_empty_tree_transfer() {
        let results = LocalGroup::run(2, |comm| {
            let mut t = Tree::new();
            t.set_kv("OLD", "x");
            if comm.rank() == 0 {
                send(comm, &Tree::new(), 1).unwrap();
            } else {
                recv(comm, &mut t, 0).unwrap();
            }
            t
        });
        assert!(results[1].is_empty());
    }

    #[test]
    fn test_size_header() {
        assert_eq!(size_header(&[0u8; 258]), vec![0, 0, 1, 2]);
        assert_eq!(parse_size_header(&[0, 0, 1, 2], 0).unwrap(), 258);
        assert!(parse_size_header(&[0xff, 0, 0, 0], 0).is_err());
        assert!(parse_size_header(&[0, 0], 0).is_err());
    }
}
