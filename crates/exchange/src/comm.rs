//! Process-group abstraction.
//!
//! A [`Communicator`] is one member of a fixed group of ranks `0..size`.
//! Implementations supply point-to-point byte messaging; the collectives
//! (broadcast, reductions, scan, barrier) are provided on top of it.
//!
//! # Contract
//!
//! - `send_bytes` is buffered: it returns without waiting for the matching
//!   receive, so a rank may send and then receive in the same step.
//! - Messages between a given source and destination arrive in the order
//!   they were sent.
//! - Every member calls the same collectives in the same order.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{ExchangeError, Result};

/// Reduction applied by [`Communicator::allreduce`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// Sum of all contributions
    Sum,
    /// Maximum contribution
    Max,
    /// Logical AND, with nonzero meaning true
    And,
}

impl ReduceOp {
    fn apply(self, a: u64, b: u64) -> u64 {
        match self {
            ReduceOp::Sum => a.wrapping_add(b),
            ReduceOp::Max => a.max(b),
            ReduceOp::And => u64::from(a != 0 && b != 0),
        }
    }
}

const ROOT: usize = 0;

fn encode_u64s(values: &[u64]) -> Vec<u8> {
    let mut bytes = vec![0u8; values.len() * 8];
    BigEndian::write_u64_into(values, &mut bytes);
    bytes
}

fn decode_u64s(bytes: &[u8], expected: usize, peer: usize) -> Result<Vec<u64>> {
    if bytes.len() != expected * 8 {
        return Err(ExchangeError::Malformed {
            peer,
            reason: format!("expected {} values, got {} bytes", expected, bytes.len()),
        });
    }
    let mut values = vec![0u64; expected];
    BigEndian::read_u64_into(bytes, &mut values);
    Ok(values)
}

/// One member of a process group
pub trait Communicator {
    /// This member's rank.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn size(&self) -> usize;

    /// Queue `data` for delivery to `dest` without waiting for it.
    fn send_bytes(&self, dest: usize, data: Vec<u8>) -> Result<()>;

    /// Receive the next message sent by `src`, blocking until it arrives.
    fn recv_bytes(&self, src: usize) -> Result<Vec<u8>>;

    /// Check that `rank` names a member of the group.
    fn check_rank(&self, rank: i64) -> Result<usize> {
        if rank < 0 || rank as u64 >= self.size() as u64 {
            return Err(ExchangeError::InvalidRank {
                rank,
                size: self.size(),
            });
        }
        Ok(rank as usize)
    }

    /// Copy `data` from `root` to every member; non-roots overwrite theirs.
    fn bcast_bytes(&self, data: &mut Vec<u8>, root: usize) -> Result<()> {
        self.check_rank(root as i64)?;
        if self.rank() == root {
            for dest in (0..self.size()).filter(|&r| r != root) {
                self.send_bytes(dest, data.clone())?;
            }
        } else {
            *data = self.recv_bytes(root)?;
        }
        Ok(())
    }

    /// Element-wise reduction of `values` across the group; every member
    /// gets the result.
    fn allreduce(&self, values: &[u64], op: ReduceOp) -> Result<Vec<u64>> {
        let mut result = values.to_vec();
        if self.rank() == ROOT {
            for src in 1..self.size() {
                let theirs = decode_u64s(&self.recv_bytes(src)?, values.len(), src)?;
                for (acc, v) in result.iter_mut().zip(theirs) {
                    *acc = op.apply(*acc, v);
                }
            }
        } else {
            self.send_bytes(ROOT, encode_u64s(values))?;
        }
        let mut bytes = encode_u64s(&result);
        self.bcast_bytes(&mut bytes, ROOT)?;
        decode_u64s(&bytes, values.len(), ROOT)
    }

    /// Maximum of `value` across the group.
    fn allreduce_max(&self, value: u64) -> Result<u64> {
        Ok(self.allreduce(&[value], ReduceOp::Max)?[0])
    }

    /// Whether `flag` is true on every member.
    fn all_true(&self, flag: bool) -> Result<bool> {
        Ok(self.allreduce(&[u64::from(flag)], ReduceOp::And)?[0] != 0)
    }

    /// Sum of `value` over all lower ranks (0 on rank 0).
    fn exclusive_scan_sum(&self, value: u64) -> Result<u64> {
        if self.rank() == ROOT {
            let mut running = value;
            for dest in 1..self.size() {
                let theirs = decode_u64s(&self.recv_bytes(dest)?, 1, dest)?[0];
                self.send_bytes(dest, encode_u64s(&[running]))?;
                running = running.wrapping_add(theirs);
            }
            Ok(0)
        } else {
            self.send_bytes(ROOT, encode_u64s(&[value]))?;
            Ok(decode_u64s(&self.recv_bytes(ROOT)?, 1, ROOT)?[0])
        }
    }

    /// Block until every member has reached the barrier.
    fn barrier(&self) -> Result<()> {
        self.allreduce(&[], ReduceOp::Sum).map(|_| ())
    }
}
