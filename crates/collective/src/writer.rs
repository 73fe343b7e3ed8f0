//! Writer election.
//!
//! Ranks are laid end to end by the size of what they want written and the
//! resulting byte range is cut into fixed-size segments. The first rank
//! whose bytes run past the end of a segment opens the next one and becomes
//! the writer for every following rank up to the next opener. Rank 0 always
//! opens the first segment, even with nothing to write.

use byteorder::{BigEndian, ByteOrder};
use kvtree_exchange::{Communicator, ExchangeError};
use tracing::debug;

use crate::error::Result;

/// Outcome of writer election for one rank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterAssignment {
    /// Rank that writes this rank's data
    pub writer: usize,
    /// Ranks from `writer` up to and including this one
    pub segment_ranks: usize,
    /// Whether a single segment spans the whole group
    pub all_ranks: bool,
}

/// Running value of the segmented scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScanState {
    segments: u64,
    ranks: u64,
    writer: Option<usize>,
}

const SCAN_BYTES: usize = 24;

impl ScanState {
    fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; SCAN_BYTES];
        BigEndian::write_u64(&mut buf[0..8], self.segments);
        BigEndian::write_u64(&mut buf[8..16], self.ranks);
        BigEndian::write_u64(&mut buf[16..24], self.writer.map_or(0, |w| w as u64 + 1));
        buf
    }

    fn decode(buf: &[u8], peer: usize) -> std::result::Result<Self, ExchangeError> {
        if buf.len() != SCAN_BYTES {
            return Err(ExchangeError::Malformed {
                peer,
                reason: format!("scan message has {} bytes", buf.len()),
            });
        }
        let writer = BigEndian::read_u64(&buf[16..24]);
        Ok(ScanState {
            segments: BigEndian::read_u64(&buf[0..8]),
            ranks: BigEndian::read_u64(&buf[8..16]),
            writer: writer.checked_sub(1).map(|w| w as usize),
        })
    }

    /// Fold in the state of the ranks to our left. Once a writer is known
    /// the rank count stops growing.
    fn absorb(&mut self, left: ScanState) {
        self.segments += left.segments;
        if self.writer.is_none() {
            self.ranks += left.ranks;
            self.writer = left.writer;
        }
    }
}

/// Whether a rank holding `count` bytes starting at `offset` opens a new
/// segment.
pub fn starts_segment(rank: usize, offset: u64, count: u64, segment_size: u64) -> bool {
    if rank == 0 {
        return true;
    }
    if count == 0 {
        return false;
    }
    let segment_end = (offset / segment_size + 1) * segment_size - 1;
    offset + count - 1 > segment_end
}

/// Elect writers for a group where this rank has `count` bytes to write.
///
/// Collective: every rank must call it with the same `segment_size`.
pub fn pick_writer<C: Communicator + ?Sized>(
    comm: &C,
    count: u64,
    segment_size: u64,
) -> Result<WriterAssignment> {
    let rank = comm.rank();
    let size = comm.size();

    let offset = comm.exclusive_scan_sum(count)?;
    let opens = starts_segment(rank, offset, count, segment_size);
    let mut state = ScanState {
        segments: u64::from(opens),
        ranks: 1,
        writer: opens.then_some(rank),
    };

    let mut step = 1;
    while step < size {
        if rank + step < size {
            comm.send_bytes(rank + step, state.encode())?;
        }
        if rank >= step {
            let left = rank - step;
            state.absorb(ScanState::decode(&comm.recv_bytes(left)?, left)?);
        }
        step *= 2;
    }

    let writer = state.writer.ok_or_else(|| ExchangeError::Malformed {
        peer: rank,
        reason: "segmented scan found no writer".to_string(),
    })?;

    let last = size - 1;
    let mut flag = vec![u8::from(rank == last && state.ranks == size as u64)];
    comm.bcast_bytes(&mut flag, last)?;
    let all_ranks = flag.first().copied() == Some(1);

    debug!(
        target: "kvtree::collective",
        rank,
        writer,
        offset,
        count,
        all_ranks,
        "Picked writer"
    );

    Ok(WriterAssignment {
        writer,
        segment_ranks: state.ranks as usize,
        all_ranks,
    })
}
