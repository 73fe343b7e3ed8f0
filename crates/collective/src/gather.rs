//! Collective write of one tree per rank into a file set.
//!
//! Payloads are sent left to elected writers, which persist them as level 0
//! shards. The writers then describe their shards (`FILE`, `OFFSET`) and
//! those descriptors are gathered the same way into level 1 maps, and so on
//! until one writer covers the whole group and writes the root at the bare
//! prefix.

use std::path::Path;

use kvtree_core::keys::{FILE, LEVEL, OFFSET, RANK, RANKS};
use kvtree_core::Tree;
use kvtree_durability::config::{GatherConfig, IoConfig};
use kvtree_durability::file::write_file_with;
use kvtree_durability::pack_size;
use kvtree_durability::shard::{shard_suffix, with_suffix};
use kvtree_exchange::{exchange_direction, send_queue_insert, Communicator, Direction};
use tracing::{debug, error};

use crate::error::{CollectiveError, LocalStatus, Result};
use crate::writer::pick_writer;

const OPERATION: &str = "write_gather";

/// Write this rank's `data` into the file set at `prefix`.
///
/// Collective: every rank of `comm` must call it. Succeeds only if every
/// rank's part of the write succeeded.
pub fn write_gather<C: Communicator + ?Sized>(
    prefix: impl AsRef<Path>,
    data: &Tree,
    comm: &C,
) -> Result<()> {
    write_gather_with(
        prefix,
        data,
        comm,
        &GatherConfig::default(),
        &IoConfig::default(),
    )
}

/// [`write_gather`] with explicit settings.
pub fn write_gather_with<C: Communicator + ?Sized>(
    prefix: impl AsRef<Path>,
    data: &Tree,
    comm: &C,
    config: &GatherConfig,
    io: &IoConfig,
) -> Result<()> {
    config.validate().map_err(kvtree_durability::FileError::from)?;
    let mut gather = Gather {
        comm,
        prefix: prefix.as_ref(),
        config,
        io,
        status: LocalStatus::default(),
    };
    gather.run(data)?;
    gather.status.agree(comm, OPERATION)
}

struct Gather<'a, C: ?Sized> {
    comm: &'a C,
    prefix: &'a Path,
    config: &'a GatherConfig,
    io: &'a IoConfig,
    status: LocalStatus,
}

impl<C: Communicator + ?Sized> Gather<'_, C> {
    fn run(&mut self, data: &Tree) -> Result<()> {
        let rank = self.comm.rank();
        let assignment = pick_writer(self.comm, pack_size(data) as u64, self.config.segment_size)?;

        let mut send = Tree::new();
        send_queue_insert(&mut send, assignment.writer, data);
        let mut received = Tree::new();
        exchange_direction(self.comm, &send, &mut received, Direction::Left)?;

        let is_writer = rank == assignment.writer;
        let suffix = shard_suffix(0, assignment.writer as u64);
        self.write_map(&suffix, 0, 1, is_writer)?;

        if is_writer {
            debug!(
                target: "kvtree::collective",
                shard = %suffix,
                ranks = received.size(),
                "Writing data shard"
            );
            self.persist(&suffix, 0, received);
        }
        Ok(())
    }

    /// Gather the descriptor of `file` (when `valid`) into a level `level`
    /// map, recursing upward until one map covers every rank.
    fn write_map(&mut self, file: &str, offset: u64, level: u32, valid: bool) -> Result<()> {
        if offset != 0 {
            let path = with_suffix(self.prefix, file);
            error!(
                target: "kvtree::collective",
                path = %path.display(),
                offset,
                "Map offset must be zero"
            );
            return Err(CollectiveError::NonZeroOffset { path, offset });
        }

        let rank = self.comm.rank();
        let mut descriptor = Tree::new();
        let count = if valid {
            descriptor.set_str(FILE, file);
            descriptor.set_bytecount(OFFSET, offset);
            pack_size(&descriptor) as u64
        } else {
            0
        };

        let assignment = pick_writer(self.comm, count, self.config.segment_size)?;

        let mut send = Tree::new();
        if valid {
            send_queue_insert(&mut send, assignment.writer, &descriptor);
        }
        let mut received = Tree::new();
        exchange_direction(self.comm, &send, &mut received, Direction::Left)?;

        let is_writer = rank == assignment.writer;
        let suffix = if assignment.all_ranks {
            String::new()
        } else {
            shard_suffix(level, assignment.writer as u64)
        };

        if !assignment.all_ranks {
            self.write_map(&suffix, 0, level + 1, is_writer)?;
        }

        if is_writer {
            debug!(
                target: "kvtree::collective",
                level,
                map = %with_suffix(self.prefix, &suffix).display(),
                entries = received.size(),
                "Writing map"
            );
            self.persist(&suffix, level, received);
        }
        Ok(())
    }

    /// Write `RANK` entries with the level and group size next to them.
    fn persist(&mut self, suffix: &str, level: u32, entries: Tree) {
        let mut save = Tree::new();
        save.set(RANK, entries);
        save.set_int(LEVEL, level as i32);
        save.set_int(RANKS, self.comm.size() as i32);

        let path = with_suffix(self.prefix, suffix);
        let result = write_file_with(&path, &save, self.io)
            .map(|_| ())
            .map_err(CollectiveError::from);
        self.status.record(result);
    }
}
