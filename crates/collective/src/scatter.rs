//! Collective read of a file set written by [`write_gather`].
//!
//! Rank 0 reads the root map and hands each descriptor to the writer that
//! produced it. Those ranks read the next level down and do the same until
//! the level 0 shards are reached, then every shard reader sends each rank
//! its own payload.
//!
//! [`write_gather`]: crate::gather::write_gather

use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder};
use kvtree_core::keys::{FILE, LEVEL, OFFSET, RANK, RANKS};
use kvtree_core::Tree;
use kvtree_durability::config::IoConfig;
use kvtree_durability::file::read_file_at_with;
use kvtree_durability::shard::with_suffix;
use kvtree_durability::FileError;
use kvtree_exchange::{exchange_direction, Communicator, Direction};
use tracing::{debug, error};

use crate::error::{CollectiveError, LocalStatus, Result};

const OPERATION: &str = "read_scatter";
const ROOT: usize = 0;

/// Where a rank reads its next file from
#[derive(Debug, Clone, PartialEq, Eq)]
struct Source {
    path: PathBuf,
    offset: u64,
}

/// Read this rank's payload from the file set at `prefix`, merging it into
/// `data`.
///
/// Collective: every rank of `comm` must call it, and the group must have
/// as many ranks as the one that wrote the set. Fails on every rank if any
/// rank fails.
pub fn read_scatter<C: Communicator + ?Sized>(
    prefix: impl AsRef<Path>,
    data: &mut Tree,
    comm: &C,
) -> Result<()> {
    read_scatter_with(prefix, data, comm, &IoConfig::default())
}

/// [`read_scatter`] with explicit I/O settings.
pub fn read_scatter_with<C: Communicator + ?Sized>(
    prefix: impl AsRef<Path>,
    data: &mut Tree,
    comm: &C,
    io: &IoConfig,
) -> Result<()> {
    let prefix = prefix.as_ref();
    let mut source = (comm.rank() == ROOT).then(|| Source {
        path: prefix.to_path_buf(),
        offset: 0,
    });
    descend_maps(prefix, &mut source, comm, io)?;

    let mut status = LocalStatus::default();
    let mut send = Tree::new();
    if let Some(source) = &source {
        let mut shard = Tree::new();
        let read = read_file_at_with(&source.path, source.offset, &mut shard, io)
            .map_err(CollectiveError::from);
        let usable = status.record(read).is_some()
            && status.record(check_layout(&shard, source, comm)).is_some();
        if usable {
            if let Some(entries) = shard.extract(RANK) {
                send = entries;
            }
        }
    }
    status.agree(comm, OPERATION)?;

    let mut received = Tree::new();
    exchange_direction(comm, &send, &mut received, Direction::Right)?;
    for (_, payload) in received.iter() {
        data.merge(payload);
    }
    Ok(())
}

/// Walk the map levels from the root down, leaving `source` pointing at the
/// level 0 shard this rank must read (or `None`).
fn descend_maps<C: Communicator + ?Sized>(
    prefix: &Path,
    source: &mut Option<Source>,
    comm: &C,
    io: &IoConfig,
) -> Result<()> {
    let mut depth = 1;
    loop {
        let mut status = LocalStatus::default();
        let mut map = Tree::new();
        let mut read_ok = false;
        if let Some(source) = source.as_ref() {
            let read = read_file_at_with(&source.path, source.offset, &mut map, io)
                .map_err(CollectiveError::from);
            read_ok = status.record(read).is_some()
                && status.record(check_layout(&map, source, comm)).is_some();
        }
        status.agree(comm, OPERATION)?;

        let mut send = Tree::new();
        if read_ok {
            if let Some(entries) = map.get(RANK) {
                send.merge(entries);
            }
        }
        let mut received = Tree::new();
        exchange_direction(comm, &send, &mut received, Direction::Right)?;

        let mut next = None;
        if let Some(first) = received.first() {
            next = status.record(descriptor_source(prefix, first.tree()));
        }

        let mut level: i32 = -1;
        if read_ok {
            match map.get_int(LEVEL) {
                Some(found) => level = found,
                None => {
                    status.record::<()>(Err(missing(source.as_ref(), prefix, LEVEL)));
                }
            }
        }
        let mut level_bytes = vec![0u8; 4];
        BigEndian::write_i32(&mut level_bytes, level);
        comm.bcast_bytes(&mut level_bytes, ROOT)?;
        if level_bytes.len() == 4 {
            level = BigEndian::read_i32(&level_bytes);
        }

        status.agree(comm, OPERATION)?;

        debug!(
            target: "kvtree::collective",
            depth,
            level,
            next = ?next.as_ref().map(|s: &Source| s.path.display().to_string()),
            "Read map level"
        );

        *source = next;
        if level <= 1 {
            return Ok(());
        }
        depth += 1;
    }
}

/// Check that a map or shard was written by a group of this size and only
/// addresses its members.
fn check_layout<C: Communicator + ?Sized>(tree: &Tree, source: &Source, comm: &C) -> Result<()> {
    let size = comm.size();
    let found = tree.get_int(RANKS).unwrap_or(0);
    if i64::from(found) != size as i64 {
        error!(
            target: "kvtree::collective",
            path = %source.path.display(),
            expected = size,
            found,
            "Invalid number of ranks"
        );
        return Err(FileError::RankCount {
            path: source.path.clone(),
            expected: size as u64,
            found: found.max(0) as u64,
        }
        .into());
    }
    if let Some(entries) = tree.get(RANK) {
        for elem in entries.elements() {
            let rank = elem.key_int();
            if rank < 0 || rank as usize >= size {
                return Err(CollectiveError::RankOutOfRange {
                    path: source.path.clone(),
                    rank: i64::from(rank),
                    size,
                });
            }
        }
    }
    Ok(())
}

fn descriptor_source(prefix: &Path, descriptor: &Tree) -> Result<Source> {
    let file = descriptor
        .get_str(FILE)
        .ok_or_else(|| missing(None, prefix, FILE))?;
    let offset = descriptor
        .get_bytecount(OFFSET)
        .ok_or_else(|| missing(None, prefix, OFFSET))?;
    Ok(Source {
        path: with_suffix(prefix, file),
        offset,
    })
}

fn missing(source: Option<&Source>, prefix: &Path, key: &'static str) -> CollectiveError {
    let path = source.map_or_else(|| prefix.to_path_buf(), |s| s.path.clone());
    FileError::MissingKey { path, key }.into()
}
