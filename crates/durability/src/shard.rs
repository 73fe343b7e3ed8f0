//! Sharded file sets: one root file plus numbered data files.
//!
//! A file set written under `prefix` consists of the root `prefix` and
//! shards named `<prefix>.<level>.<writer>`. Level 0 shards hold data as
//! `RANK/<rank>/<payload>`; higher levels and the root hold `RANK/<writer>`
//! maps whose `FILE` (suffix relative to the prefix) and `OFFSET` locate
//! the next level down. Every file records its `LEVEL` and the total
//! `RANKS` of the set.
//!
//! The functions here work on a whole file set from a single process. The
//! collective versions live in `kvtree-collective`.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use kvtree_core::keys::{FILE, LEVEL, OFFSET, RANK, RANKS};
use kvtree_core::{SortDirection, Tree};
use tracing::{debug, error};

use crate::config::{GatherConfig, IoConfig};
use crate::error::{FileError, Result};
use crate::file::{read_file_with, write_file_with};

/// Suffix of the shard written by `writer` at `level`, e.g. `.0.12`.
pub fn shard_suffix(level: u32, writer: u64) -> String {
    format!(".{}.{}", level, writer)
}

/// `prefix` with `suffix` appended to its final component.
pub fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Parse a shard file name `<base>.<level>.<writer>`.
pub fn parse_shard_name(base: &str, name: &str) -> Option<(u32, u64)> {
    let rest = name.strip_prefix(base)?.strip_prefix('.')?;
    let (level, writer) = rest.split_once('.')?;
    let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_number(level) || !is_number(writer) {
        return None;
    }
    Some((level.parse().ok()?, writer.parse().ok()?))
}

fn split_prefix(prefix: &Path) -> Option<(PathBuf, String)> {
    let base = prefix.file_name()?.to_str()?.to_string();
    let dir = match prefix.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, base))
}

/// Write `data`, shaped `{rank: payload}`, as a two-level file set.
///
/// Ranks are sorted numerically and written in batches of
/// `entries_per_file` (taken from `KVTREE_ENTRIES_PER_FILE` when set).
/// `ranks` is recorded as the total rank count of the set.
pub fn write_to_gather(prefix: impl AsRef<Path>, data: &mut Tree, ranks: usize) -> Result<()> {
    let config = GatherConfig::from_env()?;
    write_to_gather_with(prefix, data, ranks, &config, &IoConfig::default())
}

/// [`write_to_gather`] with explicit settings.
pub fn write_to_gather_with(
    prefix: impl AsRef<Path>,
    data: &mut Tree,
    ranks: usize,
    config: &GatherConfig,
    io: &IoConfig,
) -> Result<()> {
    config.validate()?;
    let prefix = prefix.as_ref();
    data.sort_int(SortDirection::Ascending);

    let mut root = Tree::new();
    root.set_kv_int(LEVEL, 1);

    let elems: Vec<_> = data.elements().collect();
    let mut writer: u64 = 0;
    for batch in elems.chunks(config.entries_per_file as usize) {
        let mut entries = Tree::new();
        entries.set_kv_int(LEVEL, 0);
        entries.set_kv_int(RANKS, ranks as i64);
        for elem in batch {
            entries
                .set_kv_int(RANK, elem.key_int() as i64)
                .merge(elem.tree());
        }

        let suffix = shard_suffix(0, writer);
        write_file_with(with_suffix(prefix, &suffix), &entries, io)?;
        debug!(target: "kvtree::file", shard = %suffix, entries = batch.len(), "Wrote data shard");

        let map = root.set_kv_int(RANK, writer as i64);
        map.set_str(FILE, &suffix);
        map.set_bytecount(OFFSET, 0);
        writer += batch.len() as u64;
    }

    root.set_kv_int(RANKS, ranks as i64);
    write_file_with(prefix, &root, io)?;
    Ok(())
}

/// Read every rank entry of a file set into `data` as `{rank: payload}`.
///
/// Reads the root for `RANKS`, then every level-0 shard found next to it.
/// Ranks with an empty payload count toward `RANKS` but add no key. Fails
/// if the number of entries found differs from `RANKS`.
pub fn read_scatter_single(prefix: impl AsRef<Path>, data: &mut Tree) -> Result<()> {
    read_scatter_single_with(prefix, data, &IoConfig::default())
}

/// [`read_scatter_single`] with explicit I/O settings.
pub fn read_scatter_single_with(
    prefix: impl AsRef<Path>,
    data: &mut Tree,
    io: &IoConfig,
) -> Result<()> {
    let prefix = prefix.as_ref();
    let mut root = Tree::new();
    read_file_with(prefix, &mut root, io)?;
    let expected = root.get_int(RANKS).ok_or_else(|| FileError::MissingKey {
        path: prefix.to_path_buf(),
        key: RANKS,
    })?;

    let (dir, base) = split_prefix(prefix).ok_or_else(|| FileError::NotReadable {
        path: prefix.to_path_buf(),
    })?;

    let mut found: u64 = 0;
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if parse_shard_name(&base, name).is_none() {
            continue;
        }

        let mut shard = Tree::new();
        read_file_with(entry.path(), &mut shard, io)?;
        if shard.get_int(LEVEL) != Some(0) {
            continue;
        }
        if let Some(entries) = shard.get(RANK) {
            for (rank, payload) in entries.iter() {
                found += 1;
                if !payload.is_empty() {
                    data.get_or_insert(rank).merge(payload);
                }
            }
        }
    }

    if found != expected as u64 {
        error!(
            target: "kvtree::file",
            prefix = %prefix.display(),
            expected,
            found,
            "Rank count mismatch"
        );
        return Err(FileError::RankCount {
            path: prefix.to_path_buf(),
            expected: expected as u64,
            found,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_suffix() {
        assert_eq!(shard_suffix(0, 0), ".0.0");
        assert_eq!(shard_suffix(2, 8192), ".2.8192");
    }

    #[test]
    fn test_with_suffix() {
        let p = with_suffix(Path::new("/tmp/dir/ckpt"), ".0.3");
        assert_eq!(p, PathBuf::from("/tmp/dir/ckpt.0.3"));
        assert_eq!(with_suffix(Path::new("ckpt"), ""), PathBuf::from("ckpt"));
    }

    #[test]
    fn test_parse_shard_name() {
        assert_eq!(parse_shard_name("ckpt", "ckpt.0.12"), Some((0, 12)));
        assert_eq!(parse_shard_name("ckpt", "ckpt.3.0"), Some((3, 0)));
        assert_eq!(parse_shard_name("ckpt", "ckpt"), None);
        assert_eq!(parse_shard_name("ckpt", "ckpt.0"), None);
        assert_eq!(parse_shard_name("ckpt", "ckpt.0.x"), None);
        assert_eq!(parse_shard_name("ckpt", "ckpt.a.1"), None);
        assert_eq!(parse_shard_name("ckpt", "ckpt.0.1.2"), None);
        assert_eq!(parse_shard_name("ckpt", "other.0.1"), None);
        assert_eq!(parse_shard_name("ckpt", "ckpt.+1.2"), None);
    }

    #[test]
    fn test_split_prefix_relative() {
        let (dir, base) = split_prefix(Path::new("ckpt")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(base, "ckpt");
    }
}
