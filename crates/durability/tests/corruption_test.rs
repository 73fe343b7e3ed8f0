//! Corruption detection tests
//!
//! These tests damage persisted files on disk and verify that reads fail
//! instead of returning partial or wrong trees:
//! - CRC32 detects bit flips in the body
//! - Header damage is reported before the body is touched
//! - Truncated files are rejected

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use kvtree_core::Tree;
use kvtree_durability::format::HEADER_SIZE;
use kvtree_durability::{read_file, write_file, CodecError, FileError};
use tempfile::TempDir;

fn sample() -> Tree {
    let mut t = Tree::new();
    t.set_kv("LEVEL", "0");
    t.set_kv("RANKS", "4");
    for rank in 0..4 {
        t.set_kv_int("RANK", rank).set_kv("FILE", &format!("rank_{}.dat", rank));
    }
    t
}

fn flip_byte(path: &Path, offset: u64) {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    let mut buf = [0u8; 1];
    file.read_exact(&mut buf).unwrap();
    buf[0] ^= 0xFF;
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(&buf).unwrap();
    file.sync_all().unwrap();
}

#[test]
fn test_crc_detects_bit_flip_anywhere_in_body() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tree.kvt");
    let size = write_file(&path, &sample()).unwrap();

    for offset in [HEADER_SIZE as u64, HEADER_SIZE as u64 + 7, size - 5] {
        write_file(&path, &sample()).unwrap();
        flip_byte(&path, offset);

        let mut out = Tree::new();
        let err = read_file(&path, &mut out).unwrap_err();
        assert!(
            matches!(
                err,
                FileError::Format {
                    source: CodecError::CrcMismatch { .. },
                    ..
                }
            ),
            "offset {} gave {:?}",
            offset,
            err
        );
        assert!(out.is_empty(), "corrupt read must not merge anything");
    }
}

#[test]
fn test_crc_trailer_damage_detected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tree.kvt");
    let size = write_file(&path, &sample()).unwrap();
    flip_byte(&path, size - 1);

    let mut out = Tree::new();
    assert!(read_file(&path, &mut out).is_err());
}

#[test]
fn test_magic_damage_detected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tree.kvt");
    write_file(&path, &sample()).unwrap();
    flip_byte(&path, 0);

    let mut out = Tree::new();
    let err = read_file(&path, &mut out).unwrap_err();
    assert!(matches!(
        err,
        FileError::Format {
            source: CodecError::HeaderMismatch { .. },
            ..
        }
    ));
}

#[test]
fn test_truncated_file_detected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tree.kvt");
    let size = write_file(&path, &sample()).unwrap();

    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(size - 3).unwrap();
    drop(file);

    let mut out = Tree::new();
    let err = read_file(&path, &mut out).unwrap_err();
    assert!(matches!(
        err,
        FileError::Format {
            source: CodecError::ImageTruncated { .. },
            ..
        }
    ));
}

#[test]
fn test_undamaged_file_still_reads() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tree.kvt");
    write_file(&path, &sample()).unwrap();

    let mut out = Tree::new();
    read_file(&path, &mut out).unwrap();
    assert_eq!(out, sample());
}
