//! Reading and writing a single tree to a single file.
//!
//! Every function here moves the persisted image described in
//! [`crate::format`]. Reads merge the stored tree into the caller's tree and
//! return the image size, with 0 meaning the file was empty. An empty file
//! is not an error: lock files are created empty and read before their
//! first write.
//!
//! Concurrent access from several processes is only safe through the
//! locking variants ([`read_with_lock`], [`write_with_lock`],
//! [`lock_open_read`]).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use kvtree_core::Tree;
use tracing::{debug, error, warn};

use crate::config::IoConfig;
use crate::error::{FileError, Result};
use crate::format::{self, FileHeader, HEADER_SIZE};
use crate::io::{is_readable, open_with_retry, read_retry, write_retry, write_truncate};
use crate::lock::LockedFile;

const READ_CHUNK: u64 = 64 * 1024;

/// Read one persisted image from the current position of `reader` and merge
/// it into `tree`.
///
/// Returns the image size, or 0 if the reader was already at end of file.
/// `path` names the source in logs and errors.
pub fn read_from<R: Read>(
    reader: &mut R,
    path: &Path,
    tree: &mut Tree,
    config: &IoConfig,
) -> Result<u64> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    let got = read_retry(reader, &mut header_bytes, path, config)?;
    if got == 0 {
        return Ok(0);
    }
    let header = FileHeader::from_bytes(&header_bytes[..got]).map_err(|e| {
        error!(target: "kvtree::file", path = %path.display(), read = got, "Invalid header");
        FileError::format(path, e)
    })?;
    header.validate().map_err(|e| {
        error!(target: "kvtree::file", path = %path.display(), error = %e, "File header does not match expected values");
        FileError::format(path, e)
    })?;

    let mut image = header_bytes.to_vec();
    let mut remaining = header.file_size - HEADER_SIZE as u64;
    let mut chunk = vec![0u8; remaining.min(READ_CHUNK) as usize];
    while remaining > 0 {
        let want = remaining.min(READ_CHUNK) as usize;
        let got = read_retry(reader, &mut chunk[..want], path, config)?;
        image.extend_from_slice(&chunk[..got]);
        remaining -= got as u64;
        if got < want {
            break;
        }
    }
    if remaining > 0 {
        error!(
            target: "kvtree::file",
            path = %path.display(),
            expected = header.file_size,
            actual = image.len(),
            "Failed to read file"
        );
        return Err(FileError::format(
            path,
            crate::error::CodecError::ImageTruncated {
                expected: header.file_size,
                actual: image.len() as u64,
            },
        ));
    }

    format::decode_image(&header, &image, tree).map_err(|e| {
        error!(target: "kvtree::file", path = %path.display(), error = %e, "Failed to decode file");
        FileError::format(path, e)
    })?;
    Ok(header.file_size)
}

/// Seek to `offset` and read one persisted image, merging it into `tree`.
pub fn read_at<F: Read + Seek>(
    file: &mut F,
    path: &Path,
    offset: u64,
    tree: &mut Tree,
    config: &IoConfig,
) -> Result<u64> {
    file.seek(SeekFrom::Start(offset))?;
    read_from(file, path, tree, config)
}

/// Write the persisted image of `tree` at the current position of `writer`.
pub(crate) fn write_to<W: Write>(
    writer: &mut W,
    path: &Path,
    tree: &Tree,
    config: &IoConfig,
) -> Result<u64> {
    let image = format::write_persist(tree);
    let written = write_retry(writer, &image, path, config)?;
    if written != image.len() {
        return Err(FileError::ShortWrite {
            path: path.to_path_buf(),
            written,
            expected: image.len(),
        });
    }
    Ok(written as u64)
}

pub(crate) fn sync(file: &File, path: &Path) {
    if let Err(e) = file.sync_all() {
        warn!(target: "kvtree::file", path = %path.display(), error = %e, "fsync failed");
    }
}

/// Read `path` into `tree`.
pub fn read_file(path: impl AsRef<Path>, tree: &mut Tree) -> Result<u64> {
    read_file_with(path, tree, &IoConfig::default())
}

/// [`read_file`] with explicit I/O settings.
pub fn read_file_with(path: impl AsRef<Path>, tree: &mut Tree, config: &IoConfig) -> Result<u64> {
    read_file_at_with(path, 0, tree, config)
}

/// Read the image stored at byte `offset` of `path` into `tree`.
pub fn read_file_at(path: impl AsRef<Path>, offset: u64, tree: &mut Tree) -> Result<u64> {
    read_file_at_with(path, offset, tree, &IoConfig::default())
}

/// [`read_file_at`] with explicit I/O settings.
pub fn read_file_at_with(
    path: impl AsRef<Path>,
    offset: u64,
    tree: &mut Tree,
    config: &IoConfig,
) -> Result<u64> {
    let path = path.as_ref();
    if !is_readable(path) {
        debug!(target: "kvtree::file", path = %path.display(), "File is not readable");
        return Err(FileError::NotReadable {
            path: path.to_path_buf(),
        });
    }
    let mut options = OpenOptions::new();
    options.read(true);
    let mut file = open_with_retry(path, &options, config)?;
    read_at(&mut file, path, offset, tree, config)
}

/// Write `tree` to `path`, creating or truncating it, and fsync.
pub fn write_file(path: impl AsRef<Path>, tree: &Tree) -> Result<u64> {
    write_file_with(path, tree, &IoConfig::default())
}

/// [`write_file`] with explicit I/O settings.
pub fn write_file_with(path: impl AsRef<Path>, tree: &Tree, config: &IoConfig) -> Result<u64> {
    let path = path.as_ref();
    let mut file = open_with_retry(path, &write_truncate(config), config)?;
    let written = write_to(&mut file, path, tree, config)?;
    sync(&file, path);
    Ok(written)
}

/// Read `path` into `tree` while holding an exclusive lock on it.
///
/// The file is created empty if it does not exist.
pub fn read_with_lock(path: impl AsRef<Path>, tree: &mut Tree) -> Result<u64> {
    read_with_lock_with(path, tree, &IoConfig::default())
}

/// [`read_with_lock`] with explicit I/O settings.
pub fn read_with_lock_with(
    path: impl AsRef<Path>,
    tree: &mut Tree,
    config: &IoConfig,
) -> Result<u64> {
    let mut locked = LockedFile::open_with(path, config)?;
    let size = locked.read_into(tree)?;
    locked.unlock()?;
    Ok(size)
}

/// Replace the contents of `path` with `tree` while holding an exclusive
/// lock on it.
pub fn write_with_lock(path: impl AsRef<Path>, tree: &Tree) -> Result<u64> {
    write_with_lock_with(path, tree, &IoConfig::default())
}

/// [`write_with_lock`] with explicit I/O settings.
pub fn write_with_lock_with(path: impl AsRef<Path>, tree: &Tree, config: &IoConfig) -> Result<u64> {
    LockedFile::open_with(path, config)?.write_close_unlock(tree)
}

/// Lock `path`, read it into `tree` and keep the lock for a later
/// [`LockedFile::write_close_unlock`].
pub fn lock_open_read(path: impl AsRef<Path>, tree: &mut Tree) -> Result<LockedFile> {
    lock_open_read_with(path, tree, &IoConfig::default())
}

/// [`lock_open_read`] with explicit I/O settings.
pub fn lock_open_read_with(
    path: impl AsRef<Path>,
    tree: &mut Tree,
    config: &IoConfig,
) -> Result<LockedFile> {
    let mut locked = LockedFile::open_with(path, config)?;
    locked.read_into(tree)?;
    Ok(locked)
}
