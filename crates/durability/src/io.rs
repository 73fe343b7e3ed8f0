//! Retrying file I/O primitives.
//!
//! Opens are retried a fixed number of times with a short sleep in between,
//! which rides out transient failures on shared parallel file systems.
//! Reads and writes loop until the whole buffer is transferred, retrying
//! `Interrupted`/`WouldBlock` freely and other errors up to a budget.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;
use std::thread;

use tracing::{debug, error, warn};

use crate::config::IoConfig;
use crate::error::{FileError, Result};

fn is_transient(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock)
}

/// Options for opening a file for read and write, creating it if missing.
pub fn read_write_create(config: &IoConfig) -> OpenOptions {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(false);
    set_mode(&mut options, config);
    options
}

/// Options for opening a file for write, creating or truncating it.
pub fn write_truncate(config: &IoConfig) -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    set_mode(&mut options, config);
    options
}

#[cfg(unix)]
fn set_mode(options: &mut OpenOptions, config: &IoConfig) {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(config.file_mode);
}

#[cfg(not(unix))]
fn set_mode(_options: &mut OpenOptions, _config: &IoConfig) {}

/// Open `path`, retrying `config.open_retries` extra times on failure.
pub fn open_with_retry(path: &Path, options: &OpenOptions, config: &IoConfig) -> Result<File> {
    let mut last = match options.open(path) {
        Ok(file) => return Ok(file),
        Err(e) => e,
    };
    debug!(target: "kvtree::file", path = %path.display(), error = %last, "Open failed, retrying");

    for _ in 0..config.open_retries {
        thread::sleep(config.open_retry_delay);
        match options.open(path) {
            Ok(file) => return Ok(file),
            Err(e) => last = e,
        }
    }

    error!(target: "kvtree::file", path = %path.display(), error = %last, "Opening file failed");
    Err(FileError::Open {
        path: path.to_path_buf(),
        source: last,
    })
}

/// Whether `path` can be opened for reading.
pub fn is_readable(path: &Path) -> bool {
    File::open(path).is_ok()
}

/// Read until `buf` is full or end of file, returning the bytes read.
pub fn read_retry<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    path: &Path,
    config: &IoConfig,
) -> io::Result<usize> {
    let mut n = 0;
    let mut budget = config.io_retries;
    while n < buf.len() {
        match reader.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(got) => n += got,
            Err(e) if is_transient(&e) => continue,
            Err(e) => {
                budget = budget.saturating_sub(1);
                if budget == 0 {
                    error!(target: "kvtree::file", path = %path.display(), error = %e, "Giving up read");
                    return Err(e);
                }
                warn!(target: "kvtree::file", path = %path.display(), error = %e, "Error reading file");
            }
        }
    }
    Ok(n)
}

/// Write all of `buf`, returning the bytes written.
///
/// A write call that accepts zero bytes is an error.
pub fn write_retry<W: Write>(
    writer: &mut W,
    buf: &[u8],
    path: &Path,
    config: &IoConfig,
) -> io::Result<usize> {
    let mut n = 0;
    let mut budget = config.io_retries;
    while n < buf.len() {
        match writer.write(&buf[n..]) {
            Ok(0) => {
                error!(target: "kvtree::file", path = %path.display(), "Write returned 0");
                return Err(io::Error::new(ErrorKind::WriteZero, "write returned 0"));
            }
            Ok(put) => n += put,
            Err(e) if is_transient(&e) => continue,
            Err(e) => {
                budget = budget.saturating_sub(1);
                if budget == 0 {
                    error!(target: "kvtree::file", path = %path.display(), error = %e, "Giving up write");
                    return Err(e);
                }
                warn!(target: "kvtree::file", path = %path.display(), error = %e, "Error writing file");
            }
        }
    }
    Ok(n)
}
