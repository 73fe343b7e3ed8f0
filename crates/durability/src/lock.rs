//! Advisory file locks.
//!
//! [`LockedFile`] holds an open file together with an `fs2` lock on it. The
//! lock is released when the guard is consumed by
//! [`LockedFile::write_close_unlock`] or [`LockedFile::unlock`], or when it
//! is dropped. Locks block without timeout.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use kvtree_core::Tree;
use tracing::error;

use crate::config::IoConfig;
use crate::error::Result;
use crate::file;
use crate::io::{open_with_retry, read_write_create};

/// Kind of advisory lock held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many holders may read
    Shared,
    /// Single holder for read-modify-write
    Exclusive,
}

/// An open file holding an advisory lock
#[derive(Debug)]
pub struct LockedFile {
    file: File,
    path: PathBuf,
    config: IoConfig,
    mode: LockMode,
    locked: bool,
}

impl LockedFile {
    /// Open `path` (creating it if needed) and take an exclusive lock.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &IoConfig::default())
    }

    /// [`LockedFile::open`] with explicit I/O settings.
    pub fn open_with(path: impl AsRef<Path>, config: &IoConfig) -> Result<Self> {
        Self::open_mode(path.as_ref(), LockMode::Exclusive, config)
    }

    /// Open `path` (creating it if needed) and take a shared lock.
    pub fn open_shared(path: impl AsRef<Path>, config: &IoConfig) -> Result<Self> {
        Self::open_mode(path.as_ref(), LockMode::Shared, config)
    }

    fn open_mode(path: &Path, mode: LockMode, config: &IoConfig) -> Result<Self> {
        let file = open_with_retry(path, &read_write_create(config), config)?;
        let locked = match mode {
            LockMode::Shared => FileExt::lock_shared(&file),
            LockMode::Exclusive => FileExt::lock_exclusive(&file),
        };
        if let Err(e) = locked {
            error!(target: "kvtree::file", path = %path.display(), error = %e, "Failed to lock file");
            return Err(e.into());
        }
        Ok(LockedFile {
            file,
            path: path.to_path_buf(),
            config: config.clone(),
            mode,
            locked: true,
        })
    }

    /// Path of the locked file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Kind of lock held.
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Read the file from the start and merge it into `tree`.
    ///
    /// Returns the image size, 0 for an empty file.
    pub fn read_into(&mut self, tree: &mut Tree) -> Result<u64> {
        file::read_at(&mut self.file, &self.path, 0, tree, &self.config)
    }

    /// Overwrite the file with `tree`, truncate it to the new size, fsync,
    /// then release the lock and close.
    pub fn write_close_unlock(mut self, tree: &Tree) -> Result<u64> {
        self.file.seek(SeekFrom::Start(0))?;
        let written = file::write_to(&mut self.file, &self.path, tree, &self.config)?;
        if let Err(e) = self.file.set_len(written) {
            error!(target: "kvtree::file", path = %self.path.display(), error = %e, "Truncate failed");
            return Err(e.into());
        }
        file::sync(&self.file, &self.path);
        self.unlock()?;
        Ok(written)
    }

    /// Release the lock and close the file.
    pub fn unlock(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if self.locked {
            self.locked = false;
            FileExt::unlock(&self.file)?;
        }
        Ok(())
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            error!(target: "kvtree::file", path = %self.path.display(), error = %e, "Failed to unlock file");
        }
    }
}
