//! Error types for encoding and persisting trees

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for file operations
pub type Result<T> = std::result::Result<T, FileError>;

/// Errors raised while decoding packed trees or persisted images
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Input ended before a complete value could be read
    #[error("truncated input at offset {offset}: needed {needed} more bytes")]
    Truncated {
        /// Offset where the read started
        offset: usize,
        /// Bytes the read needed
        needed: usize,
    },

    /// A key is not followed by a NUL byte before the end of input
    #[error("key at offset {offset} has no NUL terminator")]
    MissingTerminator {
        /// Offset of the first key byte
        offset: usize,
    },

    /// A key is not valid UTF-8
    #[error("key at offset {offset} is not valid UTF-8")]
    InvalidKey {
        /// Offset of the first key byte
        offset: usize,
    },

    /// Subtrees nest deeper than the decoder accepts
    #[error("tree at offset {offset} nests deeper than {limit} levels")]
    TooDeep {
        /// Offset of the count that crossed the limit
        offset: usize,
        /// Maximum nesting depth
        limit: usize,
    },

    /// Fewer bytes than a header were available
    #[error("header too short: {len} bytes")]
    ShortHeader {
        /// Bytes available
        len: usize,
    },

    /// Magic, file type or version do not match
    #[error("header mismatch: magic {magic:#010x}, type {file_type}, version {version}")]
    HeaderMismatch {
        /// Magic number found
        magic: u32,
        /// File type found
        file_type: u16,
        /// Version found
        version: u16,
    },

    /// Declared image size is smaller than its fixed parts
    #[error("invalid image size {size} in header")]
    InvalidSize {
        /// Size stored in the header
        size: u64,
    },

    /// Fewer bytes were available than the header declares
    #[error("image truncated: header declares {expected} bytes, found {actual}")]
    ImageTruncated {
        /// Size stored in the header
        expected: u64,
        /// Bytes actually available
        actual: u64,
    },

    /// Stored checksum does not match the image contents
    #[error("CRC32 mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    CrcMismatch {
        /// Checksum in the trailer
        stored: u32,
        /// Checksum of the image
        computed: u32,
    },
}

/// Errors raised by file persistence
#[derive(Debug, Error)]
pub enum FileError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// File could not be opened after retries
    #[error("failed to open {path}: {source}")]
    Open {
        /// File path
        path: PathBuf,
        /// Last open error
        #[source]
        source: io::Error,
    },

    /// File does not exist or is not readable
    #[error("{path} is not readable")]
    NotReadable {
        /// File path
        path: PathBuf,
    },

    /// File contents are not a valid persisted tree
    #[error("invalid tree file {path}: {source}")]
    Format {
        /// File path
        path: PathBuf,
        /// Decoding failure
        #[source]
        source: CodecError,
    },

    /// Fewer bytes were written than requested
    #[error("short write to {path}: wrote {written} of {expected} bytes")]
    ShortWrite {
        /// File path
        path: PathBuf,
        /// Bytes written
        written: usize,
        /// Bytes requested
        expected: usize,
    },

    /// Number of rank entries found differs from the recorded count
    #[error("rank count mismatch under {path}: expected {expected}, found {found}")]
    RankCount {
        /// Root file path
        path: PathBuf,
        /// Count recorded in the root file
        expected: u64,
        /// Entries found in the data files
        found: u64,
    },

    /// A required key is missing from a file
    #[error("{path} is missing {key}")]
    MissingKey {
        /// File path
        path: PathBuf,
        /// Key that was expected
        key: &'static str,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl FileError {
    pub(crate) fn format(path: impl Into<PathBuf>, source: CodecError) -> Self {
        FileError::Format {
            path: path.into(),
            source,
        }
    }
}
