//! I/O and gather configuration.
//!
//! Both structs carry the constants the file and collective layers use by
//! default. [`GatherConfig`] can also be loaded from TOML and from the
//! `KVTREE_ENTRIES_PER_FILE` environment variable.
//!
//! ```toml
//! # bytes per writer segment during a collective gather
//! segment_size = 1048576
//! # rank entries per data file in the fixed-batch writer
//! entries_per_file = 8192
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable overriding [`GatherConfig::entries_per_file`].
pub const ENTRIES_PER_FILE_ENV: &str = "KVTREE_ENTRIES_PER_FILE";

/// Smallest accepted writer segment. Writer election only converges when a
/// segment holds at least two file descriptors.
pub const MIN_SEGMENT_SIZE: u64 = 1024;

/// Retry and permission settings for file I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoConfig {
    /// Extra open attempts after the first one fails (default: 5).
    pub open_retries: u32,

    /// Sleep between open attempts (default: 100µs).
    pub open_retry_delay: Duration,

    /// Hard read/write errors tolerated before giving up (default: 10).
    ///
    /// `Interrupted` and `WouldBlock` are retried without counting.
    pub io_retries: u32,

    /// Permission bits for newly created files on Unix (default: 0o600).
    pub file_mode: u32,
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            open_retries: 5,
            open_retry_delay: Duration::from_micros(100),
            io_retries: 10,
            file_mode: 0o600,
        }
    }
}

impl IoConfig {
    /// Create a new I/O configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set open retry count (builder pattern).
    pub fn with_open_retries(mut self, retries: u32) -> Self {
        self.open_retries = retries;
        self
    }

    /// Set delay between open attempts (builder pattern).
    pub fn with_open_retry_delay(mut self, delay: Duration) -> Self {
        self.open_retry_delay = delay;
        self
    }

    /// Set read/write error budget (builder pattern).
    pub fn with_io_retries(mut self, retries: u32) -> Self {
        self.io_retries = retries;
        self
    }

    /// Set permission bits for created files (builder pattern).
    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.io_retries == 0 {
            return Err(ConfigError::ZeroIoRetries);
        }
        if self.file_mode & !0o7777 != 0 {
            return Err(ConfigError::InvalidFileMode(self.file_mode));
        }
        Ok(())
    }
}

fn default_segment_size() -> u64 {
    1024 * 1024
}

fn default_entries_per_file() -> u64 {
    8192
}

/// Sizing for gathered file sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherConfig {
    /// Bytes assigned to one writer before a new writer is elected
    /// (default: 1 MiB).
    #[serde(default = "default_segment_size")]
    pub segment_size: u64,

    /// Rank entries per data file in the fixed-batch writer (default: 8192).
    #[serde(default = "default_entries_per_file")]
    pub entries_per_file: u64,
}

impl Default for GatherConfig {
    fn default() -> Self {
        GatherConfig {
            segment_size: default_segment_size(),
            entries_per_file: default_entries_per_file(),
        }
    }
}

impl GatherConfig {
    /// Create a new gather configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set writer segment size (builder pattern).
    pub fn with_segment_size(mut self, bytes: u64) -> Self {
        self.segment_size = bytes;
        self
    }

    /// Set entries per data file (builder pattern).
    pub fn with_entries_per_file(mut self, entries: u64) -> Self {
        self.entries_per_file = entries;
        self
    }

    /// Defaults with `KVTREE_ENTRIES_PER_FILE` applied when set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let value = std::env::var(ENTRIES_PER_FILE_ENV).ok();
        Self::default().with_entries_override(value.as_deref())
    }

    /// Apply an `entries_per_file` override given as text.
    pub fn with_entries_override(mut self, value: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(text) = value {
            self.entries_per_file = text
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| ConfigError::InvalidEnv {
                    name: ENTRIES_PER_FILE_ENV,
                    value: text.to_string(),
                })?;
        }
        Ok(self)
    }

    /// Parse a configuration from TOML text; missing fields take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: GatherConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Parse(format!("failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.segment_size < MIN_SEGMENT_SIZE {
            return Err(ConfigError::SegmentTooSmall(self.segment_size));
        }
        if self.entries_per_file == 0 {
            return Err(ConfigError::ZeroEntriesPerFile);
        }
        Ok(())
    }

    /// Small sizes that force multi-file layouts in tests.
    pub fn for_testing() -> Self {
        GatherConfig {
            segment_size: MIN_SEGMENT_SIZE,
            entries_per_file: 2,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Read/write error budget is zero.
    #[error("io_retries must be at least 1")]
    ZeroIoRetries,

    /// File mode has bits outside the permission range.
    #[error("invalid file mode {0:#o}")]
    InvalidFileMode(u32),

    /// Segment size is below [`MIN_SEGMENT_SIZE`].
    #[error("segment_size must be at least 1024 bytes, got {0}")]
    SegmentTooSmall(u64),

    /// Entries per file is zero.
    #[error("entries_per_file must be greater than zero")]
    ZeroEntriesPerFile,

    /// Environment override does not parse.
    #[error("invalid value {value:?} for {name}")]
    InvalidEnv {
        /// Variable name
        name: &'static str,
        /// Value found
        value: String,
    },

    /// TOML could not be read or parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}
