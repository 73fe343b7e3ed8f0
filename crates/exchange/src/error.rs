//! Error types for message passing

use kvtree_durability::CodecError;
use thiserror::Error;

/// Result type alias for exchange operations
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Errors raised by communicators and tree transfers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// A rank outside the group was addressed
    #[error("rank {rank} out of range for group of {size}")]
    InvalidRank {
        /// Rank requested
        rank: i64,
        /// Group size
        size: usize,
    },

    /// Another rank addressed an item outside the group, so nothing was sent
    #[error("exchange aborted: another rank addressed a rank outside the group")]
    Aborted,

    /// The peer left the group with no message pending
    #[error("peer {peer} left the group")]
    Disconnected {
        /// Peer rank
        peer: usize,
    },

    /// No message arrived in time
    #[error("timed out waiting for a message from rank {peer}")]
    Timeout {
        /// Peer rank
        peer: usize,
    },

    /// A control message had the wrong shape
    #[error("malformed message from rank {peer}: {reason}")]
    Malformed {
        /// Peer rank
        peer: usize,
        /// What was wrong
        reason: String,
    },

    /// A tree payload failed to decode
    #[error("failed to decode tree from rank {peer}: {source}")]
    Decode {
        /// Peer rank
        peer: usize,
        /// Decoding failure
        #[source]
        source: CodecError,
    },
}
