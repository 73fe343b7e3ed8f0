//! Error types for collective file operations

use std::path::PathBuf;

use kvtree_durability::FileError;
use kvtree_exchange::{Communicator, ExchangeError};
use thiserror::Error;
use tracing::error;

/// Result type alias for collective operations
pub type Result<T> = std::result::Result<T, CollectiveError>;

/// Errors raised by gather and scatter
#[derive(Debug, Error)]
pub enum CollectiveError {
    /// Local file failure on this rank
    #[error(transparent)]
    File(#[from] FileError),

    /// Message passing failed
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// A map was to be written somewhere other than the start of its file
    #[error("refusing to write map {path} at non-zero offset {offset}")]
    NonZeroOffset {
        /// Map file
        path: PathBuf,
        /// Requested offset
        offset: u64,
    },

    /// A map or shard names a rank outside the reading group
    #[error("{path} lists rank {rank}, outside a group of {size}")]
    RankOutOfRange {
        /// File holding the entry
        path: PathBuf,
        /// Rank key found
        rank: i64,
        /// Group size
        size: usize,
    },

    /// Another rank failed; this rank's own work succeeded
    #[error("{operation} failed on another rank")]
    Failed {
        /// Operation that failed
        operation: &'static str,
    },
}

/// First local failure seen by one rank during a collective call.
///
/// Local failures must not cut the protocol short, or the other ranks would
/// block on messages that never come. They are recorded here and turned
/// into a group-wide verdict at the next agreement point.
#[derive(Debug, Default)]
pub(crate) struct LocalStatus {
    failure: Option<CollectiveError>,
}

impl LocalStatus {
    /// Keep the value of `result`, or remember its error.
    pub(crate) fn record<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                error!(target: "kvtree::collective", error = %e, "Local failure");
                if self.failure.is_none() {
                    self.failure = Some(e);
                }
                None
            }
        }
    }

    /// Agree across the group on whether every rank is still healthy.
    ///
    /// Ranks that failed get their own error back; the rest get
    /// [`CollectiveError::Failed`].
    pub(crate) fn agree<C: Communicator + ?Sized>(
        &mut self,
        comm: &C,
        operation: &'static str,
    ) -> Result<()> {
        if comm.all_true(self.failure.is_none())? {
            return Ok(());
        }
        Err(self
            .failure
            .take()
            .unwrap_or(CollectiveError::Failed { operation }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvtree_exchange::LocalGroup;

    #[test]
    fn test_error_display() {
        let err = CollectiveError::Failed {
            operation: "write_gather",
        };
        assert_eq!(err.to_string(), "write_gather failed on another rank");

        let err = CollectiveError::NonZeroOffset {
            path: PathBuf::from("/tmp/ckpt.1.0"),
            offset: 12,
        };
        assert!(err.to_string().contains("non-zero offset 12"));

        let err = CollectiveError::RankOutOfRange {
            path: PathBuf::from("/tmp/ckpt"),
            rank: 25,
            size: 3,
        };
        assert!(err.to_string().contains("rank 25, outside a group of 3"));
    }

    #[test]
    fn test_agree_spreads_failure() {
        let results = LocalGroup::run(3, |comm| {
            let mut status = LocalStatus::default();
            if comm.rank() == 1 {
                status.record::<()>(Err(CollectiveError::NonZeroOffset {
                    path: PathBuf::from("x"),
                    offset: 1,
                }));
            }
            status.agree(comm, "test")
        });
        assert!(matches!(results[0], Err(CollectiveError::Failed { .. })));
        assert!(matches!(results[1], Err(CollectiveError::NonZeroOffset { .. })));
        assert!(matches!(results[2], Err(CollectiveError::Failed { .. })));
    }

    #[test]
    fn test_agree_all_healthy() {
        let results = LocalGroup::run(2, |comm| LocalStatus::default().agree(comm, "test"));
        assert!(results.iter().all(|r| r.is_ok()));
    }
}
