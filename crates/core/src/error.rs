//! Error types for tree operations
//!
//! Most tree operations are infallible: lookups return `Option` and
//! mutations always succeed. The only checked condition is the
//! single-value convention used by [`Tree::try_get_val`](crate::Tree::try_get_val).

use thiserror::Error;

/// Result type alias for tree operations
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors raised while reading values out of a tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// A key/value entry did not have exactly one child
    #[error("key {key} expected to have exactly one value, found {count}")]
    NotSingleValued {
        /// Key that was looked up
        key: String,
        /// Number of children found under the key
        count: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_single_valued() {
        let err = TreeError::NotSingleValued {
            key: "RANKS".to_string(),
            count: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("RANKS"));
        assert!(msg.contains("exactly one value"));
        assert!(msg.contains('3'));
    }
}
