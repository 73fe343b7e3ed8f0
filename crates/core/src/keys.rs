//! Well-known keys used by the file layout and the collective protocols.

/// Per-rank entries, keyed by rank number
pub const RANK: &str = "RANK";
/// Total number of ranks a set of files describes
pub const RANKS: &str = "RANKS";
/// Level of a file within a gather hierarchy; 0 holds data
pub const LEVEL: &str = "LEVEL";
/// File name suffix within a map entry
pub const FILE: &str = "FILE";
/// Byte offset within a map entry
pub const OFFSET: &str = "OFFSET";
