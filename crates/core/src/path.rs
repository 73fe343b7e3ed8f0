//! Typed key paths for addressing nested subtrees.
//!
//! A [`KeyPath`] is a sequence of [`PathSegment`]s, each either a string
//! key or an integer key. Integer keys are stored in the tree as their
//! decimal text, so `PathSegment::Int(3)` and `PathSegment::Key("3")`
//! address the same element.
//!
//! # Examples
//!
//! ```
//! use kvtree_core::{KeyPath, Tree};
//!
//! let mut tree = Tree::new();
//! let path = KeyPath::root().key("RANK").int(3).key("FILE");
//! tree.set_path(&path, Tree::new());
//! assert!(tree.get_path(&path).is_some());
//! assert!(tree.get_kv("RANK", "3").is_some());
//! ```

use std::fmt;

use crate::tree::Tree;

/// One step in a [`KeyPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// String key
    Key(String),
    /// Integer key, stored as decimal text
    Int(i64),
}

impl PathSegment {
    /// The key text this segment addresses.
    pub fn as_key(&self) -> String {
        match self {
            PathSegment::Key(k) => k.clone(),
            PathSegment::Int(i) => i.to_string(),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{}", k),
            PathSegment::Int(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(k: &str) -> Self {
        PathSegment::Key(k.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(k: String) -> Self {
        PathSegment::Key(k)
    }
}

impl From<i64> for PathSegment {
    fn from(i: i64) -> Self {
        PathSegment::Int(i)
    }
}

impl From<i32> for PathSegment {
    fn from(i: i32) -> Self {
        PathSegment::Int(i as i64)
    }
}

/// A path of keys from a tree root down to a nested subtree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyPath {
    segments: Vec<PathSegment>,
}

impl KeyPath {
    /// The empty path, addressing the tree itself
    pub fn root() -> Self {
        KeyPath {
            segments: Vec::new(),
        }
    }

    /// Create a path from a vector of segments
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        KeyPath { segments }
    }

    /// Get the path segments
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Check if this is the root path
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a string key (builder pattern)
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    /// Append an integer key (builder pattern)
    pub fn int(mut self, value: i64) -> Self {
        self.segments.push(PathSegment::Int(value));
        self
    }

    /// Push a segment (mutating)
    pub fn push(&mut self, segment: impl Into<PathSegment>) {
        self.segments.push(segment.into());
    }
}

impl<S: Into<PathSegment>> FromIterator<S> for KeyPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        KeyPath {
            segments: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

impl Tree {
    /// Descend along `path`, creating missing intermediate keys, and set the
    /// last segment to `value`.
    ///
    /// Returns the installed subtree. The root path leaves the tree unchanged
    /// and returns it; `value` is dropped in that case.
    pub fn set_path(&mut self, path: &KeyPath, value: Tree) -> &mut Tree {
        let Some((last, parents)) = path.segments().split_last() else {
            return self;
        };
        let mut node = self;
        for seg in parents {
            node = node.get_or_insert(&seg.as_key());
        }
        node.set(&last.as_key(), value)
    }

    /// Subtree at `path`, if every segment exists. The root path returns
    /// the tree itself.
    pub fn get_path(&self, path: &KeyPath) -> Option<&Tree> {
        path.segments()
            .iter()
            .try_fold(self, |node, seg| node.get(&seg.as_key()))
    }

    /// Mutable subtree at `path`, if every segment exists.
    pub fn get_path_mut(&mut self, path: &KeyPath) -> Option<&mut Tree> {
        let mut node = self;
        for seg in path.segments() {
            node = node.get_mut(&seg.as_key())?;
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_path_creates_intermediates() {
        let mut t = Tree::new();
        let path = KeyPath::root().key("D").int(4).key("S").int(1);
        t.set_path(&path, Tree::new()).set("payload", Tree::new());

        let d = t.get("D").unwrap();
        let s = d.get("4").unwrap().get("S").unwrap();
        assert!(s.get("1").unwrap().contains_key("payload"));
    }

    #[test]
    fn test_set_path_reuses_intermediates() {
        let mut t = Tree::new();
        t.set_path(&KeyPath::root().key("A").key("B"), Tree::new());
        t.set_path(&KeyPath::root().key("A").key("C"), Tree::new());
        assert_eq!(t.size(), 1);
        assert_eq!(t.get("A").unwrap().size(), 2);
    }

    #[test]
    fn test_set_path_replaces_last_segment() {
        let mut t = Tree::new();
        let path = KeyPath::root().key("A").key("B");
        let mut first = Tree::new();
        first.set("old", Tree::new());
        t.set_path(&path, first);
        t.set_path(&path, Tree::new());
        assert!(t.get_path(&path).unwrap().is_empty());
    }

    #[test]
    fn test_get_path_missing_segment() {
        let mut t = Tree::new();
        t.set_kv("A", "B");
        assert!(t.get_path(&KeyPath::root().key("A").key("B")).is_some());
        assert!(t.get_path(&KeyPath::root().key("A").key("X")).is_none());
        assert!(t.get_path_mut(&KeyPath::root().key("Z")).is_none());
    }

    #[test]
    fn test_root_path_addresses_self() {
        let mut t = Tree::new();
        t.set_kv("k", "v");
        assert_eq!(t.get_path(&KeyPath::root()), Some(&t));
        t.set_path(&KeyPath::root(), Tree::new());
        assert_eq!(t.size(), 1);
    }

    #[test]
    fn test_int_and_key_segments_are_interchangeable() {
        let mut t = Tree::new();
        t.set_path(&KeyPath::root().int(-2), Tree::new());
        assert!(t.get_path(&KeyPath::root().key("-2")).is_some());
    }

    #[test]
    fn test_path_display_and_collect() {
        let path: KeyPath = vec!["RANK", "0", "FILE"].into_iter().collect();
        assert_eq!(path.to_string(), "RANK/0/FILE");
        assert_eq!(path.len(), 3);
        assert!(KeyPath::root().is_empty());
    }
}
