//! The recursive key/value tree.
//!
//! A [`Tree`] is an ordered list of [`Element`]s. Every element owns a string
//! key and a child tree, so values are trees themselves:
//!
//! ```text
//! RANK
//!   0
//!     FILE
//!       .0.0
//! RANKS
//!   3
//! ```
//!
//! # Ordering
//!
//! New elements are inserted at the head of the list, so iteration order is
//! most-recently-set first. Lookups scan from the head and return the first
//! element whose key matches.
//!
//! # Ownership
//!
//! Each element exclusively owns its subtree. [`Tree::set`] consumes the
//! subtree it installs and [`Tree::extract`] hands ownership back to the
//! caller, which is how subtrees move between containers without a deep copy.

use std::collections::VecDeque;

use tracing::error;

use crate::error::TreeError;
use crate::parse::atoi;

/// Direction for [`Tree::sort`] and [`Tree::sort_int`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Smallest key first
    #[default]
    Ascending,
    /// Largest key first
    Descending,
}

/// One `(key, subtree)` pair inside a [`Tree`].
#[derive(Debug, Clone)]
pub struct Element {
    key: String,
    tree: Tree,
}

impl Element {
    /// Create an element from a key and the subtree it owns.
    pub fn new(key: impl Into<String>, tree: Tree) -> Self {
        Element {
            key: key.into(),
            tree,
        }
    }

    /// The element key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The element key parsed as an integer (0 when it does not parse).
    pub fn key_int(&self) -> i32 {
        atoi(&self.key)
    }

    /// The subtree owned by this element.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Mutable access to the subtree owned by this element.
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    /// Split the element into its key and subtree.
    pub fn into_parts(self) -> (String, Tree) {
        (self.key, self.tree)
    }
}

/// A recursive key/value tree.
///
/// Equality is content equality: two trees are equal when they hold the same
/// multiset of `(key, subtree)` pairs, regardless of element order.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    elems: VecDeque<Element>,
}

impl Tree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Tree {
            elems: VecDeque::new(),
        }
    }

    /// Number of direct elements (not recursive).
    pub fn size(&self) -> usize {
        self.elems.len()
    }

    /// Returns `true` if the tree has no elements.
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.elems.iter().position(|e| e.key == key)
    }

    /// Returns `true` if some element has the given key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Subtree of the first element matching `key`.
    pub fn get(&self, key: &str) -> Option<&Tree> {
        self.element(key).map(|e| &e.tree)
    }

    /// Mutable subtree of the first element matching `key`.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Tree> {
        let idx = self.position(key)?;
        Some(&mut self.elems[idx].tree)
    }

    /// First element matching `key`.
    pub fn element(&self, key: &str) -> Option<&Element> {
        self.elems.iter().find(|e| e.key == key)
    }

    /// First element of the tree, if any.
    pub fn first(&self) -> Option<&Element> {
        self.elems.front()
    }

    /// Set `key` to `subtree`, returning the installed subtree.
    ///
    /// If the key exists its current subtree is dropped and replaced (never
    /// merged) and the element moves to the head; otherwise a new element is
    /// inserted at the head.
    pub fn set(&mut self, key: &str, subtree: Tree) -> &mut Tree {
        let existing = self.position(key).and_then(|idx| self.elems.remove(idx));
        let elem = match existing {
            Some(mut elem) => {
                elem.tree = subtree;
                elem
            }
            None => Element::new(key, subtree),
        };
        self.elems.push_front(elem);
        &mut self.elems[0].tree
    }

    /// Subtree for `key`, inserting an empty one at the head if absent.
    pub fn get_or_insert(&mut self, key: &str) -> &mut Tree {
        match self.position(key) {
            Some(idx) => &mut self.elems[idx].tree,
            None => self.set(key, Tree::new()),
        }
    }

    /// Remove the first element matching `key` and return it.
    pub fn extract_element(&mut self, key: &str) -> Option<Element> {
        let idx = self.position(key)?;
        self.elems.remove(idx)
    }

    /// Remove the first element matching `key` and return ownership of its
    /// subtree.
    pub fn extract(&mut self, key: &str) -> Option<Tree> {
        self.extract_element(key).map(|e| e.tree)
    }

    /// Same as [`Tree::extract`] with the key given as an integer.
    pub fn extract_int(&mut self, key: i64) -> Option<Tree> {
        self.extract(&key.to_string())
    }

    /// Remove and drop the first element matching `key`. No-op if absent.
    pub fn unset(&mut self, key: &str) {
        if let Some(idx) = self.position(key) {
            self.elems.remove(idx);
        }
    }

    /// Remove every element, leaving an empty tree.
    pub fn unset_all(&mut self) {
        self.elems.clear();
    }

    /// Deep union of `other` into `self`.
    ///
    /// For every element of `other`, an empty subtree is created under that
    /// key in `self` if needed, then the two subtrees are merged recursively.
    /// Existing siblings in `self` are never overwritten and `other` is left
    /// untouched.
    pub fn merge(&mut self, other: &Tree) {
        for elem in &other.elems {
            self.get_or_insert(&elem.key).merge(&elem.tree);
        }
    }

    /// Sort elements by key using byte-wise string comparison.
    pub fn sort(&mut self, direction: SortDirection) {
        let elems = self.elems.make_contiguous();
        match direction {
            SortDirection::Ascending => elems.sort_by(|a, b| a.key.cmp(&b.key)),
            SortDirection::Descending => elems.sort_by(|a, b| b.key.cmp(&a.key)),
        }
    }

    /// Sort elements by key parsed as an integer; unparsable keys sort as 0.
    pub fn sort_int(&mut self, direction: SortDirection) {
        let elems = self.elems.make_contiguous();
        match direction {
            SortDirection::Ascending => elems.sort_by_key(|e| e.key_int()),
            SortDirection::Descending => {
                elems.sort_by(|a, b| b.key_int().cmp(&a.key_int()))
            }
        }
    }

    /// All keys converted to integers, in ascending order.
    pub fn list_int(&self) -> Vec<i32> {
        let mut keys: Vec<i32> = self.elems.iter().map(Element::key_int).collect();
        keys.sort_unstable();
        keys
    }

    /// Create (or reuse) `self[key][val]` and return it.
    ///
    /// This is the single-value marker pattern: "key has value val" is
    /// stored as a two-level tree rather than as a string.
    pub fn set_kv(&mut self, key: &str, val: &str) -> &mut Tree {
        self.get_or_insert(key).get_or_insert(val)
    }

    /// Same as [`Tree::set_kv`] with the value given as an integer.
    pub fn set_kv_int(&mut self, key: &str, val: i64) -> &mut Tree {
        self.set_kv(key, &val.to_string())
    }

    /// Look up `self[key][val]`.
    pub fn get_kv(&self, key: &str, val: &str) -> Option<&Tree> {
        self.get(key)?.get(val)
    }

    /// Same as [`Tree::get_kv`] with the value given as an integer.
    pub fn get_kv_int(&self, key: &str, val: i64) -> Option<&Tree> {
        self.get_kv(key, &val.to_string())
    }

    /// Remove `self[key][val]`; if that leaves `self[key]` empty, remove
    /// `key` as well.
    pub fn unset_kv(&mut self, key: &str, val: &str) {
        let emptied = match self.get_mut(key) {
            Some(values) => {
                values.unset(val);
                values.is_empty()
            }
            None => return,
        };
        if emptied {
            self.unset(key);
        }
    }

    /// Same as [`Tree::unset_kv`] with the value given as an integer.
    pub fn unset_kv_int(&mut self, key: &str, val: i64) {
        self.unset_kv(key, &val.to_string())
    }

    /// Key of the first child of `self[key]`, without checking how many
    /// children there are.
    pub fn first_val(&self, key: &str) -> Option<&str> {
        self.get(key)?.first().map(Element::key)
    }

    /// The value stored under `key` following the key/value convention.
    ///
    /// Returns `Ok(None)` if `key` is absent and an error if `self[key]`
    /// does not have exactly one child.
    pub fn try_get_val(&self, key: &str) -> Result<Option<&str>, TreeError> {
        let Some(values) = self.get(key) else {
            return Ok(None);
        };
        if values.size() != 1 {
            return Err(TreeError::NotSingleValued {
                key: key.to_string(),
                count: values.size(),
            });
        }
        Ok(values.first().map(Element::key))
    }

    /// The value stored under `key` following the key/value convention.
    ///
    /// An ambiguous value (zero or several children) is reported through
    /// the log and treated as absent.
    pub fn get_val(&self, key: &str) -> Option<&str> {
        match self.try_get_val(key) {
            Ok(val) => val,
            Err(e) => {
                error!(target: "kvtree::core", error = %e, "Ambiguous key/value entry");
                None
            }
        }
    }

    /// Iterate over `(key, subtree)` pairs in list order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tree)> + '_ {
        self.elems.iter().map(|e| (e.key.as_str(), &e.tree))
    }

    /// Iterate over elements in list order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> + '_ {
        self.elems.iter()
    }

    /// Iterate mutably over elements in list order.
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> + '_ {
        self.elems.iter_mut()
    }

    /// Iterate over keys in list order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.elems.iter().map(|e| e.key.as_str())
    }

    /// Consume the tree, yielding its elements in list order.
    pub fn into_elements(self) -> impl Iterator<Item = Element> {
        self.elems.into_iter()
    }

    /// Insert an element at the head without checking for an existing key.
    ///
    /// Decoders use this to reproduce a stored tree exactly, including any
    /// duplicate keys it may contain.
    pub fn push_front(&mut self, elem: Element) {
        self.elems.push_front(elem);
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        if self.size() != other.size() {
            return false;
        }
        let mut matched = vec![false; other.size()];
        'outer: for a in &self.elems {
            for (i, b) in other.elems.iter().enumerate() {
                if !matched[i] && a.key == b.key && a.tree == b.tree {
                    matched[i] = true;
                    continue 'outer;
                }
            }
            return false;
        }
        true
    }
}

impl Eq for Tree {}
