//! Human-readable rendering of trees.

use std::fmt;

use tracing::{debug, error, info, trace, warn, Level};

use crate::tree::Tree;

/// Layout used when rendering a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintMode {
    /// One key per line, children indented two spaces beneath their parent
    #[default]
    Tree,
    /// Like `Tree`, but a key with a single leaf child prints as `key = value`
    KeyVal,
}

impl Tree {
    /// Render the tree starting at `indent` spaces.
    pub fn render(&self, indent: usize, mode: PrintMode) -> String {
        let mut out = String::new();
        // writing to a String cannot fail
        let _ = self.write_into(&mut out, indent, mode);
        out
    }

    fn write_into<W: fmt::Write>(&self, out: &mut W, indent: usize, mode: PrintMode) -> fmt::Result {
        let pad = indent + 2;
        for (key, child) in self.iter() {
            if mode == PrintMode::KeyVal && child.size() == 1 {
                if let Some(only) = child.first().filter(|e| e.tree().is_empty()) {
                    writeln!(out, "{:pad$}{} = {}", "", key, only.key())?;
                    continue;
                }
            }
            writeln!(out, "{:pad$}{}", "", key)?;
            child.write_into(out, pad, mode)?;
        }
        Ok(())
    }

    /// Print the tree to stdout in tree layout.
    pub fn print(&self, indent: usize) {
        self.print_mode(indent, PrintMode::Tree);
    }

    /// Print the tree to stdout in the given layout.
    pub fn print_mode(&self, indent: usize, mode: PrintMode) {
        print!("{}", self.render(indent, mode));
    }

    /// Emit the tree line by line through `tracing` at `level`.
    pub fn log(&self, level: Level, indent: usize) {
        for line in self.render(indent, PrintMode::Tree).lines() {
            match level {
                Level::ERROR => error!(target: "kvtree::core", "{}", line),
                Level::WARN => warn!(target: "kvtree::core", "{}", line),
                Level::INFO => info!(target: "kvtree::core", "{}", line),
                Level::DEBUG => debug!(target: "kvtree::core", "{}", line),
                _ => trace!(target: "kvtree::core", "{}", line),
            }
        }
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_into(f, 0, PrintMode::Tree)
    }
}
