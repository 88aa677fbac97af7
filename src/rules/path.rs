use std::fmt;
use std::str::FromStr;

use crate::rules::editor::EditError;

/// Address of a node inside a rule tree: the child indices walked from the
/// root. The textual form alternates the literal `children` and a zero-based
/// index (`children.0.children.1`); the root is the empty string.
///
/// A path is only meaningful against the tree it was derived from; callers
/// re-derive paths after any structural mutation instead of caching them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        NodePath(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The path of this node's `index`-th child.
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        NodePath(indices)
    }

    /// Splits a non-root path into (parent path, final index), the pair
    /// `remove_at` operates on. Returns `None` for the root.
    pub fn split_last(&self) -> Option<(NodePath, usize)> {
        let (&last, parent) = self.0.split_last()?;
        Some((NodePath(parent.to_vec()), last))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "children.{index}")?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(NodePath::root());
        }

        let mut indices = Vec::new();
        let mut parts = s.split('.');
        while let Some(field) = parts.next() {
            if field != "children" {
                return Err(EditError::InvalidPath(s.to_string()));
            }
            let index = parts
                .next()
                .ok_or_else(|| EditError::InvalidPath(s.to_string()))?;
            let index: usize = index
                .parse()
                .map_err(|_| EditError::InvalidPath(s.to_string()))?;
            indices.push(index);
        }
        Ok(NodePath(indices))
    }
}
