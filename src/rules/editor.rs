//! Path-addressed mutation of an owned rule tree.
//!
//! Every operation targets one node by its [`NodePath`] and either succeeds or
//! fails loudly with a typed error. A failed operation never alters the tree,
//! so the editing surface can keep using its working copy after a bad path.

use thiserror::Error;

use crate::rules::node::{BoolOp, RuleNode, Timeframe};
use crate::rules::path::NodePath;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    /// A path segment is out of range, malformed, or walks into a condition.
    #[error("invalid path '{0}'")]
    InvalidPath(String),
    /// A group-only operation addressed a condition.
    #[error("node at '{0}' is not a group")]
    NotAGroup(String),
    /// A condition-only operation addressed a group.
    #[error("node at '{0}' is not a condition")]
    NotACondition(String),
}

impl RuleNode {
    /// Resolves `path` by walking child indices from this node.
    pub fn get(&self, path: &NodePath) -> Result<&RuleNode, EditError> {
        let mut node = self;
        for &index in path.indices() {
            match node {
                RuleNode::Group { children, .. } => {
                    node = children
                        .get(index)
                        .ok_or_else(|| EditError::InvalidPath(path.to_string()))?;
                }
                RuleNode::Condition { .. } => {
                    return Err(EditError::InvalidPath(path.to_string()));
                }
            }
        }
        Ok(node)
    }

    pub fn get_mut(&mut self, path: &NodePath) -> Result<&mut RuleNode, EditError> {
        let mut node = self;
        for &index in path.indices() {
            match node {
                RuleNode::Group { children, .. } => {
                    node = children
                        .get_mut(index)
                        .ok_or_else(|| EditError::InvalidPath(path.to_string()))?;
                }
                RuleNode::Condition { .. } => {
                    return Err(EditError::InvalidPath(path.to_string()));
                }
            }
        }
        Ok(node)
    }

    /// Inserts `node` into the group at `group_path`. `index` of `None`
    /// appends; `Some(i)` must satisfy `i <= len`, later siblings shift right.
    pub fn insert_child(
        &mut self,
        group_path: &NodePath,
        index: Option<usize>,
        node: RuleNode,
    ) -> Result<(), EditError> {
        match self.get_mut(group_path)? {
            RuleNode::Group { children, .. } => {
                let at = index.unwrap_or(children.len());
                if at > children.len() {
                    return Err(EditError::InvalidPath(group_path.child(at).to_string()));
                }
                children.insert(at, node);
                Ok(())
            }
            RuleNode::Condition { .. } => Err(EditError::NotAGroup(group_path.to_string())),
        }
    }

    /// Removes and returns the `index`-th child of the group at `parent_path`.
    ///
    /// Only children are removable; the root is unreachable here, callers
    /// derive (parent, index) from a node's own path via
    /// [`NodePath::split_last`].
    pub fn remove_at(
        &mut self,
        parent_path: &NodePath,
        index: usize,
    ) -> Result<RuleNode, EditError> {
        match self.get_mut(parent_path)? {
            RuleNode::Group { children, .. } => {
                if index >= children.len() {
                    return Err(EditError::InvalidPath(
                        parent_path.child(index).to_string(),
                    ));
                }
                Ok(children.remove(index))
            }
            RuleNode::Condition { .. } => Err(EditError::NotAGroup(parent_path.to_string())),
        }
    }

    /// Replaces the expression text of the condition at `path`.
    pub fn set_value(
        &mut self,
        path: &NodePath,
        value: impl Into<String>,
    ) -> Result<(), EditError> {
        match self.get_mut(path)? {
            RuleNode::Condition { value: current, .. } => {
                *current = value.into();
                Ok(())
            }
            RuleNode::Group { .. } => Err(EditError::NotACondition(path.to_string())),
        }
    }

    /// Replaces the timeframe of the condition at `path`.
    pub fn set_timeframe(
        &mut self,
        path: &NodePath,
        timeframe: Option<Timeframe>,
    ) -> Result<(), EditError> {
        match self.get_mut(path)? {
            RuleNode::Condition {
                timeframe: current, ..
            } => {
                *current = timeframe;
                Ok(())
            }
            RuleNode::Group { .. } => Err(EditError::NotACondition(path.to_string())),
        }
    }

    /// Replaces the boolean operator of the group at `path`.
    pub fn set_operator(&mut self, path: &NodePath, operator: BoolOp) -> Result<(), EditError> {
        match self.get_mut(path)? {
            RuleNode::Group {
                operator: current, ..
            } => {
                *current = operator;
                Ok(())
            }
            RuleNode::Condition { .. } => Err(EditError::NotAGroup(path.to_string())),
        }
    }
}
