//! Conversion between rule trees and the persisted `scan_rules` wire shape.
//!
//! The wire format is shared with the backend evaluator and is
//! compatibility-sensitive down to field names and variant tags.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::rules::node::RuleNode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed rule tree: {0}")]
    MalformedTree(String),
}

/// The two named scan phases persisted under a strategy's `scan_rules` key.
///
/// A phase missing from the wire decodes to the empty AND group, never an
/// error: strategies created before the tree model existed carry no phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRules {
    #[serde(default = "RuleNode::empty_group")]
    pub first_scan: RuleNode,
    #[serde(default = "RuleNode::empty_group")]
    pub second_scan: RuleNode,
}

impl Default for ScanRules {
    fn default() -> Self {
        ScanRules {
            first_scan: RuleNode::empty_group(),
            second_scan: RuleNode::empty_group(),
        }
    }
}

/// Encodes one tree into its wire value.
pub fn encode(root: &RuleNode) -> Value {
    serde_json::to_value(root).expect("rule tree serialization is infallible")
}

/// Decodes one tree from its wire value.
pub fn decode(value: &Value) -> Result<RuleNode, CodecError> {
    serde_json::from_value(value.clone()).map_err(|e| CodecError::MalformedTree(e.to_string()))
}

pub fn encode_scan_rules(rules: &ScanRules) -> Value {
    serde_json::to_value(rules).expect("scan rules serialization is infallible")
}

/// Decodes a `scan_rules` object, also enforcing the root-is-group invariant
/// for both phases.
pub fn decode_scan_rules(value: &Value) -> Result<ScanRules, CodecError> {
    let rules: ScanRules =
        serde_json::from_value(value.clone()).map_err(|e| CodecError::MalformedTree(e.to_string()))?;

    for (phase, root) in [
        ("first_scan", &rules.first_scan),
        ("second_scan", &rules.second_scan),
    ] {
        if !root.is_group() {
            return Err(CodecError::MalformedTree(format!(
                "{phase} root must be a group"
            )));
        }
    }
    Ok(rules)
}
