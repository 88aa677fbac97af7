use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rules::path::NodePath;

/// Boolean operator combining a group's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BoolOp {
    And,
    Or,
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolOp::And => write!(f, "AND"),
            BoolOp::Or => write!(f, "OR"),
        }
    }
}

impl FromStr for BoolOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Ok(BoolOp::And),
            "OR" => Ok(BoolOp::Or),
            other => Err(format!("unknown operator '{other}', expected AND or OR")),
        }
    }
}

/// Bar timeframe a condition is evaluated against.
///
/// The wire form of `None` is the empty string; it is distinct from an absent
/// timeframe field (first-phase conditions created before the field existed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "")]
    None,
    #[serde(rename = "day")]
    Day,
    #[serde(rename = "minute60")]
    Minute60,
    #[serde(rename = "minute30")]
    Minute30,
    #[serde(rename = "minute10")]
    Minute10,
    #[serde(rename = "minute5")]
    Minute5,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::None => "",
            Timeframe::Day => "day",
            Timeframe::Minute60 => "minute60",
            Timeframe::Minute30 => "minute30",
            Timeframe::Minute10 => "minute10",
            Timeframe::Minute5 => "minute5",
        }
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" => Ok(Timeframe::None),
            "day" => Ok(Timeframe::Day),
            "minute60" => Ok(Timeframe::Minute60),
            "minute30" => Ok(Timeframe::Minute30),
            "minute10" => Ok(Timeframe::Minute10),
            "minute5" => Ok(Timeframe::Minute5),
            other => Err(format!("unknown timeframe '{other}'")),
        }
    }
}

/// One node of a scan rule tree: a condition leaf or an AND/OR group.
///
/// A tree is always rooted at a `Group`; conditions only appear as children.
/// The wire shape is the tagged form consumed by the backend evaluator:
/// `{"type":"condition","value":...,"timeframe"?}` and
/// `{"type":"group","operator":...,"children":[...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleNode {
    Condition {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeframe: Option<Timeframe>,
    },
    Group {
        operator: BoolOp,
        children: Vec<RuleNode>,
    },
}

impl RuleNode {
    /// The default tree root: an AND group with no children.
    pub fn empty_group() -> Self {
        RuleNode::Group {
            operator: BoolOp::And,
            children: Vec::new(),
        }
    }

    pub fn group(operator: BoolOp, children: Vec<RuleNode>) -> Self {
        RuleNode::Group { operator, children }
    }

    pub fn condition(value: impl Into<String>) -> Self {
        RuleNode::Condition {
            value: value.into(),
            timeframe: None,
        }
    }

    pub fn condition_at(value: impl Into<String>, timeframe: Timeframe) -> Self {
        RuleNode::Condition {
            value: value.into(),
            timeframe: Some(timeframe),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, RuleNode::Group { .. })
    }

    /// Paths of all conditions whose expression is empty or blank.
    pub fn blank_conditions(&self) -> Vec<NodePath> {
        let mut blank = Vec::new();
        self.collect_blank(&NodePath::root(), &mut blank);
        blank
    }

    fn collect_blank(&self, path: &NodePath, blank: &mut Vec<NodePath>) {
        match self {
            RuleNode::Condition { value, .. } => {
                if value.trim().is_empty() {
                    blank.push(path.clone());
                }
            }
            RuleNode::Group { children, .. } => {
                for (index, child) in children.iter().enumerate() {
                    child.collect_blank(&path.child(index), blank);
                }
            }
        }
    }

    /// Indented text rendering for console output.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(0, &mut out);
        out
    }

    fn render_into(&self, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        match self {
            RuleNode::Condition { value, timeframe } => {
                let shown = if value.trim().is_empty() { "<empty>" } else { value };
                match timeframe {
                    Some(tf) if *tf != Timeframe::None => {
                        out.push_str(&format!("{indent}- [{}] {shown}\n", tf.as_str()))
                    }
                    _ => out.push_str(&format!("{indent}- {shown}\n")),
                }
            }
            RuleNode::Group { operator, children } => {
                out.push_str(&format!("{indent}{operator} ({} rules)\n", children.len()));
                for child in children {
                    child.render_into(depth + 1, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_group_is_and_with_no_children() {
        match RuleNode::empty_group() {
            RuleNode::Group { operator, children } => {
                assert_eq!(operator, BoolOp::And);
                assert!(children.is_empty());
            }
            RuleNode::Condition { .. } => panic!("expected a group"),
        }
    }

    #[test]
    fn blank_conditions_reports_paths() {
        let tree = RuleNode::group(
            BoolOp::And,
            vec![
                RuleNode::condition("close > open"),
                RuleNode::group(
                    BoolOp::Or,
                    vec![RuleNode::condition("  "), RuleNode::condition("volume > 0")],
                ),
            ],
        );

        let blank = tree.blank_conditions();
        assert_eq!(blank.len(), 1);
        assert_eq!(blank[0].to_string(), "children.1.children.0");
    }

    #[test]
    fn operator_and_timeframe_parse() {
        assert_eq!("or".parse::<BoolOp>().unwrap(), BoolOp::Or);
        assert!("XOR".parse::<BoolOp>().is_err());
        assert_eq!("minute30".parse::<Timeframe>().unwrap(), Timeframe::Minute30);
        assert_eq!("".parse::<Timeframe>().unwrap(), Timeframe::None);
        assert!("minute7".parse::<Timeframe>().is_err());
    }

    #[test]
    fn render_marks_timeframes() {
        let tree = RuleNode::group(
            BoolOp::And,
            vec![RuleNode::condition_at("close > open", Timeframe::Day)],
        );
        let text = tree.render();
        assert!(text.contains("AND (1 rules)"));
        assert!(text.contains("[day] close > open"));
    }
}
