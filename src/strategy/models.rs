use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules::{RuleNode, ScanRules};

/// A strategy as persisted by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub broker: String,
    pub market: String,
    pub scan_rules: ScanRules,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub cron_schedule: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request body for create and update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub broker: String,
    pub market: String,
    pub scan_rules: ScanRules,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub cron_schedule: Option<String>,
}

impl StrategyDraft {
    /// A fresh draft with empty rule trees for both phases.
    pub fn new(
        name: impl Into<String>,
        broker: impl Into<String>,
        market: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            broker: broker.into(),
            market: market.into(),
            scan_rules: ScanRules::default(),
            is_active: false,
            cron_schedule: None,
        }
    }
}

impl From<Strategy> for StrategyDraft {
    fn from(strategy: Strategy) -> Self {
        Self {
            name: strategy.name,
            description: strategy.description,
            broker: strategy.broker,
            market: strategy.market,
            scan_rules: strategy.scan_rules,
            is_active: strategy.is_active,
            cron_schedule: strategy.cron_schedule,
        }
    }
}

/// Which of the two scan phases a rule edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    First,
    Second,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::First => "first_scan",
            Phase::Second => "second_scan",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("strategy name must not be empty")]
    EmptyName,
    #[error("blank condition in {phase} at '{path}'")]
    BlankCondition { phase: &'static str, path: String },
}

/// One editing session's working copy: a draft plus the id of the strategy
/// being edited, or `None` when creating a new one. The trees inside are
/// exclusively owned here and mutated in place through the editor ops.
#[derive(Debug, Clone)]
pub struct EditSession {
    editing: Option<i64>,
    pub draft: StrategyDraft,
}

impl EditSession {
    pub fn create(draft: StrategyDraft) -> Self {
        Self {
            editing: None,
            draft,
        }
    }

    pub fn edit(strategy: Strategy) -> Self {
        Self {
            editing: Some(strategy.id),
            draft: strategy.into(),
        }
    }

    pub fn strategy_id(&self) -> Option<i64> {
        self.editing
    }

    pub fn is_new(&self) -> bool {
        self.editing.is_none()
    }

    pub fn phase(&self, phase: Phase) -> &RuleNode {
        match phase {
            Phase::First => &self.draft.scan_rules.first_scan,
            Phase::Second => &self.draft.scan_rules.second_scan,
        }
    }

    pub fn phase_mut(&mut self, phase: Phase) -> &mut RuleNode {
        match phase {
            Phase::First => &mut self.draft.scan_rules.first_scan,
            Phase::Second => &mut self.draft.scan_rules.second_scan,
        }
    }

    /// Submit-time validation: non-empty name, no blank condition text.
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.draft.name.trim().is_empty() {
            return Err(DraftError::EmptyName);
        }
        for phase in [Phase::First, Phase::Second] {
            if let Some(path) = self.phase(phase).blank_conditions().first() {
                return Err(DraftError::BlankCondition {
                    phase: phase.as_str(),
                    path: path.to_string(),
                });
            }
        }
        Ok(())
    }
}
