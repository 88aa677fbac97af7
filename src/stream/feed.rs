use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One frame from the push channel: a kind tag plus an opaque payload. The
/// set of event kinds is open; unknown kinds pass through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsEnvelope {
    pub event: String,
    pub payload: Value,
}

/// Payload shape of the scan-result event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub strategy_name: String,
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub details: ScanDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanDetails {
    pub price: f64,
    pub volume: f64,
    pub amount: f64,
}

/// Event kind carrying [`ScanResult`] payloads.
pub const SCAN_RESULT_EVENT: &str = "scan_result_found";

/// Buffer cap: the feed keeps the most recent N envelopes, evicting the
/// oldest on push so a long-running session cannot grow without bound.
pub const DEFAULT_RETENTION: usize = 1000;

/// Append-only view over one subscription's messages, filtered to a single
/// event kind and displayed newest first.
pub struct Feed {
    event_kind: String,
    messages: VecDeque<WsEnvelope>,
    retention: usize,
}

impl Feed {
    pub fn new(event_kind: impl Into<String>) -> Self {
        Self::with_retention(event_kind, DEFAULT_RETENTION)
    }

    pub fn with_retention(event_kind: impl Into<String>, retention: usize) -> Self {
        Self {
            event_kind: event_kind.into(),
            messages: VecDeque::new(),
            retention: retention.max(1),
        }
    }

    /// Appends an envelope in arrival order. Returns the parsed result when
    /// the envelope is of the kind of interest and well-formed.
    pub fn push(&mut self, envelope: WsEnvelope) -> Option<ScanResult> {
        let parsed = if envelope.event == self.event_kind {
            serde_json::from_value(envelope.payload.clone()).ok()
        } else {
            None
        };

        self.messages.push_back(envelope);
        while self.messages.len() > self.retention {
            self.messages.pop_front();
        }
        parsed
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The derived display sequence: matching kind only, malformed payloads
    /// excluded, fully re-sorted by timestamp descending on every call. The
    /// sort is stable, so equal timestamps keep arrival order.
    pub fn scan_results(&self) -> Vec<ScanResult> {
        let mut results: Vec<ScanResult> = self
            .messages
            .iter()
            .filter(|m| m.event == self.event_kind)
            .filter_map(|m| serde_json::from_value(m.payload.clone()).ok())
            .collect();
        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        results
    }
}
