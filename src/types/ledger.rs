//! Ledger entry shape

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ActionKind, ActionOutcome, ExecutedAction};

/// One journal line per executed action. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub timestamp: DateTime<Utc>,
    /// Run that produced the action. Absent on entries written by older tooling.
    #[serde(default)]
    pub run_id: String,
    pub action_type: ActionKind,
    pub resource_id: String,
    #[serde(default)]
    pub campaign_id: String,
    pub reason: String,
    #[serde(default)]
    pub metrics: serde_json::Value,
    pub outcome: ActionOutcome,
}

impl LedgerEntry {
    pub fn from_executed(run_id: &str, executed: &ExecutedAction) -> Self {
        Self {
            timestamp: executed.executed_at,
            run_id: run_id.to_string(),
            action_type: executed.action.kind(),
            resource_id: executed.action.resource_id().to_string(),
            campaign_id: executed.action.campaign_id().to_string(),
            reason: executed.action.reason().to_string(),
            metrics: executed.action.metrics_json(),
            outcome: executed.outcome.clone(),
        }
    }

    /// New bid recorded on an `adjust_bid` entry, if any.
    pub fn new_bid(&self) -> Option<f64> {
        self.metrics.get("new_bid").and_then(serde_json::Value::as_f64)
    }
}
