//! Actions decided by the engine and their execution outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PerformanceRecord;

/// Snapshot of the metrics that justified a creative-level action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMetrics {
    pub ctr: f64,
    pub cpc: f64,
    pub clicks: u64,
    pub impressions: u64,
    pub cost: f64,
}

impl From<&PerformanceRecord> for ActionMetrics {
    fn from(r: &PerformanceRecord) -> Self {
        Self {
            ctr: r.avg_ctr,
            cpc: r.avg_cpc,
            clicks: r.total_clicks,
            impressions: r.total_impressions,
            cost: r.total_cost,
        }
    }
}

/// Where a bid suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidSource {
    Heuristic,
    Predictor,
}

impl std::fmt::Display for BidSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BidSource::Heuristic => write!(f, "heuristic"),
            BidSource::Predictor => write!(f, "predictor"),
        }
    }
}

/// The engine's output unit. Pure data until executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    PauseCreative {
        creative_id: String,
        campaign_id: String,
        reason: String,
        metrics: ActionMetrics,
    },
    FlagWinner {
        creative_id: String,
        campaign_id: String,
        reason: String,
        metrics: ActionMetrics,
    },
    AdjustBid {
        campaign_id: String,
        old_bid: f64,
        new_bid: f64,
        source: BidSource,
        reason: String,
    },
}

/// Action discriminant, used for counting and ledger labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    PauseCreative,
    FlagWinner,
    AdjustBid,
}

impl ActionKind {
    /// Label written to the ledger's `action_type` column.
    pub fn ledger_label(self) -> &'static str {
        match self {
            ActionKind::PauseCreative => "pause_creative",
            ActionKind::FlagWinner => "identify_winner",
            ActionKind::AdjustBid => "adjust_bid",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.ledger_label())
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::PauseCreative { .. } => ActionKind::PauseCreative,
            Action::FlagWinner { .. } => ActionKind::FlagWinner,
            Action::AdjustBid { .. } => ActionKind::AdjustBid,
        }
    }

    /// The platform resource this action targets (creative or campaign id).
    pub fn resource_id(&self) -> &str {
        match self {
            Action::PauseCreative { creative_id, .. } | Action::FlagWinner { creative_id, .. } => {
                creative_id
            }
            Action::AdjustBid { campaign_id, .. } => campaign_id,
        }
    }

    pub fn campaign_id(&self) -> &str {
        match self {
            Action::PauseCreative { campaign_id, .. }
            | Action::FlagWinner { campaign_id, .. }
            | Action::AdjustBid { campaign_id, .. } => campaign_id,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Action::PauseCreative { reason, .. }
            | Action::FlagWinner { reason, .. }
            | Action::AdjustBid { reason, .. } => reason,
        }
    }

    /// Justifying metrics as a JSON object for the ledger.
    pub fn metrics_json(&self) -> serde_json::Value {
        match self {
            Action::PauseCreative { metrics, .. } | Action::FlagWinner { metrics, .. } => {
                serde_json::to_value(metrics).unwrap_or(serde_json::Value::Null)
            }
            Action::AdjustBid { old_bid, new_bid, source, .. } => serde_json::json!({
                "old_bid": old_bid,
                "new_bid": new_bid,
                "change": new_bid - old_bid,
                "source": source,
            }),
        }
    }
}

/// Result of applying an action against the ad platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Applied,
    Failed { cause: String },
}

impl ActionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied)
    }
}

/// An action after execution. Immutable once handed to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedAction {
    pub action: Action,
    pub outcome: ActionOutcome,
    pub executed_at: DateTime<Utc>,
}

/// A bid decision that was computed but not worth committing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidNoOp {
    pub campaign_id: String,
    pub current_bid: f64,
    pub suggested_bid: f64,
    pub delta: f64,
    pub source: BidSource,
}
