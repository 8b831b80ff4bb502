//! Optimization run, window, warnings and the aggregate summary

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Action, BidNoOp, ExecutedAction};

/// Trailing time range the metrics snapshot covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl RunWindow {
    pub fn trailing(end: DateTime<Utc>, lookback_days: u32) -> Self {
        Self {
            start: end - Duration::days(i64::from(lookback_days)),
            end,
        }
    }
}

/// Run identifier derived from the run clock, e.g. `run-20261018T060000.000Z`.
pub fn run_id_for(now: DateTime<Utc>) -> String {
    format!("run-{}", now.format("%Y%m%dT%H%M%S%.3fZ"))
}

/// Non-fatal problem encountered during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    /// Metrics source could not be read; the run proceeds with no records.
    SourceUnavailable { error: String },
    /// A source row was rejected before decisioning.
    RejectedRecord { index: usize, error: String },
    /// The same (creative, campaign) appeared more than once.
    DuplicateRecord { creative_id: String, campaign_id: String },
    /// A decided action failed validation and was dropped.
    InvalidAction { resource_id: String, error: String },
    /// The ledger could not be read for idempotency checks.
    LedgerRead { error: String },
    /// An executed action could not be journaled.
    LedgerWrite { resource_id: String, error: String },
    /// A summary sink failed to accept the summary.
    SinkFailed { sink: String, error: String },
}

impl std::fmt::Display for RunWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunWarning::SourceUnavailable { error } => write!(f, "metrics source unavailable: {error}"),
            RunWarning::RejectedRecord { index, error } => write!(f, "row {index} rejected: {error}"),
            RunWarning::DuplicateRecord { creative_id, campaign_id } => {
                write!(f, "duplicate record for creative {creative_id} in campaign {campaign_id}")
            }
            RunWarning::InvalidAction { resource_id, error } => {
                write!(f, "dropped invalid action for {resource_id}: {error}")
            }
            RunWarning::LedgerRead { error } => write!(f, "ledger read failed: {error}"),
            RunWarning::LedgerWrite { resource_id, error } => {
                write!(f, "ledger write failed for {resource_id}: {error}")
            }
            RunWarning::SinkFailed { sink, error } => write!(f, "sink {sink} failed: {error}"),
        }
    }
}

/// Per-campaign rollup carried in the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRollup {
    pub campaign_id: String,
    pub impressions: u64,
    pub clicks: u64,
    pub cost: f64,
    pub avg_ctr: f64,
}

/// Aggregate counts of the creative portfolio after the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHealth {
    pub total_creatives: usize,
    pub active_creatives: usize,
    pub high_performers: usize,
    pub underperformers: usize,
}

/// Counts of actions by type and outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCounts {
    pub total: usize,
    pub paused: usize,
    pub winners: usize,
    pub bid_adjustments: usize,
    pub applied: usize,
    pub failed: usize,
    /// Decided but skipped because today's ledger already shows them applied.
    pub skipped: usize,
    pub bid_no_ops: usize,
}

/// Single structured report object per run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub records_considered: usize,
    pub total_impressions: u64,
    pub total_clicks: u64,
    pub total_cost: f64,
    pub total_conversions: u64,
    /// Mean of per-record CTR (percent).
    pub avg_ctr: f64,
    /// Mean of per-record CPC.
    pub avg_cpc: f64,
    pub actions: ActionCounts,
    pub portfolio: PortfolioHealth,
    pub categories: BTreeMap<String, usize>,
    pub campaigns: Vec<CampaignRollup>,
}

/// One scheduled invocation of the decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRun {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub window: RunWindow,
    pub records_considered: usize,
    pub records_excluded: usize,
    /// Decided actions, records first then campaigns.
    pub actions: Vec<Action>,
    pub bid_no_ops: Vec<BidNoOp>,
    /// Decided actions skipped by the cross-run idempotency check.
    #[serde(default)]
    pub skipped: Vec<Action>,
    #[serde(default)]
    pub executed: Vec<ExecutedAction>,
    #[serde(default)]
    pub summary: Option<RunSummary>,
    #[serde(default)]
    pub warnings: Vec<RunWarning>,
    #[serde(default)]
    pub finalized_at: Option<DateTime<Utc>>,
}

impl OptimizationRun {
    /// Empty run: "no decision" is a valid terminal outcome.
    pub fn empty(run_id: String, started_at: DateTime<Utc>, window: RunWindow) -> Self {
        Self {
            run_id,
            started_at,
            window,
            records_considered: 0,
            records_excluded: 0,
            actions: Vec::new(),
            bid_no_ops: Vec::new(),
            skipped: Vec::new(),
            executed: Vec::new(),
            summary: None,
            warnings: Vec::new(),
            finalized_at: None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }

    /// Record one action's outcome. Ignored once the run is finalized.
    pub fn record_outcome(&mut self, executed: ExecutedAction) {
        if !self.is_finalized() {
            self.executed.push(executed);
        }
    }

    /// Attach the summary and freeze the run. A finalized run is returned
    /// unchanged.
    pub fn finalize(mut self, summary: RunSummary, at: DateTime<Utc>) -> Self {
        if self.is_finalized() {
            return self;
        }
        self.summary = Some(summary);
        self.finalized_at = Some(at);
        self
    }

    pub fn failed_actions(&self) -> impl Iterator<Item = &ExecutedAction> {
        self.executed.iter().filter(|e| !e.outcome.is_applied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn run_id_is_derived_from_timestamp() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap();
        assert_eq!(run_id_for(now), "run-20261018T060000.000Z");
    }

    #[test]
    fn trailing_window_spans_lookback() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap();
        let w = RunWindow::trailing(now, 7);
        assert_eq!(w.end - w.start, Duration::days(7));
    }

    #[test]
    fn finalize_is_one_shot() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap();
        let run = OptimizationRun::empty(run_id_for(now), now, RunWindow::trailing(now, 7));
        let first = RunSummary { records_considered: 1, ..Default::default() };
        let run = run.finalize(first.clone(), now);
        let again = run.clone().finalize(RunSummary::default(), now);
        assert_eq!(again.summary, Some(first));
    }
}
