//! Decision Engine
//!
//! Turns one metrics snapshot into an `OptimizationRun` holding the decided
//! actions. Pure with respect to its inputs: no I/O, and the same snapshot,
//! clock and thresholds always yield the same action list.
//!
//! ```text
//! records ─► screen (dedupe, eligibility) ─► creative rules ─┐
//!                         │                                  ├─► validate ─► run
//!                         └─► campaign aggregates ─► bids ───┘
//! ```

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::bidding::{suggest_for_campaign, BidPredictor};
use super::rules;
use crate::config::{ConfigError, ThresholdConfig};
use crate::types::{
    run_id_for, Action, ActionKind, BidNoOp, CampaignAggregate, OptimizationRun,
    PerformanceRecord, RunWarning, RunWindow,
};

/// Result of filtering a snapshot down to decisionable records.
#[derive(Debug, Clone, Default)]
pub struct Screening {
    /// Unique records meeting the sample-size floor, in input order.
    pub eligible: Vec<PerformanceRecord>,
    /// Records dropped for insufficient clicks.
    pub excluded: usize,
    pub warnings: Vec<RunWarning>,
}

/// Bid decisions for every campaign in a run.
#[derive(Debug, Clone, Default)]
struct BidDecisions {
    actions: Vec<Action>,
    no_ops: Vec<BidNoOp>,
}

pub struct DecisionEngine {
    thresholds: ThresholdConfig,
    exclude_paused: bool,
    predictor: Option<Arc<dyn BidPredictor>>,
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("thresholds", &self.thresholds)
            .field("exclude_paused", &self.exclude_paused)
            .field("predictor", &self.predictor.as_ref().map(|p| p.name().to_string()))
            .finish()
    }
}

impl DecisionEngine {
    /// Build an engine. Malformed thresholds are refused outright.
    pub fn new(thresholds: ThresholdConfig) -> Result<Self, ConfigError> {
        thresholds.validate()?;
        Ok(Self {
            thresholds,
            exclude_paused: true,
            predictor: None,
        })
    }

    /// Attach a learned bid predictor. It supersedes the heuristic whenever
    /// it returns a usable value.
    pub fn with_predictor(mut self, predictor: Arc<dyn BidPredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    /// Whether creatives paused in this run are left out of their
    /// campaign's bid aggregate (default `true`).
    pub fn exclude_paused_from_bid_aggregate(mut self, exclude: bool) -> Self {
        self.exclude_paused = exclude;
        self
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Drop duplicates (first occurrence wins) and sub-sample records.
    pub fn screen(&self, records: &[PerformanceRecord]) -> Screening {
        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        let mut screening = Screening::default();

        for record in records {
            if !seen.insert((record.creative_id.as_str(), record.campaign_id.as_str())) {
                warn!(
                    creative = %record.creative_id,
                    campaign = %record.campaign_id,
                    "Duplicate performance record, keeping first occurrence"
                );
                screening.warnings.push(RunWarning::DuplicateRecord {
                    creative_id: record.creative_id.clone(),
                    campaign_id: record.campaign_id.clone(),
                });
                continue;
            }
            if record.is_eligible(self.thresholds.min_sample_size) {
                screening.eligible.push(record.clone());
            } else {
                debug!(
                    creative = %record.creative_id,
                    clicks = record.total_clicks,
                    min = self.thresholds.min_sample_size,
                    "Below minimum sample size, excluded"
                );
                screening.excluded += 1;
            }
        }
        screening
    }

    /// Screen and decide in one step.
    pub fn run(
        &self,
        records: &[PerformanceRecord],
        started_at: DateTime<Utc>,
        window: RunWindow,
    ) -> OptimizationRun {
        let screening = self.screen(records);
        self.decide(&screening, started_at, window)
    }

    /// Produce the run for an already screened snapshot.
    ///
    /// Creative actions come first in record order, then bid actions in
    /// campaign order. Zero eligible records yields an empty run.
    pub fn decide(
        &self,
        screening: &Screening,
        started_at: DateTime<Utc>,
        window: RunWindow,
    ) -> OptimizationRun {
        let mut run = OptimizationRun::empty(run_id_for(started_at), started_at, window);
        run.records_considered = screening.eligible.len();
        run.records_excluded = screening.excluded;
        run.warnings.extend(screening.warnings.iter().cloned());

        if screening.eligible.is_empty() {
            info!(run_id = %run.run_id, "No eligible records, nothing to decide");
            return run;
        }

        let creative_actions = rules::evaluate(&screening.eligible, &self.thresholds);
        let bids = self.decide_bids(&screening.eligible, &creative_actions, started_at);

        let (actions, invalid) = self.validate(creative_actions.into_iter().chain(bids.actions));
        for w in &invalid {
            warn!(run_id = %run.run_id, "{}", w);
        }
        run.warnings.extend(invalid);
        run.actions = actions;
        run.bid_no_ops = bids.no_ops;

        info!(
            run_id = %run.run_id,
            considered = run.records_considered,
            excluded = run.records_excluded,
            actions = run.actions.len(),
            bid_no_ops = run.bid_no_ops.len(),
            "Decision pass complete"
        );
        run
    }

    fn decide_bids(
        &self,
        eligible: &[PerformanceRecord],
        creative_actions: &[Action],
        at: DateTime<Utc>,
    ) -> BidDecisions {
        let paused: HashSet<(&str, &str)> = if self.exclude_paused {
            creative_actions
                .iter()
                .filter(|a| a.kind() == ActionKind::PauseCreative)
                .map(|a| (a.resource_id(), a.campaign_id()))
                .collect()
        } else {
            HashSet::new()
        };

        let active = eligible
            .iter()
            .filter(|r| !paused.contains(&(r.creative_id.as_str(), r.campaign_id.as_str())));

        let t = &self.thresholds;
        let mut decisions = BidDecisions::default();

        for agg in CampaignAggregate::group(active) {
            let s = suggest_for_campaign(&agg, t, self.predictor.as_deref(), at);
            let delta = s.delta();

            if delta.abs() >= t.bid_change_threshold {
                info!(
                    campaign = %agg.campaign_id,
                    old_bid = s.current,
                    new_bid = s.suggested,
                    source = %s.source,
                    "Bid adjustment decided"
                );
                decisions.actions.push(Action::AdjustBid {
                    campaign_id: agg.campaign_id.clone(),
                    old_bid: s.current,
                    new_bid: s.suggested,
                    source: s.source,
                    reason: format!(
                        "bid optimization: ${:.2} -> ${:.2} ({})",
                        s.current, s.suggested, s.source
                    ),
                });
            } else {
                info!(
                    campaign = %agg.campaign_id,
                    current = s.current,
                    suggested = s.suggested,
                    delta,
                    "Bid change below threshold, no-op"
                );
                decisions.no_ops.push(BidNoOp {
                    campaign_id: agg.campaign_id.clone(),
                    current_bid: s.current,
                    suggested_bid: s.suggested,
                    delta,
                    source: s.source,
                });
            }
        }
        decisions
    }

    /// Drop actions that must never reach the platform: out-of-range bids
    /// and a second action of the same kind on the same resource.
    fn validate<I>(&self, actions: I) -> (Vec<Action>, Vec<RunWarning>)
    where
        I: IntoIterator<Item = Action>,
    {
        let t = &self.thresholds;
        let mut seen: HashSet<(ActionKind, String)> = HashSet::new();
        let mut kept = Vec::new();
        let mut warnings = Vec::new();

        for action in actions {
            if let Action::AdjustBid { new_bid, .. } = &action {
                if !new_bid.is_finite() || *new_bid < t.bid_floor || *new_bid > t.predictor_bid_ceiling {
                    warnings.push(RunWarning::InvalidAction {
                        resource_id: action.resource_id().to_string(),
                        error: format!(
                            "bid {new_bid} outside [{:.2}, {:.2}]",
                            t.bid_floor, t.predictor_bid_ceiling
                        ),
                    });
                    continue;
                }
            }
            if !seen.insert((action.kind(), action.resource_id().to_string())) {
                warnings.push(RunWarning::InvalidAction {
                    resource_id: action.resource_id().to_string(),
                    error: format!("duplicate {} in the same run", action.kind()),
                });
                continue;
            }
            kept.push(action);
        }
        (kept, warnings)
    }
}
