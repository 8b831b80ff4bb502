//! Run Summary Builder
//!
//! Pure aggregation of one run's metrics and actions into a `RunSummary`,
//! plus the flat metric data points handed to metrics sinks.

mod sinks;

pub use sinks::{JsonFileSink, SinkError, SummarySink, TracingSink};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ThresholdConfig;
use crate::types::{
    ActionCounts, ActionKind, CampaignAggregate, CampaignRollup, OptimizationRun,
    PerformanceCategory, PerformanceRecord, PortfolioHealth, RunSummary,
};

/// Build the summary for a run over the records it considered.
///
/// Outcome counts come from `run.executed`; call after execution.
pub fn summarize(
    run: &OptimizationRun,
    records: &[PerformanceRecord],
    thresholds: &ThresholdConfig,
) -> RunSummary {
    let n = records.len();
    let mean = |f: fn(&PerformanceRecord) -> f64| {
        if n == 0 {
            0.0
        } else {
            records.iter().map(f).sum::<f64>() / n as f64
        }
    };

    let count_kind = |kind: ActionKind| run.actions.iter().filter(|a| a.kind() == kind).count();
    let applied = run.executed.iter().filter(|e| e.outcome.is_applied()).count();
    let applied_pauses = run
        .executed
        .iter()
        .filter(|e| e.outcome.is_applied() && e.action.kind() == ActionKind::PauseCreative)
        .count();

    let actions = ActionCounts {
        total: run.actions.len(),
        paused: count_kind(ActionKind::PauseCreative),
        winners: count_kind(ActionKind::FlagWinner),
        bid_adjustments: count_kind(ActionKind::AdjustBid),
        applied,
        failed: run.executed.len() - applied,
        skipped: run.skipped.len(),
        bid_no_ops: run.bid_no_ops.len(),
    };

    let portfolio = PortfolioHealth {
        total_creatives: n,
        active_creatives: n.saturating_sub(applied_pauses),
        high_performers: records
            .iter()
            .filter(|r| r.avg_ctr > thresholds.top_performer_ctr)
            .count(),
        underperformers: records.iter().filter(|r| r.avg_ctr < thresholds.min_ctr).count(),
    };

    let mut categories: BTreeMap<String, usize> = BTreeMap::new();
    for r in records {
        *categories
            .entry(PerformanceCategory::from_ctr(r.avg_ctr).label().to_string())
            .or_default() += 1;
    }

    let campaigns = CampaignAggregate::group(records)
        .into_iter()
        .map(|agg| CampaignRollup {
            campaign_id: agg.campaign_id,
            impressions: agg.total_impressions,
            clicks: agg.total_clicks,
            cost: agg.total_cost,
            avg_ctr: agg.avg_ctr,
        })
        .collect();

    RunSummary {
        run_id: run.run_id.clone(),
        records_considered: n,
        total_impressions: records.iter().map(|r| r.total_impressions).sum(),
        total_clicks: records.iter().map(|r| r.total_clicks).sum(),
        total_cost: records.iter().map(|r| r.total_cost).sum(),
        total_conversions: records.iter().map(|r| r.total_conversions).sum(),
        avg_ctr: mean(|r| r.avg_ctr),
        avg_cpc: mean(|r| r.avg_cpc),
        actions,
        portfolio,
        categories,
        campaigns,
    }
}

/// One named data point for a metrics sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDatum {
    pub name: &'static str,
    pub value: f64,
    pub unit: MetricUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricUnit {
    Count,
    Percent,
    None,
}

impl RunSummary {
    /// Flatten into the data points published per run.
    #[allow(clippy::cast_precision_loss)]
    pub fn metric_data(&self) -> Vec<MetricDatum> {
        let point = |name, value, unit| MetricDatum { name, value, unit };
        vec![
            point("TotalActions", self.actions.total as f64, MetricUnit::Count),
            point("CreativesPaused", self.actions.paused as f64, MetricUnit::Count),
            point("BidAdjustments", self.actions.bid_adjustments as f64, MetricUnit::Count),
            point("TopPerformersIdentified", self.actions.winners as f64, MetricUnit::Count),
            point("TotalImpressions", self.total_impressions as f64, MetricUnit::Count),
            point("TotalClicks", self.total_clicks as f64, MetricUnit::Count),
            point("TotalCost", self.total_cost, MetricUnit::None),
            point("AverageCTR", self.avg_ctr, MetricUnit::Percent),
            point("AverageCPC", self.avg_cpc, MetricUnit::None),
            point("TotalCreatives", self.portfolio.total_creatives as f64, MetricUnit::Count),
            point("ActiveCreatives", self.portfolio.active_creatives as f64, MetricUnit::Count),
            point("HighPerformers", self.portfolio.high_performers as f64, MetricUnit::Count),
            point("Underperformers", self.portfolio.underperformers as f64, MetricUnit::Count),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        run_id_for, Action, ActionMetrics, ActionOutcome, ExecutedAction, RunWindow,
    };
    use chrono::{TimeZone, Utc};

    fn record(creative: &str, campaign: &str, ctr: f64, cpc: f64) -> PerformanceRecord {
        PerformanceRecord {
            creative_id: creative.into(),
            campaign_id: campaign.into(),
            avg_ctr: ctr,
            avg_cpc: cpc,
            total_clicks: 200,
            total_impressions: 10_000,
            total_cost: cpc * 200.0,
            total_conversions: 4,
            days_active: 7,
        }
    }

    fn pause(id: &str) -> Action {
        Action::PauseCreative {
            creative_id: id.into(),
            campaign_id: "K1".into(),
            reason: "low CTR (0.50%) below threshold".into(),
            metrics: ActionMetrics { ctr: 0.5, cpc: 2.0, clicks: 200, impressions: 10_000, cost: 400.0 },
        }
    }

    #[test]
    fn totals_and_means() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap();
        let mut run = OptimizationRun::empty(run_id_for(now), now, RunWindow::trailing(now, 7));
        run.actions = vec![pause("C1"), pause("C2")];
        run.executed = vec![
            ExecutedAction { action: pause("C1"), outcome: ActionOutcome::Applied, executed_at: now },
            ExecutedAction {
                action: pause("C2"),
                outcome: ActionOutcome::Failed { cause: "timeout".into() },
                executed_at: now,
            },
        ];
        let records = vec![
            record("C1", "K1", 0.5, 2.0),
            record("C2", "K1", 0.7, 4.0),
            record("C3", "K2", 4.0, 3.0),
        ];

        let s = summarize(&run, &records, &ThresholdConfig::default());
        assert_eq!(s.total_impressions, 30_000);
        assert_eq!(s.total_clicks, 600);
        assert!((s.avg_ctr - 1.7333).abs() < 1e-3);
        assert_eq!(s.avg_cpc, 3.0);
        assert_eq!(s.actions.paused, 2);
        assert_eq!(s.actions.applied, 1);
        assert_eq!(s.actions.failed, 1);
        assert_eq!(s.portfolio.active_creatives, 2);
        assert_eq!(s.portfolio.high_performers, 1);
        assert_eq!(s.portfolio.underperformers, 2);
        assert_eq!(s.categories.get("low"), Some(&2));
        assert_eq!(s.categories.get("high"), Some(&1));
        assert_eq!(s.campaigns.len(), 2);
        assert_eq!(s.campaigns[0].campaign_id, "K1");
    }

    #[test]
    fn empty_run_summarizes_to_zeroes() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap();
        let run = OptimizationRun::empty(run_id_for(now), now, RunWindow::trailing(now, 7));
        let s = summarize(&run, &[], &ThresholdConfig::default());
        assert_eq!(s.avg_ctr, 0.0);
        assert_eq!(s.actions, ActionCounts::default());
    }

    #[test]
    fn metric_names_are_stable() {
        let names: Vec<_> = RunSummary::default().metric_data().iter().map(|d| d.name).collect();
        assert_eq!(names.len(), 13);
        assert!(names.contains(&"AverageCTR"));
        assert!(names.contains(&"TopPerformersIdentified"));
    }
}
