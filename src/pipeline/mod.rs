//! Optimization Pipeline - one scheduled run, end to end
//!
//! ```text
//! PHASE 1: Window + run id from the run clock
//! PHASE 2: Fetch rows from the metrics source, convert row by row
//! PHASE 3: Decision engine (rules + bids), pure
//! PHASE 4: Idempotency filter against today's ledger partition
//! PHASE 5: Execute each action, append its ledger entry immediately to the
//!          partition of the run date
//! PHASE 6: Summarize, finalize, publish to sinks
//! ```
//!
//! Only configuration errors stop a run, and those surface at construction.
//! Everything else degrades into a warning on the run.

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{ConfigError, OptimizerConfig};
use crate::engine::{BidPredictor, DecisionEngine};
use crate::executor::{ActionExecutor, AdPlatform};
use crate::ledger::{ActionLedger, AppliedIndex};
use crate::source::{convert_rows, MetricsSource};
use crate::summary::{summarize, SummarySink};
use crate::types::{Action, LedgerEntry, OptimizationRun, RunWarning, RunWindow};

/// Finalized run plus anything that went wrong after finalization.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: OptimizationRun,
    /// Sink failures. Kept outside the run, which is frozen by then.
    pub sink_warnings: Vec<RunWarning>,
}

pub struct OptimizationPipeline {
    config: OptimizerConfig,
    engine: DecisionEngine,
    source: Arc<dyn MetricsSource>,
    executor: ActionExecutor,
    ledger: Arc<dyn ActionLedger>,
    sinks: Vec<Arc<dyn SummarySink>>,
}

impl OptimizationPipeline {
    pub fn new(
        config: OptimizerConfig,
        source: Arc<dyn MetricsSource>,
        platform: Arc<dyn AdPlatform>,
        ledger: Arc<dyn ActionLedger>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let engine = DecisionEngine::new(config.thresholds.clone())?
            .exclude_paused_from_bid_aggregate(config.run.exclude_paused_from_bid_aggregate);
        let executor = ActionExecutor::new(platform, Duration::from_secs(config.platform.timeout_secs));

        Ok(Self {
            config,
            engine,
            source,
            executor,
            ledger,
            sinks: Vec::new(),
        })
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn BidPredictor>) -> Self {
        self.engine = self.engine.with_predictor(predictor);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn SummarySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Execute one run at `now`. Always returns a finalized run.
    pub async fn run_once(&self, now: DateTime<Utc>) -> RunReport {
        // PHASE 1
        let window = RunWindow::trailing(now, self.config.run.lookback_days);

        // PHASE 2
        let mut warnings = Vec::new();
        let rows = match self.source.fetch(&window).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(source = self.source.source_name(), error = %e, "Metrics source unavailable");
                warnings.push(RunWarning::SourceUnavailable { error: e.to_string() });
                Vec::new()
            }
        };
        let (records, rejected) = convert_rows(rows);
        warnings.extend(rejected);

        // PHASE 3
        let screening = self.engine.screen(&records);
        let mut run = self.engine.decide(&screening, now, window);
        warnings.append(&mut run.warnings);
        run.warnings = warnings;

        // PHASE 4
        if self.config.run.skip_already_applied && !run.actions.is_empty() {
            self.skip_already_applied(&mut run, now).await;
        }

        // PHASE 5
        let partition = now.date_naive();
        for action in run.actions.clone() {
            let executed = self.executor.execute(action).await;
            let entry = LedgerEntry::from_executed(&run.run_id, &executed);
            if let Err(e) = self.append_entry(entry, partition).await {
                warn!(
                    run_id = %run.run_id,
                    resource = executed.action.resource_id(),
                    error = %e,
                    "Ledger append failed, platform state and ledger may diverge"
                );
                run.warnings.push(RunWarning::LedgerWrite {
                    resource_id: executed.action.resource_id().to_string(),
                    error: e,
                });
            }
            run.record_outcome(executed);
        }

        // PHASE 6
        let summary = summarize(&run, &screening.eligible, self.engine.thresholds());
        let run = run.finalize(summary, Utc::now());
        info!(
            run_id = %run.run_id,
            actions = run.actions.len(),
            failed = run.failed_actions().count(),
            skipped = run.skipped.len(),
            warnings = run.warnings.len(),
            "Optimization run finalized"
        );

        let sink_warnings = self.publish(&run).await;
        RunReport { run, sink_warnings }
    }

    async fn skip_already_applied(&self, run: &mut OptimizationRun, now: DateTime<Utc>) {
        let ledger = Arc::clone(&self.ledger);
        let partition = now.date_naive();
        let entries = tokio::task::spawn_blocking(move || ledger.read_partition(partition))
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r.map_err(|e| e.to_string()));

        let index = match entries {
            Ok(entries) => AppliedIndex::from_entries(&entries),
            Err(error) => {
                warn!(partition = %partition, error = %error, "Could not read today's ledger, idempotency check skipped");
                run.warnings.push(RunWarning::LedgerRead { error });
                return;
            }
        };

        let (keep, skip): (Vec<Action>, Vec<Action>) =
            std::mem::take(&mut run.actions).into_iter().partition(|a| match a {
                Action::PauseCreative { creative_id, .. } => !index.creative_paused(creative_id),
                Action::AdjustBid { campaign_id, new_bid, .. } => !index.bid_applied(campaign_id, *new_bid),
                Action::FlagWinner { .. } => true,
            });

        for action in &skip {
            info!(
                action = %action.kind(),
                resource = action.resource_id(),
                "Already applied today, skipping"
            );
        }
        run.actions = keep;
        run.skipped = skip;
    }

    /// Entries land in the run-date partition, the same one the idempotency
    /// check reads, even when execution crosses midnight.
    async fn append_entry(&self, entry: LedgerEntry, partition: NaiveDate) -> Result<(), String> {
        let ledger = Arc::clone(&self.ledger);
        tokio::task::spawn_blocking(move || ledger.append(&entry, partition))
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())
    }

    /// Sinks publish concurrently; warnings come back in registration order.
    async fn publish(&self, run: &OptimizationRun) -> Vec<RunWarning> {
        let results = join_all(self.sinks.iter().map(|sink| sink.publish(run))).await;

        self.sinks
            .iter()
            .zip(results)
            .filter_map(|(sink, result)| {
                let e = result.err()?;
                warn!(sink = sink.name(), error = %e, "Summary sink failed");
                Some(RunWarning::SinkFailed {
                    sink: sink.name().to_string(),
                    error: e.to_string(),
                })
            })
            .collect()
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::DryRunPlatform;
    use crate::ledger::InMemoryLedger;
    use crate::source::StaticSource;
    use chrono::TimeZone;
    use serde_json::json;

    fn rows() -> Vec<serde_json::Value> {
        vec![
            json!({
                "creative_id": "C1", "campaign_id": "K1", "avg_ctr": 0.8, "avg_cpc": 2.0,
                "total_clicks": 150, "total_impressions": 18750, "total_cost": 300.0,
                "total_conversions": 2, "days_active": 7
            }),
            json!({
                "creative_id": "C2", "campaign_id": "K1", "avg_ctr": 4.5, "avg_cpc": 3.0,
                "total_clicks": 200, "total_impressions": 4444, "total_cost": 600.0,
                "total_conversions": 9, "days_active": 7
            }),
            json!({ "creative_id": "C3" }),
        ]
    }

    #[tokio::test]
    async fn run_records_every_action_in_the_ledger() {
        let ledger = Arc::new(InMemoryLedger::new());
        let pipeline = OptimizationPipeline::new(
            OptimizerConfig::default(),
            Arc::new(StaticSource::new(rows())),
            Arc::new(DryRunPlatform),
            ledger.clone(),
        )
        .unwrap();

        let now = Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap();
        let report = pipeline.run_once(now).await;
        let run = report.run;

        assert!(run.is_finalized());
        assert_eq!(run.records_considered, 2);
        assert!(matches!(run.warnings[0], RunWarning::RejectedRecord { index: 2, .. }));
        assert_eq!(run.executed.len(), run.actions.len());
        assert_eq!(ledger.len(), run.actions.len());
        assert!(report.sink_warnings.is_empty());
    }
}
