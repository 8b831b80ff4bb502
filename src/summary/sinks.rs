//! Summary sinks
//!
//! Fire-and-forget consumers of a finalized run. A sink failure is logged
//! and reported as a run warning by the caller; it never fails the run.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use crate::types::OptimizationRun;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink I/O error ({path}): {source}", path = .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("run {0} has no summary")]
    MissingSummary(String),
}

#[async_trait]
pub trait SummarySink: Send + Sync {
    async fn publish(&self, run: &OptimizationRun) -> Result<(), SinkError>;

    /// Name for logging
    fn name(&self) -> &str;
}

/// Logs the summary and every metric data point.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl SummarySink for TracingSink {
    async fn publish(&self, run: &OptimizationRun) -> Result<(), SinkError> {
        let summary = run
            .summary
            .as_ref()
            .ok_or_else(|| SinkError::MissingSummary(run.run_id.clone()))?;

        info!(
            run_id = %run.run_id,
            records = summary.records_considered,
            impressions = summary.total_impressions,
            clicks = summary.total_clicks,
            cost = format!("{:.2}", summary.total_cost),
            avg_ctr = format!("{:.2}", summary.avg_ctr),
            avg_cpc = format!("{:.2}", summary.avg_cpc),
            paused = summary.actions.paused,
            winners = summary.actions.winners,
            bid_adjustments = summary.actions.bid_adjustments,
            applied = summary.actions.applied,
            failed = summary.actions.failed,
            skipped = summary.actions.skipped,
            warnings = run.warnings.len(),
            "Optimization run summary"
        );
        for datum in summary.metric_data() {
            tracing::debug!(
                metric = datum.name,
                value = datum.value,
                unit = ?datum.unit,
                "metric"
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "tracing"
    }
}

/// Writes the finalized run as `<dir>/<run_id>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("{run_id}.json"))
    }
}

#[async_trait]
impl SummarySink for JsonFileSink {
    async fn publish(&self, run: &OptimizationRun) -> Result<(), SinkError> {
        if run.summary.is_none() {
            return Err(SinkError::MissingSummary(run.run_id.clone()));
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| SinkError::Io { path: self.dir.clone(), source })?;

        let path = self.path_for(&run.run_id);
        let json = serde_json::to_vec_pretty(run)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| SinkError::Io { path: path.clone(), source })?;

        info!(path = %path.display(), "Run summary written");
        Ok(())
    }

    fn name(&self) -> &str {
        "json-file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{run_id_for, RunSummary, RunWindow};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn finalized() -> OptimizationRun {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap();
        OptimizationRun::empty(run_id_for(now), now, RunWindow::trailing(now, 7))
            .finalize(RunSummary::default(), now)
    }

    #[test]
    fn json_sink_writes_run_file() {
        let dir = tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("summaries"));
        let run = finalized();

        tokio_test::block_on(sink.publish(&run)).unwrap();

        let written = std::fs::read_to_string(sink.path_for(&run.run_id)).unwrap();
        let parsed: OptimizationRun = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed.run_id, run.run_id);
        assert!(parsed.is_finalized());
    }

    #[test]
    fn unfinalized_run_is_refused() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap();
        let run = OptimizationRun::empty(run_id_for(now), now, RunWindow::trailing(now, 7));
        let err = tokio_test::block_on(TracingSink.publish(&run)).unwrap_err();
        assert!(matches!(err, SinkError::MissingSummary(_)));
    }
}
