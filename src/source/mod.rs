//! Metrics source abstraction
//!
//! A source returns raw rows for a window; conversion into
//! `PerformanceRecord`s happens here, row by row, so one bad row only costs
//! that row.
//!
//! - `JsonFileSource`: JSON array or JSON Lines snapshot on disk
//! - `StaticSource`: pre-loaded rows (tests, replays)

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::types::{PerformanceRecord, RunWarning, RunWindow};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("metrics source I/O error ({path}): {source}", path = .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("metrics source parse error at line {line}: {error}")]
    Parse { line: usize, error: String },
}

/// Trait abstracting where performance rows come from.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Raw rows covering `window`.
    async fn fetch(&self, window: &RunWindow) -> Result<Vec<serde_json::Value>, SourceError>;

    /// Human-readable name for logging
    fn source_name(&self) -> &str;
}

/// Convert raw rows, collecting one warning per rejected row.
pub fn convert_rows(rows: Vec<serde_json::Value>) -> (Vec<PerformanceRecord>, Vec<RunWarning>) {
    let mut records = Vec::with_capacity(rows.len());
    let mut warnings = Vec::new();

    for (index, row) in rows.into_iter().enumerate() {
        match PerformanceRecord::from_row(row) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(row = index, error = %e, "Rejected metrics row");
                warnings.push(RunWarning::RejectedRecord {
                    index,
                    error: e.to_string(),
                });
            }
        }
    }
    (records, warnings)
}

// ============================================================================
// JSON file source
// ============================================================================

/// Reads a metrics snapshot exported to disk.
///
/// The file is either one JSON array of rows or JSON Lines. The snapshot is
/// assumed to already cover the requested window.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse a snapshot body: JSON array if it starts with `[`, JSON Lines otherwise.
pub fn parse_snapshot(contents: &str) -> Result<Vec<serde_json::Value>, SourceError> {
    if contents.trim_start().starts_with('[') {
        return serde_json::from_str(contents).map_err(|e| SourceError::Parse {
            line: e.line(),
            error: e.to_string(),
        });
    }

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| SourceError::Parse {
                line: i + 1,
                error: e.to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl MetricsSource for JsonFileSource {
    async fn fetch(&self, window: &RunWindow) -> Result<Vec<serde_json::Value>, SourceError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        let rows = parse_snapshot(&contents)?;
        debug!(
            path = %self.path.display(),
            rows = rows.len(),
            window_start = %window.start,
            window_end = %window.end,
            "Loaded metrics snapshot"
        );
        Ok(rows)
    }

    fn source_name(&self) -> &str {
        "json-file"
    }
}

// ============================================================================
// Static source
// ============================================================================

/// Serves a fixed set of rows regardless of window.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    rows: Vec<serde_json::Value>,
}

impl StaticSource {
    pub fn new(rows: Vec<serde_json::Value>) -> Self {
        Self { rows }
    }

    /// Build from typed records.
    pub fn from_records(records: &[PerformanceRecord]) -> Self {
        Self {
            rows: records
                .iter()
                .filter_map(|r| serde_json::to_value(r).ok())
                .collect(),
        }
    }
}

#[async_trait]
impl MetricsSource for StaticSource {
    async fn fetch(&self, _window: &RunWindow) -> Result<Vec<serde_json::Value>, SourceError> {
        Ok(self.rows.clone())
    }

    fn source_name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: &str) -> serde_json::Value {
        json!({
            "creative_id": id,
            "campaign_id": "K1",
            "avg_ctr": 0.8,
            "avg_cpc": 2.0,
            "total_clicks": 150,
            "total_impressions": 18750,
            "total_cost": 300.0,
            "total_conversions": 3,
            "days_active": 7
        })
    }

    #[test]
    fn parses_array_and_lines() {
        let array = format!("[{}, {}]", row("C1"), row("C2"));
        assert_eq!(parse_snapshot(&array).unwrap().len(), 2);

        let lines = format!("{}\n\n{}\n", row("C1"), row("C2"));
        assert_eq!(parse_snapshot(&lines).unwrap().len(), 2);
    }

    #[test]
    fn bad_line_reports_line_number() {
        let lines = format!("{}\nnot json\n", row("C1"));
        assert!(matches!(parse_snapshot(&lines), Err(SourceError::Parse { line: 2, .. })));
    }

    #[test]
    fn bad_rows_become_warnings() {
        let mut missing = row("C2");
        missing.as_object_mut().unwrap().remove("total_clicks");
        let mut negative = row("C3");
        negative["avg_cpc"] = json!(-1.0);
        let mut empty_id = row("");
        empty_id["days_active"] = json!(3);

        let (records, warnings) = convert_rows(vec![row("C1"), missing, negative, empty_id]);
        assert_eq!(records.len(), 1);
        assert_eq!(warnings.len(), 3);
        assert!(matches!(warnings[0], RunWarning::RejectedRecord { index: 1, .. }));
    }

    #[test]
    fn static_source_round_trips_records() {
        let (records, _) = convert_rows(vec![row("C1")]);
        let source = StaticSource::from_records(&records);
        let now = chrono::Utc::now();
        let rows = tokio_test::block_on(source.fetch(&RunWindow::trailing(now, 7))).unwrap();
        assert_eq!(convert_rows(rows).0, records);
    }
}
