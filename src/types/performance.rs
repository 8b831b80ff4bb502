//! Performance records and per-campaign aggregates

use serde::{Deserialize, Serialize};

/// One aggregated metrics row per (creative, campaign) for the lookback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub creative_id: String,
    pub campaign_id: String,
    /// Average click-through rate, in percent.
    pub avg_ctr: f64,
    /// Average cost per click, in currency units.
    pub avg_cpc: f64,
    pub total_clicks: u64,
    pub total_impressions: u64,
    pub total_cost: f64,
    pub total_conversions: u64,
    /// Distinct reporting days in the window (>= 1).
    pub days_active: u32,
}

/// Why a source row could not become a [`PerformanceRecord`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordRejection {
    #[error("row is not a valid performance record: {0}")]
    Malformed(String),
    #[error("{field} must not be empty")]
    EmptyId { field: &'static str },
    #[error("{field} must be a finite non-negative number (got {value})")]
    InvalidNumber { field: &'static str, value: f64 },
    #[error("days_active must be positive")]
    NoActiveDays,
}

impl PerformanceRecord {
    /// Convert a raw source row, rejecting anything with missing or invalid fields.
    ///
    /// Rows are never zero-filled: a missing column rejects the whole row.
    pub fn from_row(row: serde_json::Value) -> Result<Self, RecordRejection> {
        let record: Self = serde_json::from_value(row)
            .map_err(|e| RecordRejection::Malformed(e.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    /// Check field-level invariants.
    pub fn validate(&self) -> Result<(), RecordRejection> {
        if self.creative_id.trim().is_empty() {
            return Err(RecordRejection::EmptyId { field: "creative_id" });
        }
        if self.campaign_id.trim().is_empty() {
            return Err(RecordRejection::EmptyId { field: "campaign_id" });
        }
        for (field, value) in [
            ("avg_ctr", self.avg_ctr),
            ("avg_cpc", self.avg_cpc),
            ("total_cost", self.total_cost),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RecordRejection::InvalidNumber { field, value });
            }
        }
        if self.days_active == 0 {
            return Err(RecordRejection::NoActiveDays);
        }
        Ok(())
    }

    /// Whether the record carries enough clicks to be decisioned on.
    pub fn is_eligible(&self, min_sample_size: u64) -> bool {
        self.total_clicks >= min_sample_size
    }

    /// Conversions per click, in percent.
    pub fn conversion_rate(&self) -> f64 {
        if self.total_clicks == 0 {
            0.0
        } else {
            self.total_conversions as f64 / self.total_clicks as f64 * 100.0
        }
    }
}

/// Coarse CTR bucket used for portfolio reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceCategory {
    High,
    Medium,
    Low,
    VeryLow,
}

impl PerformanceCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::VeryLow => "very_low",
        }
    }

    pub fn from_ctr(ctr: f64) -> Self {
        if ctr >= 3.0 {
            Self::High
        } else if ctr >= 1.5 {
            Self::Medium
        } else if ctr >= 0.5 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }
}

/// Campaign-level rollup of the creatives that feed its bid decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignAggregate {
    pub campaign_id: String,
    /// Mean of the member creatives' `avg_ctr`.
    pub avg_ctr: f64,
    /// Mean of the member creatives' `avg_cpc`.
    pub avg_cpc: f64,
    pub total_clicks: u64,
    pub total_impressions: u64,
    pub total_cost: f64,
    pub total_conversions: u64,
    pub creative_count: usize,
}

impl CampaignAggregate {
    /// Aggregate records per campaign, in order of first appearance.
    pub fn group<'a, I>(records: I) -> Vec<Self>
    where
        I: IntoIterator<Item = &'a PerformanceRecord>,
    {
        let mut order: Vec<String> = Vec::new();
        let mut members: std::collections::HashMap<String, Vec<&PerformanceRecord>> =
            std::collections::HashMap::new();

        for record in records {
            let slot = members.entry(record.campaign_id.clone()).or_default();
            if slot.is_empty() {
                order.push(record.campaign_id.clone());
            }
            slot.push(record);
        }

        order
            .into_iter()
            .filter_map(|campaign_id| {
                let rows = members.remove(&campaign_id)?;
                Some(Self::from_members(campaign_id, &rows))
            })
            .collect()
    }

    fn from_members(campaign_id: String, rows: &[&PerformanceRecord]) -> Self {
        let n = rows.len().max(1) as f64;
        Self {
            campaign_id,
            avg_ctr: rows.iter().map(|r| r.avg_ctr).sum::<f64>() / n,
            avg_cpc: rows.iter().map(|r| r.avg_cpc).sum::<f64>() / n,
            total_clicks: rows.iter().map(|r| r.total_clicks).sum(),
            total_impressions: rows.iter().map(|r| r.total_impressions).sum(),
            total_cost: rows.iter().map(|r| r.total_cost).sum(),
            total_conversions: rows.iter().map(|r| r.total_conversions).sum(),
            creative_count: rows.len(),
        }
    }

    /// Conversions per click, in percent.
    pub fn conversion_rate(&self) -> f64 {
        if self.total_clicks == 0 {
            0.0
        } else {
            self.total_conversions as f64 / self.total_clicks as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(creative: &str, campaign: &str, ctr: f64, cpc: f64) -> PerformanceRecord {
        PerformanceRecord {
            creative_id: creative.to_string(),
            campaign_id: campaign.to_string(),
            avg_ctr: ctr,
            avg_cpc: cpc,
            total_clicks: 150,
            total_impressions: 10_000,
            total_cost: 300.0,
            total_conversions: 3,
            days_active: 7,
        }
    }

    #[test]
    fn missing_field_rejects_row() {
        let row = json!({
            "creative_id": "C1",
            "campaign_id": "K1",
            "avg_ctr": 0.8,
            "total_clicks": 150,
            "total_impressions": 10000,
            "total_cost": 300.0,
            "total_conversions": 1,
            "days_active": 7
        });
        let err = PerformanceRecord::from_row(row).unwrap_err();
        assert!(matches!(err, RecordRejection::Malformed(msg) if msg.contains("avg_cpc")));
    }

    #[test]
    fn negative_cost_rejected() {
        let mut r = record("C1", "K1", 1.0, 2.0);
        r.total_cost = -1.0;
        assert_eq!(
            r.validate(),
            Err(RecordRejection::InvalidNumber { field: "total_cost", value: -1.0 })
        );
    }

    #[test]
    fn nan_ctr_rejected() {
        let r = record("C1", "K1", f64::NAN, 2.0);
        assert!(matches!(
            r.validate(),
            Err(RecordRejection::InvalidNumber { field: "avg_ctr", .. })
        ));
    }

    #[test]
    fn empty_creative_id_rejected() {
        let r = record(" ", "K1", 1.0, 2.0);
        assert_eq!(r.validate(), Err(RecordRejection::EmptyId { field: "creative_id" }));
    }

    #[test]
    fn eligibility_is_inclusive() {
        let r = record("C1", "K1", 1.0, 2.0);
        assert!(r.is_eligible(150));
        assert!(!r.is_eligible(151));
    }

    #[test]
    fn groups_in_first_appearance_order() {
        let rows = vec![
            record("C1", "B", 1.0, 2.0),
            record("C2", "A", 2.0, 4.0),
            record("C3", "B", 3.0, 6.0),
        ];
        let groups = CampaignAggregate::group(&rows);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].campaign_id, "B");
        assert_eq!(groups[0].creative_count, 2);
        assert!((groups[0].avg_ctr - 2.0).abs() < 1e-9);
        assert!((groups[0].avg_cpc - 4.0).abs() < 1e-9);
        assert_eq!(groups[0].total_clicks, 300);
        assert_eq!(groups[1].campaign_id, "A");
    }

    #[test]
    fn performance_category_boundaries() {
        assert_eq!(PerformanceCategory::from_ctr(3.0), PerformanceCategory::High);
        assert_eq!(PerformanceCategory::from_ctr(1.5), PerformanceCategory::Medium);
        assert_eq!(PerformanceCategory::from_ctr(0.5), PerformanceCategory::Low);
        assert_eq!(PerformanceCategory::from_ctr(0.49), PerformanceCategory::VeryLow);
    }
}
