//! Bid heuristic calculator and the optional learned-predictor seam
//!
//! The heuristic steers each campaign's CTR toward `target_ctr` by scaling
//! the current CPC with a clamped ratio. A predictor, when present and
//! returning a usable value, replaces the heuristic outright.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::Path;

use crate::config::ThresholdConfig;
use crate::types::{BidSource, CampaignAggregate};

/// Round to whole cents.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Heuristic target bid for a campaign.
///
/// Returns `current_cpc` unchanged when `current_ctr` is not positive (the
/// ratio is undefined, so no change is suggested). Otherwise the result is
/// always within `[bid_floor, bid_ceiling]`, rounded to cents.
pub fn suggest_bid(current_ctr: f64, current_cpc: f64, t: &ThresholdConfig) -> f64 {
    if !(current_ctr > 0.0) || !current_ctr.is_finite() {
        return current_cpc;
    }
    let ratio = (t.target_ctr / current_ctr).clamp(t.min_ratio, t.max_ratio);
    let suggested = (current_cpc * ratio).clamp(t.bid_floor, t.bid_ceiling);
    round_cents(suggested)
}

/// Cap a heuristic bid so cost per acquisition stays under `max_cpa`.
///
/// No-op when no cap is configured or the campaign has no conversions.
pub fn apply_cpa_cap(bid: f64, conversion_rate: f64, t: &ThresholdConfig) -> f64 {
    match t.max_cpa {
        Some(max_cpa) if conversion_rate > 0.0 => {
            let max_bid_for_cpa = max_cpa * conversion_rate / 100.0;
            round_cents(bid.min(max_bid_for_cpa).clamp(t.bid_floor, t.bid_ceiling))
        }
        _ => bid,
    }
}

/// Bound a predictor suggestion by the single-step limits and the
/// predictor ceiling. Unusable suggestions yield `None`.
pub fn bound_predicted_bid(predicted: f64, current_cpc: f64, t: &ThresholdConfig) -> Option<f64> {
    if !predicted.is_finite() || predicted <= 0.0 {
        return None;
    }
    let mut bid = predicted;
    if current_cpc > 0.0 {
        bid = bid.clamp(
            current_cpc * t.max_bid_decrease_ratio,
            current_cpc * t.max_bid_increase_ratio,
        );
    }
    Some(round_cents(bid.clamp(t.bid_floor, t.predictor_bid_ceiling)))
}

// ============================================================================
// Predictor seam
// ============================================================================

/// Feature vector handed to a bid predictor for one campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidFeatures {
    pub avg_ctr: f64,
    pub avg_cpc: f64,
    pub total_clicks: f64,
    pub total_impressions: f64,
    pub total_cost: f64,
    pub conversion_rate: f64,
    pub ctr_squared: f64,
    pub cpc_squared: f64,
    pub ctr_x_conversion_rate: f64,
    pub cpc_x_clicks: f64,
    pub log_impressions: f64,
    pub log_clicks: f64,
    pub cost_per_impression: f64,
    pub hour_sin: f64,
    pub hour_cos: f64,
    pub day_sin: f64,
    pub day_cos: f64,
}

impl BidFeatures {
    pub const NAMES: [&'static str; 17] = [
        "avg_ctr",
        "avg_cpc",
        "total_clicks",
        "total_impressions",
        "total_cost",
        "conversion_rate",
        "ctr_squared",
        "cpc_squared",
        "ctr_x_conversion_rate",
        "cpc_x_clicks",
        "log_impressions",
        "log_clicks",
        "cost_per_impression",
        "hour_sin",
        "hour_cos",
        "day_sin",
        "day_cos",
    ];

    /// Build features from a campaign aggregate and the run clock.
    pub fn from_aggregate(agg: &CampaignAggregate, at: DateTime<Utc>) -> Self {
        let clicks = agg.total_clicks as f64;
        let impressions = agg.total_impressions as f64;
        let conversion_rate = agg.conversion_rate();
        let hour = f64::from(at.hour());
        let day = f64::from(at.weekday().num_days_from_monday());
        Self {
            avg_ctr: agg.avg_ctr,
            avg_cpc: agg.avg_cpc,
            total_clicks: clicks,
            total_impressions: impressions,
            total_cost: agg.total_cost,
            conversion_rate,
            ctr_squared: agg.avg_ctr.powi(2),
            cpc_squared: agg.avg_cpc.powi(2),
            ctr_x_conversion_rate: agg.avg_ctr * conversion_rate,
            cpc_x_clicks: agg.avg_cpc * clicks,
            log_impressions: impressions.ln_1p(),
            log_clicks: clicks.ln_1p(),
            cost_per_impression: agg.total_cost / (impressions + 1.0),
            hour_sin: (2.0 * PI * hour / 24.0).sin(),
            hour_cos: (2.0 * PI * hour / 24.0).cos(),
            day_sin: (2.0 * PI * day / 7.0).sin(),
            day_cos: (2.0 * PI * day / 7.0).cos(),
        }
    }

    /// Look up a feature by its artifact name.
    pub fn get(&self, name: &str) -> Option<f64> {
        let v = match name {
            "avg_ctr" => self.avg_ctr,
            "avg_cpc" => self.avg_cpc,
            "total_clicks" => self.total_clicks,
            "total_impressions" => self.total_impressions,
            "total_cost" => self.total_cost,
            "conversion_rate" => self.conversion_rate,
            "ctr_squared" => self.ctr_squared,
            "cpc_squared" => self.cpc_squared,
            "ctr_x_conversion_rate" => self.ctr_x_conversion_rate,
            "cpc_x_clicks" => self.cpc_x_clicks,
            "log_impressions" => self.log_impressions,
            "log_clicks" => self.log_clicks,
            "cost_per_impression" => self.cost_per_impression,
            "hour_sin" => self.hour_sin,
            "hour_cos" => self.hour_cos,
            "day_sin" => self.day_sin,
            "day_cos" => self.day_cos,
            _ => return None,
        };
        Some(v)
    }
}

/// Opaque `features -> suggested bid` capability.
///
/// Returning `None` falls back to the heuristic for that campaign.
pub trait BidPredictor: Send + Sync {
    fn predict(&self, features: &BidFeatures) -> Option<f64>;

    /// Name for logging
    fn name(&self) -> &str;
}

/// Errors loading a predictor artifact.
#[derive(Debug, thiserror::Error)]
pub enum PredictorError {
    #[error("predictor artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("predictor artifact is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("predictor artifact references unknown feature '{0}'")]
    UnknownFeature(String),
    #[error("predictor artifact contains a non-finite coefficient for '{0}'")]
    NonFinite(String),
}

/// Linear model artifact: `bid = intercept + sum(weight_i * feature_i)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearBidPredictor {
    pub intercept: f64,
    /// Keyed by feature name; sorted so the summation order is fixed.
    pub weights: BTreeMap<String, f64>,
    #[serde(default = "default_predictor_name")]
    pub name: String,
}

fn default_predictor_name() -> String {
    "linear".to_string()
}

impl LinearBidPredictor {
    /// Load and check a JSON artifact.
    pub fn load(path: &Path) -> Result<Self, PredictorError> {
        let bytes = std::fs::read(path)?;
        let model: Self = serde_json::from_slice(&bytes)?;
        model.check()?;
        tracing::info!(
            path = %path.display(),
            features = model.weights.len(),
            "Loaded bid predictor artifact"
        );
        Ok(model)
    }

    fn check(&self) -> Result<(), PredictorError> {
        if !self.intercept.is_finite() {
            return Err(PredictorError::NonFinite("intercept".to_string()));
        }
        for (feature, weight) in &self.weights {
            if !BidFeatures::NAMES.contains(&feature.as_str()) {
                return Err(PredictorError::UnknownFeature(feature.clone()));
            }
            if !weight.is_finite() {
                return Err(PredictorError::NonFinite(feature.clone()));
            }
        }
        Ok(())
    }
}

impl BidPredictor for LinearBidPredictor {
    fn predict(&self, features: &BidFeatures) -> Option<f64> {
        let mut bid = self.intercept;
        for (feature, weight) in &self.weights {
            bid += weight * features.get(feature)?;
        }
        Some(bid)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Result of the bid calculation for one campaign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BidSuggestion {
    pub current: f64,
    pub suggested: f64,
    pub source: BidSource,
}

impl BidSuggestion {
    pub fn delta(&self) -> f64 {
        self.suggested - self.current
    }
}

/// Compute the bid for a campaign: predictor first, heuristic fallback.
pub fn suggest_for_campaign(
    agg: &CampaignAggregate,
    t: &ThresholdConfig,
    predictor: Option<&dyn BidPredictor>,
    at: DateTime<Utc>,
) -> BidSuggestion {
    if let Some(p) = predictor {
        let features = BidFeatures::from_aggregate(agg, at);
        match p.predict(&features).and_then(|raw| bound_predicted_bid(raw, agg.avg_cpc, t)) {
            Some(bid) => {
                return BidSuggestion {
                    current: agg.avg_cpc,
                    suggested: bid,
                    source: BidSource::Predictor,
                };
            }
            None => tracing::debug!(
                campaign = %agg.campaign_id,
                predictor = p.name(),
                "Predictor returned no usable bid, using heuristic"
            ),
        }
    }

    let heuristic = suggest_bid(agg.avg_ctr, agg.avg_cpc, t);
    // Undefined-ratio passthrough stays untouched so it remains a no-op
    let suggested = if agg.avg_ctr > 0.0 {
        apply_cpa_cap(heuristic, agg.conversion_rate(), t)
    } else {
        heuristic
    };
    BidSuggestion {
        current: agg.avg_cpc,
        suggested,
        source: BidSource::Heuristic,
    }
}
