//! Creative rule evaluator
//!
//! Fixed priority, first match wins:
//! 1. CTR below `min_ctr`          -> pause ("low CTR")
//! 2. CPC above `max_cpc`          -> pause ("high CPC")
//! 3. CTR above `top_performer_ctr` -> flag winner
//! 4. otherwise no action
//!
//! Cost-control rules dominate the winner rule.

use rayon::prelude::*;

use crate::config::ThresholdConfig;
use crate::types::{Action, ActionMetrics, PerformanceRecord};

/// Which rule fired for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreativeVerdict {
    LowCtr,
    HighCpc,
    Winner,
    WithinBand,
}

/// Classify one record. Eligibility is the caller's concern.
pub fn classify(record: &PerformanceRecord, t: &ThresholdConfig) -> CreativeVerdict {
    if record.avg_ctr < t.min_ctr {
        CreativeVerdict::LowCtr
    } else if record.avg_cpc > t.max_cpc {
        CreativeVerdict::HighCpc
    } else if record.avg_ctr > t.top_performer_ctr {
        CreativeVerdict::Winner
    } else {
        CreativeVerdict::WithinBand
    }
}

/// Apply the rules to one eligible record; at most one action per record.
pub fn evaluate_record(record: &PerformanceRecord, t: &ThresholdConfig) -> Option<Action> {
    let metrics = ActionMetrics::from(record);
    match classify(record, t) {
        CreativeVerdict::LowCtr => Some(Action::PauseCreative {
            creative_id: record.creative_id.clone(),
            campaign_id: record.campaign_id.clone(),
            reason: format!("low CTR ({:.2}%) below threshold", record.avg_ctr),
            metrics,
        }),
        CreativeVerdict::HighCpc => Some(Action::PauseCreative {
            creative_id: record.creative_id.clone(),
            campaign_id: record.campaign_id.clone(),
            reason: format!("high CPC (${:.2}) above threshold", record.avg_cpc),
            metrics,
        }),
        CreativeVerdict::Winner => Some(Action::FlagWinner {
            creative_id: record.creative_id.clone(),
            campaign_id: record.campaign_id.clone(),
            reason: format!("high CTR ({:.2}%), scale candidate", record.avg_ctr),
            metrics,
        }),
        CreativeVerdict::WithinBand => None,
    }
}

/// Evaluate every eligible record, preserving input order.
///
/// Records below `min_sample_size` clicks never produce an action.
pub fn evaluate(records: &[PerformanceRecord], t: &ThresholdConfig) -> Vec<Action> {
    records
        .par_iter()
        .filter(|r| r.is_eligible(t.min_sample_size))
        .filter_map(|r| evaluate_record(r, t))
        .collect()
}
