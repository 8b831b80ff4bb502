//! Decision engine properties
//!
//! Rule priority, eligibility, bid bounds and monotonicity, and run-to-run
//! determinism, checked over generated grids of records.

use adspend_optimizer::engine::suggest_bid;
use adspend_optimizer::{Action, ActionKind, DecisionEngine, PerformanceRecord, RunWindow, ThresholdConfig};
use chrono::{TimeZone, Utc};

fn record(creative: &str, campaign: &str, ctr: f64, cpc: f64, clicks: u64) -> PerformanceRecord {
    PerformanceRecord {
        creative_id: creative.to_string(),
        campaign_id: campaign.to_string(),
        avg_ctr: ctr,
        avg_cpc: cpc,
        total_clicks: clicks,
        total_impressions: clicks * 60,
        total_cost: cpc * clicks as f64,
        total_conversions: clicks / 50,
        days_active: 7,
    }
}

fn grid() -> Vec<PerformanceRecord> {
    let ctrs = [0.0, 0.3, 0.8, 1.0, 1.4, 2.0, 2.9, 3.0, 3.1, 4.5, 9.0];
    let cpcs = [0.5, 2.0, 4.0, 8.0, 8.01, 12.0];
    let clicks = [0, 99, 100, 150, 2_000];
    let mut out = Vec::new();
    for (i, ctr) in ctrs.iter().enumerate() {
        for (j, cpc) in cpcs.iter().enumerate() {
            for (k, n) in clicks.iter().enumerate() {
                out.push(record(&format!("C{i}-{j}-{k}"), &format!("K{}", (i + j) % 4), *ctr, *cpc, *n));
            }
        }
    }
    out
}

fn run(engine: &DecisionEngine, records: &[PerformanceRecord]) -> Vec<Action> {
    let now = Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap();
    engine.run(records, now, RunWindow::trailing(now, 7)).actions
}

fn engine() -> DecisionEngine {
    DecisionEngine::new(ThresholdConfig::default()).unwrap()
}

#[test]
fn every_low_ctr_eligible_record_is_paused_exactly_once() {
    let t = ThresholdConfig::default();
    let records = grid();
    let actions = run(&engine(), &records);

    for r in &records {
        let mine: Vec<_> = actions
            .iter()
            .filter(|a| a.kind() != ActionKind::AdjustBid && a.resource_id() == r.creative_id)
            .collect();
        if r.total_clicks < t.min_sample_size {
            assert!(mine.is_empty(), "sub-sample record {} acted on", r.creative_id);
        } else if r.avg_ctr < t.min_ctr {
            assert_eq!(mine.len(), 1, "{}", r.creative_id);
            assert_eq!(mine[0].kind(), ActionKind::PauseCreative);
            assert!(mine[0].reason().starts_with("low CTR"), "{}", mine[0].reason());
        }
    }
}

#[test]
fn at_most_one_creative_action_per_record() {
    let actions = run(&engine(), &grid());
    let mut seen = std::collections::HashSet::new();
    for a in actions.iter().filter(|a| a.kind() != ActionKind::AdjustBid) {
        assert!(seen.insert(a.resource_id().to_string()), "duplicate action for {}", a.resource_id());
    }
}

#[test]
fn worked_examples() {
    let actions = run(&engine(), &[record("C1", "K1", 0.8, 2.0, 150)]);
    assert!(matches!(
        &actions[0],
        Action::PauseCreative { creative_id, reason, .. }
            if creative_id == "C1" && reason == "low CTR (0.80%) below threshold"
    ));

    let actions = run(&engine(), &[record("C2", "K2", 4.5, 3.0, 200)]);
    assert_eq!(actions[0].kind(), ActionKind::FlagWinner);
    assert_eq!(actions[0].resource_id(), "C2");
}

#[test]
fn heuristic_stays_within_bounds() {
    let t = ThresholdConfig::default();
    for ctr in [0.01, 0.1, 0.5, 1.0, 2.0, 3.3, 7.0, 50.0] {
        for cpc in [0.0, 0.2, 1.0, 4.0, 9.9, 15.0, 40.0] {
            let bid = suggest_bid(ctr, cpc, &t);
            assert!(
                (t.bid_floor..=t.bid_ceiling).contains(&bid),
                "suggest_bid({ctr}, {cpc}) = {bid}"
            );
        }
    }
}

#[test]
fn heuristic_is_monotonic_in_ctr() {
    let t = ThresholdConfig::default();
    for cpc in [0.5, 2.0, 4.0, 7.5, 12.0] {
        let mut previous = f64::NEG_INFINITY;
        // Descending CTR must never lower the bid
        for step in (1..=100).rev() {
            let ctr = f64::from(step) * 0.1;
            let bid = suggest_bid(ctr, cpc, &t);
            assert!(bid >= previous, "cpc {cpc}: bid fell to {bid} at ctr {ctr}");
            previous = bid;
        }
    }
}

#[test]
fn identical_snapshots_give_identical_actions() {
    let records = grid();
    let e = engine();
    let first = run(&e, &records);
    let later = Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0).unwrap();
    let second = e.run(&records, later, RunWindow::trailing(later, 7)).actions;
    assert_eq!(first, second);
}
