//! Optimization Decision Engine
//!
//! - [`rules`]: per-creative pause / winner rules
//! - [`bidding`]: heuristic bid calculator and the predictor seam
//! - [`decision`]: orchestration of both into one `OptimizationRun`
//!
//! Everything here is pure. Platform calls and persistence live in
//! `executor` and `ledger`.

pub mod bidding;
pub mod decision;
pub mod rules;

pub use bidding::{
    suggest_bid, BidFeatures, BidPredictor, BidSuggestion, LinearBidPredictor, PredictorError,
};
pub use decision::{DecisionEngine, Screening};
pub use rules::{evaluate, CreativeVerdict};
