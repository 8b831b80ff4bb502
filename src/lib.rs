//! AdSpend Optimizer: Optimization Decision Engine
//!
//! Turns a snapshot of per-creative performance metrics into an auditable
//! set of spend decisions.
//!
//! ## Architecture
//!
//! - **Decision Engine**: creative pause/winner rules and per-campaign bids
//! - **Bid Heuristic**: CTR-targeting bid calculator with an optional learned predictor
//! - **Action Executor**: applies decisions to the ad platform, one outcome per action
//! - **Action Ledger**: append-only, day-partitioned journal of every executed action
//! - **Run Summary**: totals, rates and action counts for reporting sinks

pub mod config;
pub mod engine;
pub mod executor;
pub mod ledger;
pub mod pipeline;
pub mod source;
pub mod summary;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, OptimizerConfig, ThresholdConfig};

// Re-export the data model
pub use types::{
    Action, ActionKind, ActionOutcome, BidNoOp, BidSource, CampaignAggregate, ExecutedAction,
    LedgerEntry, OptimizationRun, PerformanceRecord, RunSummary, RunWarning, RunWindow,
};

// Re-export engine
pub use engine::{suggest_bid, BidFeatures, BidPredictor, DecisionEngine, LinearBidPredictor};

// Re-export boundaries
pub use executor::{ActionExecutor, AdPlatform, DryRunPlatform, HttpAdPlatform, PlatformError};
pub use ledger::{open_ledger, ActionLedger, FileLedger, InMemoryLedger, LedgerError, SledLedger};
pub use pipeline::{OptimizationPipeline, RunReport};
pub use source::{JsonFileSource, MetricsSource, SourceError, StaticSource};
pub use summary::{summarize, JsonFileSink, SinkError, SummarySink, TracingSink};
