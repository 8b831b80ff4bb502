//! Shared data structures for the optimization decision pipeline
//!
//! - `PerformanceRecord` / `CampaignAggregate`: metrics snapshot inputs
//! - `Action` / `ExecutedAction`: engine output and execution outcome
//! - `OptimizationRun` / `RunSummary`: per-invocation result
//! - `LedgerEntry`: append-only journal line

mod action;
mod ledger;
mod performance;
mod run;

pub use action::*;
pub use ledger::*;
pub use performance::*;
pub use run::*;
