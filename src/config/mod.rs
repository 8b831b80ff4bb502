//! Optimizer Configuration Module
//!
//! Provides the run policy loaded from TOML and environment variables,
//! replacing process-wide threshold constants with an explicit value.
//!
//! ## Loading Order
//!
//! 1. `ADSPEND_CONFIG` environment variable (path to TOML file)
//! 2. `optimizer.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Environment overrides (`MIN_CTR_THRESHOLD`, `MAX_CPC`, ...) are applied
//! last, then everything is validated.
//!
//! ## Usage
//!
//! Load once at run start and pass the value (or `&config.thresholds`) into
//! every call:
//!
//! ```ignore
//! let config = OptimizerConfig::load()?;
//! let engine = DecisionEngine::new(config.thresholds.clone())?;
//! ```

mod optimizer_config;
pub mod defaults;
pub mod validation;

pub use optimizer_config::*;
