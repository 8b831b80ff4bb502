//! Optimizer Configuration - every decision threshold as an operator-tunable value
//!
//! Each struct implements `Default` with the production constants, so a
//! missing config file yields the standard policy. Values can be overridden
//! by a TOML file and then by environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one optimizer deployment.
///
/// Load with `OptimizerConfig::load()` which searches:
/// 1. `$ADSPEND_CONFIG` env var
/// 2. `./optimizer.toml`
/// 3. Built-in defaults
///
/// Environment overrides are applied on top, then the whole config is
/// validated. Any failure along the way is fatal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Creative rules and bid heuristic thresholds
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Run-level behaviour
    #[serde(default)]
    pub run: RunConfig,

    /// Ad platform endpoint settings
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Action ledger backend
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Summary output
    #[serde(default)]
    pub report: ReportConfig,
}

impl OptimizerConfig {
    /// Load configuration using the standard search order, then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None, |key| std::env::var(key).ok())
    }

    /// Load from an explicit path (or the standard search order when `None`),
    /// with a caller-supplied environment lookup.
    pub fn load_with<F>(path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(p) => Self::parse_file(p)?,
            None => Self::search(&env)?,
        };
        config.apply_env_overrides(&env)?;
        config.validate()?;
        Ok(config)
    }

    fn search<F>(env: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 1. Check env var
        if let Some(path) = env(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if !p.exists() {
                return Err(ConfigError::Io(
                    p,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found"),
                ));
            }
            let config = Self::parse_file(&p)?;
            info!(path = %p.display(), "Loaded optimizer config from {}", defaults::CONFIG_ENV_VAR);
            return Ok(config);
        }

        // 2. Check ./optimizer.toml
        let local = PathBuf::from(defaults::CONFIG_FILE_NAME);
        if local.exists() {
            let config = Self::parse_file(&local)?;
            info!("Loaded optimizer config from ./{}", defaults::CONFIG_FILE_NAME);
            return Ok(config);
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", defaults::CONFIG_FILE_NAME);
        Ok(Self::default())
    }

    /// Load from a specific TOML file path and validate (no env overrides).
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::parse_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse a TOML document. Unknown keys are logged as warnings only.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Apply the historical environment variable overrides.
    ///
    /// A variable that is set but does not parse is an error.
    pub fn apply_env_overrides<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let t = &mut self.thresholds;
        override_f64(&env, "MIN_CTR_THRESHOLD", &mut t.min_ctr)?;
        override_f64(&env, "TOP_PERFORMER_THRESHOLD", &mut t.top_performer_ctr)?;
        override_f64(&env, "MAX_CPC", &mut t.max_cpc)?;
        override_parsed(&env, "MIN_SAMPLE_SIZE", &mut t.min_sample_size)?;
        override_f64(&env, "BID_CHANGE_THRESHOLD", &mut t.bid_change_threshold)?;
        override_f64(&env, "TARGET_CTR", &mut t.target_ctr)?;
        override_f64(&env, "BID_FLOOR", &mut t.bid_floor)?;
        override_f64(&env, "BID_CEILING", &mut t.bid_ceiling)?;
        override_f64(&env, "PREDICTOR_BID_CEILING", &mut t.predictor_bid_ceiling)?;
        override_f64(&env, "MAX_BID_INCREASE_RATIO", &mut t.max_bid_increase_ratio)?;
        override_f64(&env, "MAX_BID_DECREASE_RATIO", &mut t.max_bid_decrease_ratio)?;
        if let Some(raw) = env("MAX_CPA") {
            let v = parse_env::<f64>("MAX_CPA", &raw)?;
            t.max_cpa = Some(v);
        }
        override_parsed(&env, "LOOKBACK_DAYS", &mut self.run.lookback_days)?;
        Ok(())
    }

    /// Validate all values for internal consistency.
    ///
    /// Every violation is collected; the run refuses to start if any exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = self.thresholds.violations();

        if self.run.lookback_days == 0 {
            errors.push("run.lookback_days must be > 0".to_string());
        }
        if self.platform.timeout_secs == 0 {
            errors.push("platform.timeout_secs must be > 0".to_string());
        }
        if self.platform.base_url.trim().is_empty() {
            errors.push("platform.base_url must not be empty".to_string());
        }

        // Range warnings
        for w in super::validation::validate_typical_ranges(self) {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

fn check_ratio_band(low: f64, high: f64, low_name: &str, high_name: &str, errors: &mut Vec<String>) {
    if low <= 0.0 || low > 1.0 {
        errors.push(format!("thresholds.{low_name} ({low:.2}) must be in (0, 1]"));
    }
    if high < 1.0 {
        errors.push(format!("thresholds.{high_name} ({high:.2}) must be >= 1"));
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::EnvOverride {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

fn override_f64<F>(env: &F, key: &str, slot: &mut f64) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    override_parsed(env, key, slot)
}

fn override_parsed<F, T>(env: &F, key: &str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = env(key) {
        *slot = parse_env(key, &raw)?;
    }
    Ok(())
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({path}): {err}", path = .0.display(), err = .1)]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Config parse error ({path}): {err}", path = .0.display(), err = .1)]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Environment override {key}={value:?} is not a valid value")]
    EnvOverride { key: String, value: String },
    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Threshold Config
// ============================================================================

/// Read-only policy for one run: creative rule boundaries and bid limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Pause when a creative's CTR (%) is below this.
    #[serde(default = "default_min_ctr")]
    pub min_ctr: f64,

    /// Flag as winner when CTR (%) is above this.
    #[serde(default = "default_top_performer_ctr")]
    pub top_performer_ctr: f64,

    /// Pause when CPC is above this.
    #[serde(default = "default_max_cpc")]
    pub max_cpc: f64,

    /// Minimum clicks before a record is decisioned on.
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: u64,

    /// Minimum absolute bid delta worth committing.
    #[serde(default = "default_bid_change_threshold")]
    pub bid_change_threshold: f64,

    /// CTR (%) the heuristic steers toward.
    #[serde(default = "default_target_ctr")]
    pub target_ctr: f64,

    /// Absolute minimum bid.
    #[serde(default = "default_bid_floor")]
    pub bid_floor: f64,

    /// Absolute maximum bid for heuristic suggestions.
    #[serde(default = "default_bid_ceiling")]
    pub bid_ceiling: f64,

    /// Absolute maximum bid for predictor suggestions.
    #[serde(default = "default_predictor_bid_ceiling")]
    pub predictor_bid_ceiling: f64,

    /// Lower clamp on the heuristic's target/current CTR ratio.
    #[serde(default = "default_min_ratio")]
    pub min_ratio: f64,

    /// Upper clamp on the heuristic's target/current CTR ratio.
    #[serde(default = "default_max_ratio")]
    pub max_ratio: f64,

    /// Largest single-step increase allowed for predictor bids (x current).
    #[serde(default = "default_max_bid_increase_ratio")]
    pub max_bid_increase_ratio: f64,

    /// Largest single-step decrease allowed for predictor bids (x current).
    #[serde(default = "default_max_bid_decrease_ratio")]
    pub max_bid_decrease_ratio: f64,

    /// Optional cost-per-acquisition cap applied to heuristic bids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cpa: Option<f64>,
}

fn default_min_ctr() -> f64 { 1.0 }
fn default_top_performer_ctr() -> f64 { 3.0 }
fn default_max_cpc() -> f64 { 8.0 }
fn default_min_sample_size() -> u64 { 100 }
fn default_bid_change_threshold() -> f64 { 0.50 }
fn default_target_ctr() -> f64 { 2.0 }
fn default_bid_floor() -> f64 { 1.0 }
fn default_bid_ceiling() -> f64 { 15.0 }
fn default_predictor_bid_ceiling() -> f64 { 20.0 }
fn default_min_ratio() -> f64 { 0.5 }
fn default_max_ratio() -> f64 { 2.0 }
fn default_max_bid_increase_ratio() -> f64 { 1.5 }
fn default_max_bid_decrease_ratio() -> f64 { 0.7 }

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_ctr: default_min_ctr(),
            top_performer_ctr: default_top_performer_ctr(),
            max_cpc: default_max_cpc(),
            min_sample_size: default_min_sample_size(),
            bid_change_threshold: default_bid_change_threshold(),
            target_ctr: default_target_ctr(),
            bid_floor: default_bid_floor(),
            bid_ceiling: default_bid_ceiling(),
            predictor_bid_ceiling: default_predictor_bid_ceiling(),
            min_ratio: default_min_ratio(),
            max_ratio: default_max_ratio(),
            max_bid_increase_ratio: default_max_bid_increase_ratio(),
            max_bid_decrease_ratio: default_max_bid_decrease_ratio(),
            max_cpa: None,
        }
    }
}

impl ThresholdConfig {
    /// Validate the policy on its own. The decision engine refuses to be
    /// built from a config that fails this.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = self.violations();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn violations(&self) -> Vec<String> {
        let mut errors: Vec<String> = Vec::new();

        // NaN/Inf comparisons silently pass, so catch them first
        for (name, value) in self.float_fields() {
            if !value.is_finite() {
                errors.push(format!("thresholds.{name} must be a finite number (got {value})"));
            }
        }
        if !errors.is_empty() {
            return errors;
        }

        if self.min_ctr < 0.0 {
            errors.push(format!("thresholds.min_ctr ({:.2}) cannot be negative", self.min_ctr));
        }
        if self.top_performer_ctr <= self.min_ctr {
            errors.push(format!(
                "thresholds.top_performer_ctr ({:.2}) must be > min_ctr ({:.2})",
                self.top_performer_ctr, self.min_ctr
            ));
        }
        if self.max_cpc <= 0.0 {
            errors.push("thresholds.max_cpc must be > 0".to_string());
        }
        if self.min_sample_size == 0 {
            errors.push("thresholds.min_sample_size must be > 0".to_string());
        }
        if self.bid_change_threshold < 0.0 {
            errors.push("thresholds.bid_change_threshold cannot be negative".to_string());
        }
        if self.target_ctr <= 0.0 {
            errors.push("thresholds.target_ctr must be > 0 (used as ratio numerator)".to_string());
        }
        if self.bid_floor <= 0.0 {
            errors.push("thresholds.bid_floor must be > 0".to_string());
        }
        if self.bid_ceiling <= self.bid_floor {
            errors.push(format!(
                "thresholds.bid_ceiling ({:.2}) must be > bid_floor ({:.2})",
                self.bid_ceiling, self.bid_floor
            ));
        }
        if self.predictor_bid_ceiling < self.bid_ceiling {
            errors.push(format!(
                "thresholds.predictor_bid_ceiling ({:.2}) must be >= bid_ceiling ({:.2})",
                self.predictor_bid_ceiling, self.bid_ceiling
            ));
        }
        check_ratio_band(self.min_ratio, self.max_ratio, "min_ratio", "max_ratio", &mut errors);
        check_ratio_band(
            self.max_bid_decrease_ratio,
            self.max_bid_increase_ratio,
            "max_bid_decrease_ratio",
            "max_bid_increase_ratio",
            &mut errors,
        );
        if let Some(cpa) = self.max_cpa {
            if !cpa.is_finite() || cpa <= 0.0 {
                errors.push(format!("thresholds.max_cpa must be a positive number (got {cpa})"));
            }
        }
        errors
    }

    fn float_fields(&self) -> [(&'static str, f64); 12] {
        [
            ("min_ctr", self.min_ctr),
            ("top_performer_ctr", self.top_performer_ctr),
            ("max_cpc", self.max_cpc),
            ("bid_change_threshold", self.bid_change_threshold),
            ("target_ctr", self.target_ctr),
            ("bid_floor", self.bid_floor),
            ("bid_ceiling", self.bid_ceiling),
            ("predictor_bid_ceiling", self.predictor_bid_ceiling),
            ("min_ratio", self.min_ratio),
            ("max_ratio", self.max_ratio),
            ("max_bid_increase_ratio", self.max_bid_increase_ratio),
            ("max_bid_decrease_ratio", self.max_bid_decrease_ratio),
        ]
    }
}

// ============================================================================
// Run Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Trailing days of metrics considered per run.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Drop creatives paused in this run from their campaign's bid aggregate.
    #[serde(default = "default_true")]
    pub exclude_paused_from_bid_aggregate: bool,

    /// Skip actions that today's ledger already shows as applied.
    #[serde(default = "default_true")]
    pub skip_already_applied: bool,

    /// Log platform operations instead of sending them.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_lookback_days() -> u32 { 7 }
fn default_true() -> bool { true }

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            exclude_paused_from_bid_aggregate: true,
            skip_already_applied: true,
            dry_run: false,
        }
    }
}

// ============================================================================
// Platform Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value sent in the `LinkedIn-Version` header.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Currency code for bid amounts.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Per-call timeout (seconds).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String { defaults::PLATFORM_BASE_URL.to_string() }
fn default_api_version() -> String { defaults::PLATFORM_API_VERSION.to_string() }
fn default_currency() -> String { "USD".to_string() }
fn default_timeout_secs() -> u64 { defaults::PLATFORM_TIMEOUT_SECS }

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            currency: default_currency(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ============================================================================
// Ledger Config
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    #[default]
    File,
    Sled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub backend: LedgerBackend,

    /// Root directory (file backend) or database path (sled backend).
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

fn default_ledger_path() -> PathBuf { PathBuf::from(defaults::LEDGER_PATH) }

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::default(),
            path: default_ledger_path(),
        }
    }
}

// ============================================================================
// Report Config
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Directory for per-run JSON summaries. Disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_dir: Option<PathBuf>,
}
