//! Config Validation Tests
//!
//! Typo detection, range checks and the load pipeline (file, environment
//! overrides, validation), exercised independently from the rest of the
//! optimizer.

use adspend_optimizer::config::validation::{
    known_config_keys, suggest_correction, validate_typical_ranges, validate_unknown_keys,
};
use adspend_optimizer::config::{ConfigError, LedgerBackend, OptimizerConfig};
use adspend_optimizer::DecisionEngine;
use std::collections::HashMap;
use std::io::Write;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_threshold_warns_with_suggestion() {
    let toml_str = r#"
[thresholds]
max_cpcc = 6.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert_eq!(warnings[0].suggestion.as_deref(), Some("thresholds.max_cpc"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[thresholds]
min_ctr = 0.8
top_performer_ctr = 3.5
max_cpc = 7.5
min_sample_size = 150
max_cpa = 120.0

[run]
lookback_days = 14
exclude_paused_from_bid_aggregate = false

[platform]
base_url = "https://ads.example.test/rest"
timeout_secs = 10

[ledger]
backend = "sled"
path = "/var/lib/adspend/ledger"

[report]
summary_dir = "/var/lib/adspend/summaries"
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
    let config = OptimizerConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.ledger.backend, LedgerBackend::Sled);
    assert_eq!(config.thresholds.max_cpa, Some(120.0));
    assert!(config.validate().is_ok());
}

#[test]
fn every_known_key_is_dotted_under_a_section() {
    for key in known_config_keys() {
        let section = key.split('.').next().unwrap();
        assert!(
            ["thresholds", "run", "platform", "ledger", "report"].contains(&section),
            "unexpected section for {key}"
        );
    }
    assert!(suggest_correction("ledger.backnd", &known_config_keys()).is_some());
}

#[test]
fn long_lookback_only_warns() {
    let mut config = OptimizerConfig::default();
    config.run.lookback_days = 180;
    assert_eq!(validate_typical_ranges(&config).len(), 1);
    assert!(config.validate().is_ok());
}

// ============================================================================
// Load Pipeline
// ============================================================================

#[test]
fn file_then_env_override_order() {
    let file = write_config(
        r#"
[thresholds]
min_ctr = 0.7
max_cpc = 6.0
"#,
    );
    let config = OptimizerConfig::load_with(Some(file.path()), env_from(&[("MAX_CPC", "9.5")])).unwrap();
    assert_eq!(config.thresholds.min_ctr, 0.7);
    assert_eq!(config.thresholds.max_cpc, 9.5);
}

#[test]
fn config_env_var_names_the_file() {
    let file = write_config("[run]\nlookback_days = 3\n");
    let path = file.path().to_string_lossy().to_string();
    let config = OptimizerConfig::load_with(None, env_from(&[("ADSPEND_CONFIG", &path)])).unwrap();
    assert_eq!(config.run.lookback_days, 3);
}

#[test]
fn missing_config_env_file_is_fatal() {
    let err = OptimizerConfig::load_with(None, env_from(&[("ADSPEND_CONFIG", "/nonexistent/x.toml")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
}

#[test]
fn malformed_toml_is_fatal() {
    let file = write_config("[thresholds\nmin_ctr = ");
    let err = OptimizerConfig::load_with(Some(file.path()), |_| None).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(..)));
}

#[test]
fn invalid_thresholds_refuse_to_run() {
    let file = write_config(
        r#"
[thresholds]
bid_floor = 10.0
bid_ceiling = 5.0
"#,
    );
    let err = OptimizerConfig::load_with(Some(file.path()), |_| None).unwrap_err();
    assert!(err.to_string().contains("bid_ceiling"));

    let mut thresholds = OptimizerConfig::default().thresholds;
    thresholds.min_ratio = 0.0;
    assert!(DecisionEngine::new(thresholds).is_err());
}

#[test]
fn max_cpa_env_override_sets_cap() {
    let config = OptimizerConfig::load_with(
        Some(write_config("").path()),
        env_from(&[("MAX_CPA", "80"), ("LOOKBACK_DAYS", "10")]),
    )
    .unwrap();
    assert_eq!(config.thresholds.max_cpa, Some(80.0));
    assert_eq!(config.run.lookback_days, 10);
}
