//! Config validation: unknown-key detection with Levenshtein suggestions
//! and typical-range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, ", did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `OptimizerConfig`.
///
/// Maintained by hand to match the struct hierarchy in optimizer_config.rs.
/// Any new field added there must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [thresholds]
        "thresholds",
        "thresholds.min_ctr",
        "thresholds.top_performer_ctr",
        "thresholds.max_cpc",
        "thresholds.min_sample_size",
        "thresholds.bid_change_threshold",
        "thresholds.target_ctr",
        "thresholds.bid_floor",
        "thresholds.bid_ceiling",
        "thresholds.predictor_bid_ceiling",
        "thresholds.min_ratio",
        "thresholds.max_ratio",
        "thresholds.max_bid_increase_ratio",
        "thresholds.max_bid_decrease_ratio",
        "thresholds.max_cpa",
        // [run]
        "run",
        "run.lookback_days",
        "run.exclude_paused_from_bid_aggregate",
        "run.skip_already_applied",
        "run.dry_run",
        // [platform]
        "platform",
        "platform.base_url",
        "platform.api_version",
        "platform.currency",
        "platform.timeout_secs",
        // [ledger]
        "ledger",
        "ledger.backend",
        "ledger.path",
        // [report]
        "report",
        "report.summary_dir",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let b_len = b_chars.len();
    if a.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties resolve to the lexicographically smallest key so output is stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (levenshtein(unknown, k), *k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Typical Range Validation
// ============================================================================

/// Flag values that are legal but unusual for a CPC ad account.
pub fn validate_typical_ranges(config: &super::OptimizerConfig) -> Vec<ValidationWarning> {
    let t = &config.thresholds;
    let mut warnings = Vec::new();

    // CTR is a percentage; a floor above 20% would pause nearly everything
    if t.min_ctr > 20.0 {
        warnings.push(ValidationWarning {
            field: "thresholds.min_ctr".to_string(),
            message: format!(
                "min_ctr = {:.2} looks like a fraction-vs-percent mixup (CTR is in percent)",
                t.min_ctr
            ),
            suggestion: None,
        });
    }

    if t.max_cpc > t.predictor_bid_ceiling * 5.0 {
        warnings.push(ValidationWarning {
            field: "thresholds.max_cpc".to_string(),
            message: format!(
                "max_cpc = {:.2} is far above the bid ceiling ({:.2}); the CPC rule may never fire",
                t.max_cpc, t.predictor_bid_ceiling
            ),
            suggestion: None,
        });
    }

    if config.run.lookback_days > 90 {
        warnings.push(ValidationWarning {
            field: "run.lookback_days".to_string(),
            message: format!(
                "lookback_days = {} is unusually long; decisions will lag current performance",
                config.run.lookback_days
            ),
            suggestion: None,
        });
    }

    warnings
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("min_ctrr", "min_ctr"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [thresholds]
            min_ctr = 1.0
            [run]
            dry_run = true
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"thresholds".to_string()));
        assert!(keys.contains(&"thresholds.min_ctr".to_string()));
        assert!(keys.contains(&"run.dry_run".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let toml_str = r#"
[thresholds]
top_performer_crt = 3.5
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].field.contains("top_performer_crt"));
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("thresholds.top_performer_ctr")
        );
    }

    #[test]
    fn test_unknown_section_produces_warning() {
        let toml_str = r#"
[thresholds.per_campaign]
some_field = 42
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.iter().any(|w| w.field.contains("per_campaign")));
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key_xyz", &known).is_none());
    }

    #[test]
    fn test_defaults_have_no_range_warnings() {
        let config = crate::config::OptimizerConfig::default();
        assert!(validate_typical_ranges(&config).is_empty());
    }

    #[test]
    fn test_fractional_ctr_floor_warns() {
        let mut config = crate::config::OptimizerConfig::default();
        config.thresholds.min_ctr = 50.0;
        config.thresholds.top_performer_ctr = 60.0;
        let warnings = validate_typical_ranges(&config);
        assert!(warnings.iter().any(|w| w.field == "thresholds.min_ctr"));
    }
}
