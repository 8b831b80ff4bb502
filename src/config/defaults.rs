//! System-wide default constants.
//!
//! Centralises names and numbers that are not policy thresholds (those live
//! in `ThresholdConfig`). Grouped by subsystem for easy discovery.

// ============================================================================
// Config Loading
// ============================================================================

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "ADSPEND_CONFIG";

/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "optimizer.toml";

/// Environment variable carrying the ad platform bearer token.
pub const ACCESS_TOKEN_ENV_VAR: &str = "ADSPEND_ACCESS_TOKEN";

// ============================================================================
// Ad Platform
// ============================================================================

pub const PLATFORM_BASE_URL: &str = "https://api.linkedin.com/rest";

/// Value for the `LinkedIn-Version` header.
pub const PLATFORM_API_VERSION: &str = "202411";

/// Per-call timeout (seconds).
pub const PLATFORM_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Ledger
// ============================================================================

pub const LEDGER_PATH: &str = "./data/ledger";

/// Sub-directory of the ledger root holding one JSONL file per day.
pub const LEDGER_PARTITION_DIR: &str = "optimizer_actions";

/// Name of the sled tree holding ledger partitions.
pub const LEDGER_SLED_TREE: &str = "optimizer_actions";

/// How long a writer waits for a partition lock before giving up (ms).
pub const LEDGER_LOCK_WAIT_MS: u64 = 10_000;

/// Lock files older than this are considered abandoned (seconds).
pub const LEDGER_STALE_LOCK_SECS: u64 = 120;
