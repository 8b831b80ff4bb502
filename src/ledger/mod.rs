//! Action Ledger: append-only, date-partitioned journal of executed actions
//!
//! Every backend honours the same update discipline for a partition: read it
//! in full, append in memory, replace it atomically. Writers to one
//! partition are serialized, so a concurrent run can never interleave a
//! partial write or drop an entry another writer appended.
//!
//! - `FileLedger`: one JSON Lines file per day, lock file + atomic rename
//! - `SledLedger`: one sled key per day, compare-and-swap updates
//! - `InMemoryLedger`: tests and dry runs

mod file;
mod lock;
mod memory;
mod sled_store;

pub use file::FileLedger;
pub use lock::PartitionLock;
pub use memory::InMemoryLedger;
pub use sled_store::SledLedger;

use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{LedgerBackend, LedgerConfig};
use crate::types::{ActionKind, LedgerEntry};

/// Pluggable ledger backend.
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across async tasks.
pub trait ActionLedger: Send + Sync {
    /// Append one entry to the partition for `partition`.
    fn append(&self, entry: &LedgerEntry, partition: NaiveDate) -> Result<(), LedgerError>;

    /// All entries of one partition, in append order. Missing partition is empty.
    fn read_partition(&self, partition: NaiveDate) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger I/O error ({path}): {source}", path = .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("partition {partition} is corrupt at line {line}: {error}")]
    Corrupt {
        partition: NaiveDate,
        line: usize,
        error: String,
    },
    #[error("timed out waiting for partition lock {}", .0.display())]
    LockTimeout(PathBuf),
}

impl From<sled::Error> for LedgerError {
    fn from(e: sled::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

/// Open the configured backend.
pub fn open_ledger(config: &LedgerConfig) -> Result<Arc<dyn ActionLedger>, LedgerError> {
    let ledger: Arc<dyn ActionLedger> = match config.backend {
        LedgerBackend::File => Arc::new(FileLedger::open(&config.path)?),
        LedgerBackend::Sled => Arc::new(SledLedger::open(&config.path)?),
    };
    tracing::info!(
        backend = ledger.backend_name(),
        path = %config.path.display(),
        "Action ledger opened"
    );
    Ok(ledger)
}

/// What today's partition already shows as applied, for cross-run
/// idempotency checks.
#[derive(Debug, Default)]
pub struct AppliedIndex {
    paused_creatives: std::collections::HashSet<String>,
    campaign_bids: std::collections::HashSet<(String, i64)>,
}

impl AppliedIndex {
    pub fn from_entries(entries: &[LedgerEntry]) -> Self {
        let mut index = Self::default();
        for entry in entries.iter().filter(|e| e.outcome.is_applied()) {
            match entry.action_type {
                ActionKind::PauseCreative => {
                    index.paused_creatives.insert(entry.resource_id.clone());
                }
                ActionKind::AdjustBid => {
                    if let Some(bid) = entry.new_bid() {
                        index.campaign_bids.insert((entry.resource_id.clone(), cents(bid)));
                    }
                }
                ActionKind::FlagWinner => {}
            }
        }
        index
    }

    pub fn creative_paused(&self, creative_id: &str) -> bool {
        self.paused_creatives.contains(creative_id)
    }

    pub fn bid_applied(&self, campaign_id: &str, bid: f64) -> bool {
        self.campaign_bids.contains(&(campaign_id.to_string(), cents(bid)))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn cents(bid: f64) -> i64 {
    (bid * 100.0).round() as i64
}
