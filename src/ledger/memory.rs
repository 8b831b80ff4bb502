use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{ActionLedger, LedgerError};
use crate::types::LedgerEntry;

/// In-memory ledger for testing and dry runs
///
/// Thread-safe via `RwLock`. Not durable; data is lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    partitions: RwLock<BTreeMap<NaiveDate, Vec<LedgerEntry>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total entries across every partition.
    pub fn len(&self) -> usize {
        self.partitions
            .read()
            .map(|p| p.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ActionLedger for InMemoryLedger {
    fn append(&self, entry: &LedgerEntry, partition: NaiveDate) -> Result<(), LedgerError> {
        let mut store = self
            .partitions
            .write()
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        store.entry(partition).or_default().push(entry.clone());
        Ok(())
    }

    fn read_partition(&self, partition: NaiveDate) -> Result<Vec<LedgerEntry>, LedgerError> {
        let store = self
            .partitions
            .read()
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(store.get(&partition).cloned().unwrap_or_default())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
