//! Sled-backed ledger
//!
//! One tree, one key per partition date (`YYYY-MM-DD`), value is the JSON
//! array of entries. Appends go through `update_and_fetch`, sled's
//! compare-and-swap loop, so the read-append-replace cycle is atomic per key.

use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;

use super::{ActionLedger, LedgerError};
use crate::config::defaults;
use crate::types::LedgerEntry;

#[derive(Clone)]
pub struct SledLedger {
    db: Arc<sled::Db>,
    tree: sled::Tree,
}

impl SledLedger {
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Temporary database for tests.
    pub fn temporary() -> Result<Self, LedgerError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, LedgerError> {
        let tree = db.open_tree(defaults::LEDGER_SLED_TREE)?;
        Ok(Self { db: Arc::new(db), tree })
    }

    fn key(partition: NaiveDate) -> String {
        partition.format("%Y-%m-%d").to_string()
    }

    fn decode(partition: NaiveDate, bytes: &[u8]) -> Result<Vec<LedgerEntry>, LedgerError> {
        serde_json::from_slice(bytes).map_err(|e| LedgerError::Corrupt {
            partition,
            line: 0,
            error: e.to_string(),
        })
    }
}

impl ActionLedger for SledLedger {
    fn append(&self, entry: &LedgerEntry, partition: NaiveDate) -> Result<(), LedgerError> {
        // Errors inside the CAS closure cannot propagate, so capture the first one
        let mut failure: Option<LedgerError> = None;

        self.tree.update_and_fetch(Self::key(partition), |old| {
            let mut entries = match old.map(|bytes| Self::decode(partition, bytes)) {
                None => Vec::new(),
                Some(Ok(entries)) => entries,
                Some(Err(e)) => {
                    failure = Some(e);
                    return old.map(<[u8]>::to_vec);
                }
            };
            entries.push(entry.clone());
            match serde_json::to_vec(&entries) {
                Ok(bytes) => {
                    failure = None;
                    Some(bytes)
                }
                Err(e) => {
                    failure = Some(e.into());
                    old.map(<[u8]>::to_vec)
                }
            }
        })?;

        if let Some(e) = failure {
            return Err(e);
        }
        self.db.flush()?;
        Ok(())
    }

    fn read_partition(&self, partition: NaiveDate) -> Result<Vec<LedgerEntry>, LedgerError> {
        match self.tree.get(Self::key(partition))? {
            Some(bytes) => Self::decode(partition, &bytes),
            None => Ok(Vec::new()),
        }
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}
