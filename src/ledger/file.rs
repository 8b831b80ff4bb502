//! File-backed ledger: `<root>/optimizer_actions/YYYY-MM-DD.jsonl`

use chrono::NaiveDate;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use super::{ActionLedger, LedgerError, PartitionLock};
use crate::config::defaults;
use crate::types::LedgerEntry;

pub struct FileLedger {
    dir: PathBuf,
    /// Serializes writers inside this process; the lock file covers other processes.
    writer: Mutex<()>,
    lock_wait: Duration,
    stale_after: Duration,
}

impl FileLedger {
    /// Open (and create if needed) the partition directory under `root`.
    pub fn open(root: &Path) -> Result<Self, LedgerError> {
        let dir = root.join(defaults::LEDGER_PARTITION_DIR);
        fs::create_dir_all(&dir).map_err(|source| LedgerError::Io { path: dir.clone(), source })?;
        Ok(Self {
            dir,
            writer: Mutex::new(()),
            lock_wait: Duration::from_millis(defaults::LEDGER_LOCK_WAIT_MS),
            stale_after: Duration::from_secs(defaults::LEDGER_STALE_LOCK_SECS),
        })
    }

    pub fn partition_path(&self, partition: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.jsonl", partition.format("%Y-%m-%d")))
    }

    fn read_file(path: &Path, partition: NaiveDate) -> Result<Vec<LedgerEntry>, LedgerError> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(LedgerError::Io { path: path.to_path_buf(), source }),
        };

        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| LedgerError::Corrupt {
                    partition,
                    line: i + 1,
                    error: e.to_string(),
                })
            })
            .collect()
    }

    /// Write the full partition to a temp file, fsync, then rename over the target.
    fn write_atomic(path: &Path, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        let mut buf = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut buf, entry)?;
            buf.push(b'\n');
        }

        let tmp_path = path.with_extension("jsonl.tmp");
        let io_err = |source| LedgerError::Io { path: tmp_path.clone(), source };
        {
            let mut file = File::create(&tmp_path).map_err(io_err)?;
            file.write_all(&buf).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        fs::rename(&tmp_path, path).map_err(|source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl ActionLedger for FileLedger {
    fn append(&self, entry: &LedgerEntry, partition: NaiveDate) -> Result<(), LedgerError> {
        let _guard = self
            .writer
            .lock()
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        let path = self.partition_path(partition);
        let _lock = PartitionLock::acquire(&path, self.lock_wait, self.stale_after)?;

        let mut entries = Self::read_file(&path, partition)?;
        entries.push(entry.clone());
        Self::write_atomic(&path, &entries)?;

        tracing::debug!(
            partition = %partition,
            entries = entries.len(),
            resource = %entry.resource_id,
            "Ledger entry appended"
        );
        Ok(())
    }

    fn read_partition(&self, partition: NaiveDate) -> Result<Vec<LedgerEntry>, LedgerError> {
        Self::read_file(&self.partition_path(partition), partition)
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
