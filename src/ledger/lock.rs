//! Partition Lock File
//!
//! Serializes writers to one ledger partition across processes. The lock is
//! a sibling `<partition>.lock` file created with `create_new`, holding an
//! owner token (`<pid>:<nanos>`). A lock older than the stale timeout is
//! assumed abandoned by a killed run and is broken.
//!
//! Breaking goes through an atomic rename to a private tombstone, and the
//! tombstone is re-checked afterwards. When two waiters race to break the
//! same stale lock, the loser ends up holding the winner's fresh lock in
//! its tombstone and links it back instead of deleting it.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use super::LedgerError;

const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Held lock on one partition; released on drop.
#[derive(Debug)]
pub struct PartitionLock {
    lock_path: PathBuf,
    token: String,
    owned: bool,
}

impl PartitionLock {
    /// Acquire the lock for `partition_path`, waiting up to `wait`.
    pub fn acquire(partition_path: &Path, wait: Duration, stale_after: Duration) -> Result<Self, LedgerError> {
        let lock_path = Self::lock_path_for(partition_path);
        let deadline = Instant::now() + wait;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
                Ok(mut file) => {
                    let token = unique_token();
                    if let Err(source) = writeln!(file, "{token}").and_then(|()| file.sync_all()) {
                        let _ = fs::remove_file(&lock_path);
                        return Err(LedgerError::Io { path: lock_path, source });
                    }
                    tracing::debug!(lock = %lock_path.display(), "Acquired partition lock");
                    return Ok(Self { lock_path, token, owned: true });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if Self::is_stale(&lock_path, stale_after) {
                        Self::break_stale(&lock_path, stale_after)?;
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(LedgerError::LockTimeout(lock_path));
                    }
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(source) => return Err(LedgerError::Io { path: lock_path, source }),
            }
        }
    }

    fn lock_path_for(partition_path: &Path) -> PathBuf {
        let mut name = partition_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        partition_path.with_file_name(name)
    }

    fn is_stale(path: &Path, stale_after: Duration) -> bool {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > stale_after)
    }

    /// Move the lock aside, then delete it only if what was moved is still
    /// stale. Rename keeps the mtime, so the re-check sees the same file.
    fn break_stale(lock_path: &Path, stale_after: Duration) -> Result<(), LedgerError> {
        let mut name = lock_path.as_os_str().to_os_string();
        name.push(format!(".stale-{}", unique_token().replace(':', "-")));
        let tombstone = PathBuf::from(name);

        match fs::rename(lock_path, &tombstone) {
            Ok(()) => {}
            // Another waiter already broke it
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(LedgerError::Io {
                    path: lock_path.to_path_buf(),
                    source,
                })
            }
        }

        if Self::is_stale(&tombstone, stale_after) {
            tracing::warn!(lock = %lock_path.display(), "Breaking stale partition lock");
        } else {
            // Moved a live lock: put it back unless the slot was taken again.
            match fs::hard_link(&tombstone, lock_path) {
                Ok(()) => tracing::debug!(lock = %lock_path.display(), "Restored live partition lock"),
                Err(e) => tracing::warn!(
                    lock = %lock_path.display(),
                    error = %e,
                    "Could not restore live partition lock"
                ),
            }
        }
        let _ = fs::remove_file(&tombstone);
        Ok(())
    }

    /// Release the lock (called automatically on drop). A lock file that no
    /// longer carries our token belongs to someone else and is left alone.
    pub fn release(&mut self) {
        if !self.owned {
            return;
        }
        self.owned = false;
        match fs::read_to_string(&self.lock_path) {
            Ok(contents) if contents.trim() == self.token => {
                if let Err(e) = fs::remove_file(&self.lock_path) {
                    tracing::warn!("Failed to remove partition lock: {}", e);
                }
            }
            Ok(_) => tracing::warn!(
                lock = %self.lock_path.display(),
                "Partition lock was taken over, leaving it in place"
            ),
            Err(e) => tracing::warn!("Failed to read partition lock on release: {}", e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for PartitionLock {
    fn drop(&mut self) {
        self.release();
    }
}

fn unique_token() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{}:{}", std::process::id(), nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lock_released_on_drop() {
        let dir = tempdir().unwrap();
        let partition = dir.path().join("2026-10-18.jsonl");
        let lock_path;
        {
            let lock = PartitionLock::acquire(&partition, Duration::from_secs(1), Duration::from_secs(60)).unwrap();
            lock_path = lock.path().to_path_buf();
            assert!(lock_path.exists());
            assert!(lock_path.ends_with("2026-10-18.jsonl.lock"));
        }
        assert!(!lock_path.exists());
    }

    #[test]
    fn held_lock_times_out() {
        let dir = tempdir().unwrap();
        let partition = dir.path().join("2026-10-18.jsonl");
        let _held = PartitionLock::acquire(&partition, Duration::from_secs(1), Duration::from_secs(60)).unwrap();
        let err = PartitionLock::acquire(&partition, Duration::from_millis(30), Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, LedgerError::LockTimeout(_)));
    }

    #[test]
    fn stale_lock_is_broken() {
        let dir = tempdir().unwrap();
        let partition = dir.path().join("2026-10-18.jsonl");
        fs::write(dir.path().join("2026-10-18.jsonl.lock"), "999999999\n").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let lock = PartitionLock::acquire(&partition, Duration::from_millis(50), Duration::from_millis(1));
        assert!(lock.is_ok());
    }

    #[test]
    fn breaking_a_live_lock_restores_it() {
        // A waiter whose staleness check is out of date must not delete a
        // lock another waiter has just created.
        let dir = tempdir().unwrap();
        let partition = dir.path().join("2026-10-18.jsonl");
        let held = PartitionLock::acquire(&partition, Duration::from_secs(1), Duration::from_secs(60)).unwrap();
        let before = fs::read_to_string(held.path()).unwrap();

        PartitionLock::break_stale(held.path(), Duration::from_secs(60)).unwrap();

        assert_eq!(fs::read_to_string(held.path()).unwrap(), before);
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "tombstone left behind");
        let err = PartitionLock::acquire(&partition, Duration::from_millis(30), Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, LedgerError::LockTimeout(_)));
    }

    #[test]
    fn release_leaves_a_foreign_lock() {
        let dir = tempdir().unwrap();
        let partition = dir.path().join("2026-10-18.jsonl");
        let lock = PartitionLock::acquire(&partition, Duration::from_secs(1), Duration::from_secs(60)).unwrap();
        let lock_path = lock.path().to_path_buf();
        fs::write(&lock_path, "4242:1\n").unwrap();
        drop(lock);
        assert!(lock_path.exists());
    }
}
