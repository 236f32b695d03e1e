//! [`LockGuard`]: the scoped resource returned by a successful
//! [`crate::FileLock::acquire`] (§9 Design Notes — ownership modeled as a
//! drop action rather than a global "unfinished" pointer).

use std::path::PathBuf;

use mb_core::Result;

use crate::lockfile::{read_lock_file, LockFile};

/// Holds the lock sidecar alive for as long as this value lives. Releasing
/// is idempotent and also happens automatically on drop, so a panic or an
/// early `return` in caller code never leaks the lock.
#[derive(Debug)]
pub struct LockGuard {
    lock_path: PathBuf,
    held: LockFile,
    released: bool,
}

impl LockGuard {
    pub(crate) fn new(lock_path: PathBuf, held: LockFile) -> Self {
        Self {
            lock_path,
            held,
            released: false,
        }
    }

    /// The lock record we wrote when we acquired.
    #[must_use]
    pub fn record(&self) -> &LockFile {
        &self.held
    }

    /// Release the lock now rather than waiting for drop. Only removes the
    /// sidecar if it still identifies us (`hostname` + `pid` match) — a
    /// stale lock we once held but that was since evicted and re-acquired
    /// by someone else must not be deleted out from under them.
    ///
    /// Returns `Ok(true)` if the sidecar was removed, `Ok(false)` if it was
    /// already gone, already released, or now owned by someone else.
    pub fn release(&mut self) -> Result<bool> {
        if self.released {
            return Ok(false);
        }
        self.released = true;

        match read_lock_file(&self.lock_path) {
            Some(current)
                if current.hostname == self.held.hostname && current.pid == self.held.pid =>
            {
                std::fs::remove_file(&self.lock_path)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(lock_path = %self.lock_path.display(), error = %e, "failed to release lock on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockfile::FileLock;

    #[test]
    fn release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("movie.mkv");
        std::fs::File::create(&target).unwrap();
        let lock = FileLock::new(&target);

        let mut guard = match lock.acquire(false).unwrap() {
            crate::AcquireOutcome::Acquired(g) => g,
            crate::AcquireOutcome::Held(_) => panic!("expected to acquire"),
        };

        assert!(guard.release().unwrap());
        assert!(!guard.release().unwrap());
    }

    #[test]
    fn drop_does_not_remove_lock_owned_by_someone_else() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("movie.mkv");
        std::fs::File::create(&target).unwrap();
        let lock_path = target.with_file_name("movie.mkv.lock");

        let lock = FileLock::new(&target);
        let guard = match lock.acquire(false).unwrap() {
            crate::AcquireOutcome::Acquired(g) => g,
            crate::AcquireOutcome::Held(_) => panic!("expected to acquire"),
        };

        // Simulate someone else re-writing the sidecar after a stale evict.
        let other = LockFile {
            lock_id: "otherhost_1_abc".to_string(),
            hostname: "otherhost".to_string(),
            pid: 1,
            timestamp: 0.0,
            locked_at: String::new(),
            file: target.clone(),
        };
        std::fs::write(&lock_path, serde_json::to_vec(&other).unwrap()).unwrap();

        drop(guard);
        assert!(lock_path.exists());
    }
}
