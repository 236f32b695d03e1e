//! The sidecar lock file schema and the [`FileLock`] that manages it (§3,
//! §4.3).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use mb_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::guard::LockGuard;

/// Lock sidecar contents, as written to `<path>.lock`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
    /// Unique per attempt: `hostname_pid_rand64`.
    pub lock_id: String,
    pub hostname: String,
    pub pid: u32,
    /// Epoch seconds, used for staleness comparisons.
    pub timestamp: f64,
    /// Human-readable ISO 8601 timestamp for operators.
    pub locked_at: String,
    /// Resolved path of the file being locked.
    pub file: PathBuf,
}

/// A lock that is older than this is evictable by anyone, regardless of
/// whether the original holder is still alive.
pub const STALE_THRESHOLD: Duration = Duration::from_secs(6 * 60 * 60);

/// A lock younger than this but older than [`STALE_THRESHOLD`] is assumed to
/// be a genuinely long-running conversion rather than an abandoned one.
pub const NORMAL_PROCESSING_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Result of an [`FileLock::acquire`] attempt.
#[derive(Debug)]
pub enum AcquireOutcome {
    /// Lock acquired; releases automatically when the guard drops.
    Acquired(LockGuard),
    /// Another worker holds a valid (non-stale) lock.
    Held(LockFile),
}

impl AcquireOutcome {
    /// Convenience accessor for callers that only care whether they won.
    #[must_use]
    pub fn acquired(&self) -> bool {
        matches!(self, AcquireOutcome::Acquired(_))
    }
}

/// Advisory lock over one target file, identified by a `.lock` sidecar next
/// to it.
#[derive(Debug, Clone)]
pub struct FileLock {
    target: PathBuf,
    lock_path: PathBuf,
    stale_threshold: Duration,
}

impl FileLock {
    /// Build a lock handle for `target`. Does not touch the filesystem.
    #[must_use]
    pub fn new(target: impl Into<PathBuf>) -> Self {
        let target = target.into();
        let mut lock_name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        lock_name.push(".lock");
        let lock_path = target
            .parent()
            .map(|p| p.join(&lock_name))
            .unwrap_or_else(|| PathBuf::from(&lock_name));

        Self {
            target,
            lock_path,
            stale_threshold: STALE_THRESHOLD,
        }
    }

    /// Override the staleness threshold (tests use this to exercise
    /// eviction without waiting 6 hours).
    #[must_use]
    pub fn with_stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold = threshold;
        self
    }

    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Attempt to acquire the lock.
    ///
    /// `wait = false` (the orchestrator's normal mode) returns immediately
    /// with [`AcquireOutcome::Held`] if another worker's lock is valid.
    /// `wait = true` polls every second until the lock frees up or goes
    /// stale.
    pub fn acquire(&self, wait: bool) -> Result<AcquireOutcome> {
        loop {
            if let Some(existing) = self.read() {
                if self.is_stale(&existing) {
                    let _ = std::fs::remove_file(&self.lock_path);
                } else if wait {
                    sleep(POLL_INTERVAL);
                    continue;
                } else {
                    return Ok(AcquireOutcome::Held(existing));
                }
            }

            match self.try_create() {
                Ok(candidate) => {
                    // Read-after-write: on a non-POSIX filesystem two
                    // creators can both believe `create_new` succeeded.
                    // Only the one whose id matches on readback actually won.
                    match self.read() {
                        Some(readback) if readback.lock_id == candidate.lock_id => {
                            return Ok(AcquireOutcome::Acquired(LockGuard::new(
                                self.lock_path.clone(),
                                candidate,
                            )));
                        }
                        Some(other) => {
                            if wait {
                                sleep(POLL_INTERVAL);
                                continue;
                            }
                            return Ok(AcquireOutcome::Held(other));
                        }
                        None => {
                            // Lock vanished between write and read; retry.
                            continue;
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if wait {
                        sleep(POLL_INTERVAL);
                        continue;
                    }
                    let holder = self.read().unwrap_or_else(|| LockFile {
                        lock_id: "unknown".to_string(),
                        hostname: "unknown".to_string(),
                        pid: 0,
                        timestamp: 0.0,
                        locked_at: String::new(),
                        file: self.target.clone(),
                    });
                    return Ok(AcquireOutcome::Held(holder));
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Whether the file currently carries a valid (non-stale) lock. Evicts
    /// a stale lock as a side effect, matching the reference implementation.
    pub fn is_locked(&self) -> bool {
        match self.read() {
            Some(existing) if self.is_stale(&existing) => {
                let _ = std::fs::remove_file(&self.lock_path);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    fn is_stale(&self, lock: &LockFile) -> bool {
        let now = now_epoch_secs();
        now - lock.timestamp > self.stale_threshold.as_secs_f64()
    }

    fn read(&self) -> Option<LockFile> {
        read_lock_file(&self.lock_path)
    }

    fn try_create(&self) -> std::result::Result<LockFile, std::io::Error> {
        let lock_id = generate_lock_id();
        let hostname = current_hostname();
        let pid = std::process::id();
        let now = now_epoch_secs();

        let candidate = LockFile {
            lock_id,
            hostname,
            pid,
            timestamp: now,
            locked_at: chrono::Utc::now().to_rfc3339(),
            file: self.target.clone(),
        };

        let json = serde_json::to_vec_pretty(&candidate).expect("LockFile always serializes");

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)?;
        file.write_all(&json)?;

        Ok(candidate)
    }
}

/// Read and parse a lock sidecar at `path`, if it exists and parses. Shared
/// by [`FileLock`] and [`crate::guard::LockGuard`]'s owner check.
pub(crate) fn read_lock_file(path: &Path) -> Option<LockFile> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

fn now_epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn generate_lock_id() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bits: u64 = rng.gen();
    format!("{}_{}_{:016x}", current_hostname(), std::process::id(), bits)
}

#[cfg(unix)]
fn current_hostname() -> String {
    nix::unistd::gethostname()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown-host".to_string())
}

#[cfg(not(unix))]
fn current_hostname() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|_| "unknown-host".to_string())
}
