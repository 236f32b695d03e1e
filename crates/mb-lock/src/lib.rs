//! mb-lock: the cross-host advisory File Lock (§4.3).
//!
//! A sidecar JSON file (`<path>.lock`) advertises whoever currently owns a
//! file. Creation is atomic (open-exclusive); a read-after-write check
//! closes the window where two creators can both believe they won on a
//! non-POSIX filesystem. Locks older than the staleness threshold are
//! evictable by anyone, which is how a crashed worker's lock is eventually
//! recovered without an active heartbeat.

mod guard;
mod lockfile;

pub use guard::LockGuard;
pub use lockfile::{AcquireOutcome, FileLock, LockFile};
