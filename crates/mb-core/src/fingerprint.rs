//! Content-identity fingerprinting (§3: Fingerprint).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// `sha256(basename || "|" || size_bytes || "|" || mtime)`.
///
/// Basename-based rather than full-path so the same file seen through two
/// different mount points (host vs. container) fingerprints identically.
/// Renames invalidate the fingerprint by design.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Lowercase hex-encoded SHA-256 digest; this is the cache map key.
    pub hash: String,
    /// File basename the digest was computed from (for re-verification).
    pub file_name: String,
    /// File size in bytes at the time of fingerprinting.
    pub size_bytes: u64,
    /// Modification time, seconds since epoch, as an `f64` (matching the
    /// fractional-second precision `stat()` exposes).
    pub mtime: f64,
}

impl Fingerprint {
    /// Compute the fingerprint of a file on disk.
    ///
    /// Fails with [`Error::Io`] if the file cannot be `stat`-ed.
    pub fn of_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Other(format!("path has no file name: {}", path.display())))?;
        let size_bytes = metadata.len();
        let mtime = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        Ok(Self::compute(&file_name, size_bytes, mtime))
    }

    /// Compute the fingerprint from already-known components. Exposed
    /// directly so tests and the cache's re-verification path don't need a
    /// real file on disk.
    #[must_use]
    pub fn compute(file_name: &str, size_bytes: u64, mtime: f64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(file_name.as_bytes());
        hasher.update(b"|");
        hasher.update(size_bytes.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(format!("{mtime:.6}").as_bytes());
        let hash = hex::encode(hasher.finalize());

        Self {
            hash,
            file_name: file_name.to_string(),
            size_bytes,
            mtime,
        }
    }

    /// Whether a fingerprint computed just now for `path` matches this one
    /// (same basename, size, and mtime). Used by the cache to re-verify an
    /// entry cheaply without recomputing the hash.
    #[must_use]
    pub fn matches_current(&self, path: &Path) -> bool {
        Fingerprint::of_path(path)
            .map(|current| current.hash == self.hash)
            .unwrap_or(false)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn same_inputs_produce_same_hash() {
        let a = Fingerprint::compute("movie.mkv", 1024, 1_700_000_000.0);
        let b = Fingerprint::compute("movie.mkv", 1024, 1_700_000_000.0);
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn different_size_changes_hash() {
        let a = Fingerprint::compute("movie.mkv", 1024, 1_700_000_000.0);
        let b = Fingerprint::compute("movie.mkv", 2048, 1_700_000_000.0);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn different_mtime_changes_hash() {
        let a = Fingerprint::compute("movie.mkv", 1024, 1_700_000_000.0);
        let b = Fingerprint::compute("movie.mkv", 1024, 1_700_000_001.0);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn basename_only_ignores_directory() {
        // Same basename/size/mtime computed independently of any path
        // component should match regardless of where the file lives.
        let a = Fingerprint::compute("movie.mkv", 1024, 1_700_000_000.0);
        let b = Fingerprint::compute("movie.mkv", 1024, 1_700_000_000.0);
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn of_path_reads_real_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        let fp = Fingerprint::of_path(file.path()).unwrap();
        assert_eq!(fp.size_bytes, 11);
        assert!(!fp.hash.is_empty());
    }

    #[test]
    fn matches_current_detects_unchanged_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        let fp = Fingerprint::of_path(file.path()).unwrap();
        assert!(fp.matches_current(file.path()));
    }

    #[test]
    fn matches_current_detects_changed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        let fp = Fingerprint::of_path(file.path()).unwrap();

        file.write_all(b" more data").unwrap();
        file.flush().unwrap();
        // Size changed; hash should no longer match (mtime may also differ).
        assert!(!fp.matches_current(file.path()) || fp.size_bytes != 21);
    }
}
