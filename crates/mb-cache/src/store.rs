//! Per-directory cache file I/O (§4.2).

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use mb_core::{ActionTag, Error, Fingerprint, Result};

use crate::entry::{CacheEntry, PROCESSING_VERSION};

const CACHE_FILE_NAME: &str = ".mediabox_cache.json";

/// A loaded view of one directory's `.mediabox_cache.json`. Holds entries
/// in memory; every mutation persists immediately (atomic temp+rename) so
/// no file handle is ever held open across a transcode.
#[derive(Debug)]
pub struct MetadataCache {
    directory: PathBuf,
    entries: HashMap<String, CacheEntry>,
}

impl MetadataCache {
    /// Load the cache for `directory`. A missing file yields an empty
    /// cache; a corrupt file is retried once, then also treated as empty —
    /// every entry can be re-derived by reprobing, so there is no fatal
    /// cache-read error.
    pub fn load(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        let path = directory.join(CACHE_FILE_NAME);

        let entries = if path.exists() {
            Self::read_entries(&path)
                .or_else(|_| Self::read_entries(&path))
                .unwrap_or_default()
        } else {
            HashMap::new()
        };

        Ok(Self { directory, entries })
    }

    fn read_entries(path: &Path) -> Result<HashMap<String, CacheEntry>> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Fingerprint a file on disk. A thin pass-through kept on the cache's
    /// own API surface so callers don't need a separate import for the one
    /// operation that always precedes a lookup.
    pub fn fingerprint(path: &Path) -> Result<Fingerprint> {
        Fingerprint::of_path(path)
    }

    /// Look up a cache entry by fingerprint. Returns `None` when the file
    /// has never been probed, or when the entry was written by an older
    /// `processing_version` and must be recomputed.
    #[must_use]
    pub fn lookup(&self, fp: &Fingerprint) -> Option<&CacheEntry> {
        self.entries
            .get(&fp.hash)
            .filter(|e| e.processing_version == PROCESSING_VERSION)
    }

    /// Insert or overwrite an entry and persist immediately.
    pub fn store(&mut self, fp: &Fingerprint, entry: CacheEntry) -> Result<()> {
        self.entries.insert(fp.hash.clone(), entry);
        self.persist()
    }

    /// Apply the outcome of a transcode attempt (§4.2).
    ///
    /// Handles the same-directory cases directly. A destination in a
    /// different directory is the caller's job via [`Self::migrate_entry_to`]
    /// — one `MetadataCache` only ever owns one directory's file.
    pub fn update_after_conversion(
        &mut self,
        original_fp: &Fingerprint,
        new_path: &Path,
        success: bool,
        error: Option<String>,
        duration: Option<f64>,
    ) -> Result<()> {
        if !success {
            if let Some(entry) = self.entries.get_mut(&original_fp.hash) {
                entry.processing_error = error;
                entry.last_processed = Some(current_iso8601());
            }
            return self.persist();
        }

        if !new_path.exists() {
            self.entries.remove(&original_fp.hash);
            return self.persist();
        }

        let same_dir = new_path.parent() == Some(self.directory.as_path());
        if !same_dir {
            self.entries.remove(&original_fp.hash);
            return self.persist();
        }

        let new_fp = Fingerprint::of_path(new_path)?;
        if let Some(mut entry) = self.entries.remove(&original_fp.hash) {
            entry.conversion_count += 1;
            entry.action = ActionTag::Skip.to_string();
            entry.last_processed = Some(current_iso8601());
            entry.last_conversion_duration = duration;
            entry.processing_error = None;
            entry.file_name = new_fp.file_name.clone();
            entry.file_size = new_fp.size_bytes;
            entry.file_mtime = new_fp.mtime;
            self.entries.insert(new_fp.hash, entry);
        }
        self.persist()
    }

    /// Move an entry from this cache into `other` (a different directory's
    /// cache), re-fingerprinting at the new location.
    pub fn migrate_entry_to(
        &mut self,
        other: &mut MetadataCache,
        original_fp: &Fingerprint,
        new_path: &Path,
    ) -> Result<()> {
        if let Some(mut entry) = self.entries.remove(&original_fp.hash) {
            if let Ok(new_fp) = Fingerprint::of_path(new_path) {
                entry.file_name = new_fp.file_name.clone();
                entry.file_size = new_fp.size_bytes;
                entry.file_mtime = new_fp.mtime;
                entry.conversion_count += 1;
                entry.action = ActionTag::Skip.to_string();
                other.entries.insert(new_fp.hash, entry);
            }
        }
        self.persist()?;
        other.persist()
    }

    /// Remove entries whose backing file no longer exists in this directory.
    pub fn cleanup(&mut self) -> Result<()> {
        let directory = self.directory.clone();
        self.entries
            .retain(|_, e| directory.join(&e.file_name).exists());
        self.persist()
    }

    /// Strip stale entries (file gone, or on-disk fingerprint no longer
    /// matches the cached one) for every directory given.
    pub fn migrate(directories: &[PathBuf]) -> Result<()> {
        for dir in directories {
            let mut cache = Self::load(dir.clone())?;
            cache.migrate_self()?;
        }
        Ok(())
    }

    fn migrate_self(&mut self) -> Result<()> {
        let directory = self.directory.clone();
        self.entries.retain(|hash, e| {
            let path = directory.join(&e.file_name);
            if !path.exists() {
                return false;
            }
            Fingerprint::of_path(&path)
                .map(|fp| &fp.hash == hash)
                .unwrap_or(false)
        });
        self.persist()
    }

    /// Atomic write: temp file in the same directory, then rename over the
    /// target so readers never observe a partial write.
    fn persist(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.entries)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.directory)
            .map_err(|e| Error::cache_write_failed(&self.directory, e.to_string()))?;
        tmp.write_all(&json)
            .map_err(|e| Error::cache_write_failed(&self.directory, e.to_string()))?;
        tmp.persist(self.directory.join(CACHE_FILE_NAME))
            .map_err(|e| Error::cache_write_failed(&self.directory, e.to_string()))?;

        Ok(())
    }
}

fn current_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}
