//! Host-path to indexer-path rewriting (§4.8, §9 Design Notes).
//!
//! The engine and the downstream indexer often see the same file through
//! different mount points (e.g. `/data/tv/...` on the host vs. `/tv/...`
//! inside the indexer's own container). [`mb_core::config::PathMapping`]
//! makes that rewrite configurable instead of hard-coded.

use std::path::{Path, PathBuf};

use mb_core::config::PathMapping;

/// Rewrite `path` using the first matching entry in `mappings` (declaration
/// order), or return it unchanged if nothing matches.
#[must_use]
pub fn rewrite(path: &Path, mappings: &[PathMapping]) -> PathBuf {
    for mapping in mappings {
        if let Ok(suffix) = path.strip_prefix(&mapping.source_prefix) {
            return mapping.indexer_prefix.join(suffix);
        }
    }
    path.to_path_buf()
}
