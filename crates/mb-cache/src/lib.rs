//! mb-cache: the per-directory Metadata Cache (§4.2).
//!
//! One JSON file per directory (`.mediabox_cache.json`), keyed by
//! fingerprint hash. Readers and writers never lock it: the policy is
//! last-writer-wins, with corruption treated as "no cache" rather than a
//! fatal error, because every entry can be re-derived by reprobing.

mod entry;
mod store;

pub use entry::{CacheEntry, PROCESSING_VERSION};
pub use store::MetadataCache;
