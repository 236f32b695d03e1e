//! mb-notify: the Indexer Notifier (§4.8).
//!
//! Groups a batch run's changed paths by library kind, rewrites each
//! through the configured host/indexer path mapping, and POSTs a refresh
//! request per kind to the downstream indexer. Never fails the batch.

pub mod client;
pub mod mapping;

pub use client::{rewrite_for_indexer, IndexerClient};
