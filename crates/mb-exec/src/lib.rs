//! mb-exec: the Transcode Executor (§4.7).
//!
//! Owns the exclusive file lock, the temp-then-rename swap, sidecar
//! renaming, and the cache update for one input file's transcode. Delegates
//! argument assembly to `mb-filter` and the skip/re-encode decision to
//! `mb-rules`.

pub mod executor;
pub mod sidecars;

pub use executor::{execute, sweep_stale_temp_files, ExecutionOutcome};
