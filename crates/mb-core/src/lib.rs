//! mb-core: shared error type, media-domain enums, fingerprinting, and configuration.
//!
//! This crate is the foundational dependency for every other `mb-*` crate. It
//! carries nothing specific to probing, caching, locking, or transcoding —
//! only the vocabulary those crates share.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod media;

pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use media::*;
