//! mb-probe: the Probe Adapter and HDR Detector.
//!
//! Shells out to an `ffprobe`-compatible inspector binary, parses its JSON
//! output into a [`MediaProbe`], and derives HDR classification from the
//! probed stream fields. Nothing here understands encoding — that is
//! `mb-rules`'/`mb-filter`'s job.

pub mod ffprobe;
pub mod hdr;
pub mod types;

pub use ffprobe::ProbeAdapter;
pub use types::{Format, MediaProbe, Stream};
