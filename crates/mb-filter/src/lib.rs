//! mb-filter: the Filter-Graph Builder (§4.6).
//!
//! Turns a [`mb_rules::TranscodePlan`] into the literal ffmpeg argument
//! vectors the Transcode Executor spawns: the main transcode invocation,
//! plus one small extraction invocation per PGS subtitle sidecar.

pub mod args;
pub mod graph;

pub use args::{build, sidecar_path_for, FfmpegPlan, PgsExtraction};
pub use graph::{build_audio_graph, AudioGraph, FilterStep};
