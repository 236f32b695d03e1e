//! mb-rules: the Decision Engine (§4.5).
//!
//! Turns a [`mb_probe::MediaProbe`] plus caller flags into a
//! [`TranscodePlan`] describing exactly what the Filter-Graph Builder and
//! Transcode Executor need to do — or a decision to skip the file entirely.
//! Nothing here shells out to anything except the one-time encoder
//! capability probe; everything else is pure data transformation.

pub mod capability;
pub mod engine;
pub mod filename;
pub mod plan;
pub mod titles;

pub use capability::EncoderCapability;
pub use engine::{decide, decide_audio, decide_video, resolved_output_path, DecisionFlags};
pub use plan::{
    AudioOutputStream, AudioReencode, AudioSource, DerivedKind, DerivedTrack, EncoderChoice,
    ExtractedPgs, PreservedAudio, SelectedSurround, SubtitleMapping, TranscodePlan, VideoAction,
};
