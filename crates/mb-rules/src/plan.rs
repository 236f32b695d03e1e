//! The `TranscodePlan` data model (§3) produced by the Decision Engine.

use std::path::PathBuf;

use mb_core::{ActionTag, OutputKind};
use serde::{Deserialize, Serialize};

/// Where a derived or mapped audio output stream gets its samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioSource {
    /// Straight from an input stream index.
    Input(u32),
    /// The channelmap-fixed version of the selected surround stream.
    FixedChannelmap,
    /// The freshly-synthesized 5.1 downmix of a 7.1 source.
    Derived51,
}

/// What to do with the (single) video stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VideoAction {
    /// No video stream in this input (audio-only file).
    None,
    /// Stream-copy: already H.264, SDR, within resolution bounds.
    Copy,
    /// Re-encode with the given encoder and optional filter chain.
    Reencode {
        encoder: EncoderChoice,
        /// The fully assembled `-vf` filter string (tone-map, channelmap,
        /// scale legs concatenated in order), if any.
        video_filter: Option<String>,
    },
}

/// Which concrete encoder backend and quality parameters to use (§4.5.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EncoderChoice {
    /// VAAPI hardware encode. Never chosen for HDR sources (no `zscale` support).
    HardwareVaapi { qp: u32 },
    /// `libx264`, the default software path.
    SoftwareX264 {
        crf: u32,
        preset: String,
        /// `-threads 0` (auto-detect) vs. omitted, matching whether the
        /// capability probe found full software support or we're on the
        /// last-resort fallback path.
        threads_auto: bool,
    },
}

/// The surround track chosen to carry through / derive from (§4.5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedSurround {
    pub input_index: u32,
    pub channels: u32,
    /// True when the source reports 6 channels with an empty/unknown layout
    /// tag, requiring an explicit `channelmap` filter before it can be used.
    pub needs_channelmap_fix: bool,
    /// The source's reported channel layout, e.g. `"5.1(side)"`. `None`
    /// when unknown/empty and not fixable (8-channel with no layout tag);
    /// `needs_channelmap_fix` streams carry their pre-fix (empty) value
    /// here since the filter graph — not this field — is what makes the
    /// layout known downstream.
    pub channel_layout: Option<String>,
    /// Output language tag. Always `"eng"` (§4.5.5: all output audio
    /// streams carry `language=eng`, including a selected surround that was
    /// originally unlabeled).
    pub language: String,
}

/// Kind of synthesized audio track (§4.5.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerivedKind {
    Downmix51From71,
    DialogueStereoFromSurround,
}

/// One synthesized audio output track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedTrack {
    pub source: AudioSource,
    pub kind: DerivedKind,
    pub title: String,
    pub language: String,
}

/// An existing stereo (or other non-surround) audio stream mapped through
/// unchanged or with a stream-copy/AAC re-encode, separate from anything
/// synthesized from a surround track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreservedAudio {
    pub input_index: u32,
    pub title: String,
    /// `true` when the source codec is already AAC and can be stream-copied
    /// rather than re-encoded.
    pub can_copy: bool,
    pub channel_layout: Option<String>,
    /// Output language tag. Always `"eng"` (§4.5.5), even when the source
    /// stream itself was unlabeled (`und`/empty) rather than `eng`.
    pub language: String,
}

/// One included text subtitle (§4.5.6). PGS streams never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleMapping {
    pub input_index: u32,
    pub output_codec: String,
    pub language: String,
}

/// One PGS sidecar extraction (§4.5.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPgs {
    pub input_index: u32,
    pub output_suffix: String,
}

/// Audio-only (FLAC/WAV/etc. -> MP3) re-encode parameters (§4.5.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioReencode {
    pub codec: String,
    pub bitrate_kbps: u32,
    pub copy_format_metadata: bool,
}

/// The Decision Engine's output: everything the Filter-Graph Builder and
/// Transcode Executor need to act on one input file (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodePlan {
    pub input_path: PathBuf,
    pub output_kind: OutputKind,

    pub skip: bool,
    pub skip_reason: Option<String>,

    pub video_action: VideoAction,

    pub selected_surround: Option<SelectedSurround>,
    /// Ordered; 5.1-from-7.1 downmix (if any) always precedes the dialogue
    /// stereo downmix (§3 invariant).
    pub derived_tracks: Vec<DerivedTrack>,
    pub preserved_audio: Option<PreservedAudio>,

    pub subtitle_map: Vec<SubtitleMapping>,
    pub extracted_pgs: Vec<ExtractedPgs>,

    /// Audio-only re-encode (FLAC/WAV -> MP3). `None` for the video pipeline
    /// and for an audio file that's skipped.
    pub audio_reencode: Option<AudioReencode>,

    /// Rewritten output filename (resolution-token replacement), relative
    /// to the input's own directory. `None` means "same name".
    pub output_path_transform: Option<PathBuf>,

    pub action_tag: ActionTag,
}

impl TranscodePlan {
    /// The output audio stream order mandated by §4.6: surround, derived
    /// 5.1, preserved stereo, derived dialogue stereo — omitting whichever
    /// of those aren't present in this plan.
    #[must_use]
    pub fn output_audio_order(&self) -> Vec<AudioOutputStream<'_>> {
        let mut out = Vec::new();

        if let Some(surround) = &self.selected_surround {
            out.push(AudioOutputStream::Surround(surround));
        }
        if let Some(derived_51) = self
            .derived_tracks
            .iter()
            .find(|t| t.kind == DerivedKind::Downmix51From71)
        {
            out.push(AudioOutputStream::Derived(derived_51));
        }
        if let Some(preserved) = &self.preserved_audio {
            out.push(AudioOutputStream::Preserved(preserved));
        }
        if let Some(dialogue) = self
            .derived_tracks
            .iter()
            .find(|t| t.kind == DerivedKind::DialogueStereoFromSurround)
        {
            out.push(AudioOutputStream::Derived(dialogue));
        }

        out
    }
}

/// A typed view over one entry of [`TranscodePlan::output_audio_order`],
/// used by the filter-graph builder to emit per-stream codec args without
/// re-deriving the ordering rule itself.
#[derive(Debug, Clone, Copy)]
pub enum AudioOutputStream<'a> {
    Surround(&'a SelectedSurround),
    Derived(&'a DerivedTrack),
    Preserved(&'a PreservedAudio),
}
