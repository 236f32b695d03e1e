//! Media-domain enums shared across the probe, decision, and filter crates.
//!
//! These are deliberately small, closed vocabularies — the kind of thing the
//! decision engine branches on — not an attempt to enumerate every codec
//! `ffprobe` can report. Stream codec identifiers stay as plain `String`s
//! (see `mb_probe::types::Stream`) because the engine only ever compares
//! them against a handful of literals (`"h264"`, `"aac"`, `"mp3"`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// The kind of library item an input file is normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Video,
    Audio,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Container family recognized by extension, used for skip-decision and
/// output-path logic. Anything else is `Other`, which always needs conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp4,
    Mkv,
    Mp3,
    Flac,
    Wav,
    Avi,
    Mov,
    Other,
}

impl Container {
    /// Classify a container from a file extension (case-insensitive, no dot).
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" | "m4v" => Container::Mp4,
            "mkv" => Container::Mkv,
            "mp3" => Container::Mp3,
            "flac" => Container::Flac,
            "wav" | "wave" => Container::Wav,
            "avi" => Container::Avi,
            "mov" => Container::Mov,
            _ => Container::Other,
        }
    }

    /// Classify a container from a file path's extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Container::from_extension)
            .unwrap_or(Container::Other)
    }

    /// Whether this container holds audio-only content per the engine's
    /// media-type model (FLAC/WAV/MP3 are audio; everything else is video).
    #[must_use]
    pub fn is_audio_container(self) -> bool {
        matches!(self, Container::Mp3 | Container::Flac | Container::Wav)
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mp4 => write!(f, "mp4"),
            Self::Mkv => write!(f, "mkv"),
            Self::Mp3 => write!(f, "mp3"),
            Self::Flac => write!(f, "flac"),
            Self::Wav => write!(f, "wav"),
            Self::Avi => write!(f, "avi"),
            Self::Mov => write!(f, "mov"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// HDR classification produced by the HDR Detector (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum HdrKind {
    None,
    Hdr10,
    Hlg,
    DolbyVision,
    Bt2020Generic,
}

impl HdrKind {
    /// Human-readable label matching the cache JSON's `hdr_type` values.
    #[must_use]
    pub fn cache_label(self) -> Option<&'static str> {
        match self {
            HdrKind::None => None,
            HdrKind::Hdr10 => Some("HDR10"),
            HdrKind::Hlg => Some("HLG"),
            HdrKind::DolbyVision => Some("DolbyVision"),
            HdrKind::Bt2020Generic => Some("HDR (BT.2020)"),
        }
    }
}

impl fmt::Display for HdrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cache_label() {
            Some(label) => write!(f, "{label}"),
            None => write!(f, "SDR"),
        }
    }
}

/// Derived, non-persistent HDR classification of one video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdrInfo {
    pub is_hdr: bool,
    pub kind: HdrKind,
    pub bit_depth: u8,
}

impl HdrInfo {
    /// The non-HDR, 8-bit default.
    #[must_use]
    pub fn sdr(bit_depth: u8) -> Self {
        Self {
            is_hdr: false,
            kind: HdrKind::None,
            bit_depth,
        }
    }
}

/// Decision-engine action tag stored in the cache for diagnostics and reuse
/// (§4.5.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTag {
    Skip,
    NeedsConversion,
    NeedsAudio,
    NeedsVideo,
    NeedsHdrTonemap,
    Replaced,
    Pending,
    Unknown,
}

impl fmt::Display for ActionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::NeedsConversion => write!(f, "needs_conversion"),
            Self::NeedsAudio => write!(f, "needs_audio"),
            Self::NeedsVideo => write!(f, "needs_video"),
            Self::NeedsHdrTonemap => write!(f, "needs_hdr_tonemap"),
            Self::Replaced => write!(f, "replaced"),
            Self::Pending => write!(f, "pending"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl Default for ActionTag {
    fn default() -> Self {
        ActionTag::Unknown
    }
}

/// Library kind inferred from a path segment, used by the Indexer Notifier
/// to group the batch (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    Tv,
    Movies,
    Music,
}

impl LibraryKind {
    /// Infer the library kind from a path by looking for a `/tv/`, `/movies/`
    /// or `/music/` segment (first match wins, left to right).
    #[must_use]
    pub fn infer_from_path(path: &Path) -> Option<Self> {
        let s = path.to_string_lossy().to_ascii_lowercase();
        for seg in s.split(std::path::MAIN_SEPARATOR) {
            match seg {
                "tv" => return Some(LibraryKind::Tv),
                "movies" => return Some(LibraryKind::Movies),
                "music" => return Some(LibraryKind::Music),
                _ => {}
            }
        }
        None
    }
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tv => write!(f, "tv"),
            Self::Movies => write!(f, "movies"),
            Self::Music => write!(f, "music"),
        }
    }
}

/// Media-type filter accepted on the CLI (`--type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaTypeFilter {
    Video,
    Audio,
    #[default]
    Both,
}

impl MediaTypeFilter {
    /// Whether a container of the given kind passes this filter.
    #[must_use]
    pub fn accepts(self, container: Container) -> bool {
        match self {
            MediaTypeFilter::Both => true,
            MediaTypeFilter::Video => !container.is_audio_container(),
            MediaTypeFilter::Audio => container.is_audio_container(),
        }
    }
}
