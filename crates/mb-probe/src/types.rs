//! The probe result data model (§3: `MediaProbe`).

use serde::{Deserialize, Serialize};

/// Container-level metadata (ffprobe's `format` object, trimmed to what the
/// decision engine and cache actually need).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Format {
    /// Container format name as reported by the probe tool (e.g. `"mov,mp4,m4a..."`).
    pub container_name: String,
    /// Total duration in seconds, if determinable.
    pub duration_secs: Option<f64>,
    /// Total bitrate in bits per second, if determinable.
    pub bit_rate: Option<u64>,
    /// File size in bytes.
    pub size_bytes: Option<u64>,
}

/// One stream in a probed file. Indices are unique across all streams in a
/// `MediaProbe` and are the identifiers the filter-graph builder maps from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Stream {
    Video {
        index: u32,
        codec: String,
        width: u32,
        height: u32,
        pixel_format: String,
        color_transfer: Option<String>,
        color_primaries: Option<String>,
        color_space: Option<String>,
        /// Name of a DOVI side-data entry when present (e.g.
        /// `"DOVI configuration record"`). `None` when no DOVI marker exists.
        dovi_side_data: Option<String>,
    },
    Audio {
        index: u32,
        codec: String,
        channels: u32,
        /// Normalized channel layout name (e.g. `"5.1"`, `"7.1(wide)"`).
        /// Empty string means "unknown", matching the probe tool's own output.
        channel_layout: String,
        /// ISO 639-2 language tag, or empty when unset.
        language: String,
        title: Option<String>,
    },
    Subtitle {
        index: u32,
        codec: String,
        language: String,
        forced: bool,
    },
}

impl Stream {
    /// The stream index, regardless of kind.
    #[must_use]
    pub fn index(&self) -> u32 {
        match self {
            Stream::Video { index, .. } => *index,
            Stream::Audio { index, .. } => *index,
            Stream::Subtitle { index, .. } => *index,
        }
    }

    #[must_use]
    pub fn as_video(&self) -> Option<VideoStreamRef<'_>> {
        match self {
            Stream::Video {
                index,
                codec,
                width,
                height,
                pixel_format,
                color_transfer,
                color_primaries,
                color_space,
                dovi_side_data,
            } => Some(VideoStreamRef {
                index: *index,
                codec,
                width: *width,
                height: *height,
                pixel_format,
                color_transfer,
                color_primaries,
                color_space,
                dovi_side_data,
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_audio(&self) -> Option<AudioStreamRef<'_>> {
        match self {
            Stream::Audio {
                index,
                codec,
                channels,
                channel_layout,
                language,
                title,
            } => Some(AudioStreamRef {
                index: *index,
                codec,
                channels: *channels,
                channel_layout,
                language,
                title: title.as_deref(),
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_subtitle(&self) -> Option<SubtitleStreamRef<'_>> {
        match self {
            Stream::Subtitle {
                index,
                codec,
                language,
                forced,
            } => Some(SubtitleStreamRef {
                index: *index,
                codec,
                language,
                forced: *forced,
            }),
            _ => None,
        }
    }
}

/// Borrowed view of a [`Stream::Video`], to avoid re-matching at call sites.
#[derive(Debug, Clone, Copy)]
pub struct VideoStreamRef<'a> {
    pub index: u32,
    pub codec: &'a str,
    pub width: u32,
    pub height: u32,
    pub pixel_format: &'a str,
    pub color_transfer: &'a Option<String>,
    pub color_primaries: &'a Option<String>,
    pub color_space: &'a Option<String>,
    pub dovi_side_data: &'a Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct AudioStreamRef<'a> {
    pub index: u32,
    pub codec: &'a str,
    pub channels: u32,
    pub channel_layout: &'a str,
    pub language: &'a str,
    pub title: Option<&'a str>,
}

#[derive(Debug, Clone, Copy)]
pub struct SubtitleStreamRef<'a> {
    pub index: u32,
    pub codec: &'a str,
    pub language: &'a str,
    pub forced: bool,
}

/// Decoded result of inspecting one media file (§3: `MediaProbe`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    pub format: Format,
    /// Ordered as reported by the probe tool; relative order within a kind
    /// is preserved because it matters for selection tie-breaks.
    pub streams: Vec<Stream>,
}

impl MediaProbe {
    #[must_use]
    pub fn video_streams(&self) -> Vec<VideoStreamRef<'_>> {
        self.streams.iter().filter_map(Stream::as_video).collect()
    }

    #[must_use]
    pub fn audio_streams(&self) -> Vec<AudioStreamRef<'_>> {
        self.streams.iter().filter_map(Stream::as_audio).collect()
    }

    #[must_use]
    pub fn subtitle_streams(&self) -> Vec<SubtitleStreamRef<'_>> {
        self.streams
            .iter()
            .filter_map(Stream::as_subtitle)
            .collect()
    }

    /// The first video stream, if any. Multi-video-track inputs are rare;
    /// the decision engine only ever acts on this one.
    #[must_use]
    pub fn primary_video(&self) -> Option<VideoStreamRef<'_>> {
        self.video_streams().into_iter().next()
    }
}
