//! The cache entry schema (§6: cache file format).

use mb_core::{ActionTag, Fingerprint, HdrInfo};
use mb_probe::MediaProbe;
use serde::{Deserialize, Serialize};

/// Semantic version of the decision/builder code. A cache entry whose
/// `processing_version` doesn't match this is treated as stale and
/// re-derived rather than trusted (§4.2, §9: changing the enhanced-stereo
/// signature string is exactly the kind of change that bumps this).
pub const PROCESSING_VERSION: &str = "1.0.0";

/// One cached probe summary plus decision history, keyed by fingerprint
/// hash in the directory's `.mediabox_cache.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub file_name: String,
    pub file_size: u64,
    pub file_mtime: f64,

    pub codec_video: Option<String>,
    pub codec_audio: Option<String>,

    pub resolution: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,

    pub duration: Option<f64>,
    pub bitrate: Option<u64>,

    pub is_hdr: bool,
    pub hdr_type: Option<String>,
    pub color_transfer: Option<String>,
    pub color_primaries: Option<String>,
    pub color_space: Option<String>,
    pub bit_depth: Option<u8>,

    pub audio_channels: Option<String>,
    pub audio_layout: Option<String>,
    pub has_stereo_track: bool,
    pub has_surround_track: bool,

    pub action: String,
    pub processing_version: String,
    pub conversion_count: u32,
    pub last_conversion_duration: Option<f64>,
    pub last_processed: Option<String>,
    pub processing_error: Option<String>,
}

impl CacheEntry {
    /// Build a fresh entry from a fingerprint, probe, and HDR classification
    /// (the Metadata Cache never inspects decision internals beyond the
    /// action tag it is told to record).
    #[must_use]
    pub fn from_probe(fp: &Fingerprint, probe: &MediaProbe, hdr: HdrInfo, action: ActionTag) -> Self {
        let video = probe.primary_video();
        let audio_streams = probe.audio_streams();
        let primary_audio = audio_streams.first();

        let has_stereo_track = audio_streams.iter().any(|a| a.channels == 2);
        let has_surround_track = audio_streams.iter().any(|a| a.channels >= 6);

        Self {
            file_name: fp.file_name.clone(),
            file_size: fp.size_bytes,
            file_mtime: fp.mtime,

            codec_video: video.map(|v| v.codec.to_string()),
            codec_audio: primary_audio.map(|a| a.codec.to_string()),

            resolution: video.map(|v| format!("{}x{}", v.width, v.height)),
            width: video.map(|v| v.width),
            height: video.map(|v| v.height),

            duration: probe.format.duration_secs,
            bitrate: probe.format.bit_rate,

            is_hdr: hdr.is_hdr,
            hdr_type: hdr.kind.cache_label().map(str::to_string),
            color_transfer: video.and_then(|v| v.color_transfer.clone()),
            color_primaries: video.and_then(|v| v.color_primaries.clone()),
            color_space: video.and_then(|v| v.color_space.clone()),
            bit_depth: video.map(|_| hdr.bit_depth),

            audio_channels: primary_audio.map(|a| a.channels.to_string()),
            audio_layout: primary_audio.and_then(|a| {
                if a.channel_layout.is_empty() {
                    None
                } else {
                    Some(a.channel_layout.to_string())
                }
            }),
            has_stereo_track,
            has_surround_track,

            action: action.to_string(),
            processing_version: PROCESSING_VERSION.to_string(),
            conversion_count: 0,
            last_conversion_duration: None,
            last_processed: None,
            processing_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mb_core::HdrKind;
    use mb_probe::{Format, Stream};

    fn probe() -> MediaProbe {
        MediaProbe {
            format: Format {
                container_name: "mov,mp4".into(),
                duration_secs: Some(120.0),
                bit_rate: Some(4_000_000),
                size_bytes: Some(60_000_000),
            },
            streams: vec![
                Stream::Video {
                    index: 0,
                    codec: "h264".into(),
                    width: 1920,
                    height: 1080,
                    pixel_format: "yuv420p".into(),
                    color_transfer: None,
                    color_primaries: None,
                    color_space: None,
                    dovi_side_data: None,
                },
                Stream::Audio {
                    index: 1,
                    codec: "aac".into(),
                    channels: 6,
                    channel_layout: String::new(),
                    language: "eng".into(),
                    title: None,
                },
            ],
        }
    }

    #[test]
    fn from_probe_populates_resolution_and_surround_flag() {
        let fp = Fingerprint::compute("movie.mp4", 60_000_000, 1_700_000_000.0);
        let entry = CacheEntry::from_probe(&fp, &probe(), HdrInfo::sdr(8), ActionTag::Skip);
        assert_eq!(entry.resolution.as_deref(), Some("1920x1080"));
        assert!(entry.has_surround_track);
        assert!(!entry.has_stereo_track);
        assert_eq!(entry.processing_version, PROCESSING_VERSION);
    }

    #[test]
    fn from_probe_records_hdr_label() {
        let fp = Fingerprint::compute("movie.mkv", 1, 0.0);
        let hdr = HdrInfo {
            is_hdr: true,
            kind: HdrKind::Hdr10,
            bit_depth: 10,
        };
        let entry = CacheEntry::from_probe(&fp, &probe(), hdr, ActionTag::NeedsHdrTonemap);
        assert_eq!(entry.hdr_type.as_deref(), Some("HDR10"));
        assert_eq!(entry.action, "needs_hdr_tonemap");
    }
}
