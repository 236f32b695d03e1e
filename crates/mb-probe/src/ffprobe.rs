//! The Probe Adapter (§4.1): shells out to an `ffprobe`-compatible binary
//! and decodes its JSON into a [`MediaProbe`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use mb_core::{Error, Result};
use serde::Deserialize;
use tokio::process::Command;

use crate::types::{Format, MediaProbe, Stream};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Invokes the external inspector binary on one file at a time. Operation
/// is synchronous in effect (one call, one result) even though it awaits a
/// child process.
#[derive(Debug, Clone)]
pub struct ProbeAdapter {
    tool: PathBuf,
    timeout: Duration,
}

impl Default for ProbeAdapter {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl ProbeAdapter {
    /// Build an adapter that invokes `tool` (looked up on `PATH` unless
    /// absolute) with the default 30-second timeout.
    #[must_use]
    pub fn new(tool: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the probe timeout (tests use this to exercise the timeout path).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Probe `path`, returning the decoded [`MediaProbe`].
    pub async fn probe(&self, path: &Path) -> Result<MediaProbe> {
        if which::which(&self.tool).is_err() && !self.tool.is_absolute() {
            return Err(Error::probe_tool_missing(self.tool.to_string_lossy()));
        }

        let mut cmd = Command::new(&self.tool);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        let child = cmd.spawn().map_err(|_| Error::probe_tool_missing(self.tool.to_string_lossy()))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(Error::Other(format!("failed to run probe tool: {e}"))),
            Err(_) => {
                return Err(Error::ProbeTimeout {
                    path: path.to_path_buf(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        };

        if !output.status.success() {
            return Err(Error::probe_nonzero_exit(
                path,
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }

        let raw: RawProbe = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::malformed_json(path, e.to_string()))?;

        raw.into_media_probe()
            .map_err(|message| Error::malformed_json(path, message))
    }
}

#[derive(Debug, Deserialize)]
struct RawProbe {
    format: RawFormat,
    #[serde(default)]
    streams: Vec<RawStream>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    #[serde(default)]
    format_name: String,
    duration: Option<String>,
    bit_rate: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStream {
    index: u32,
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    color_transfer: Option<String>,
    color_primaries: Option<String>,
    color_space: Option<String>,
    channels: Option<u32>,
    channel_layout: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    disposition: Option<RawDisposition>,
    #[serde(default)]
    side_data_list: Vec<RawSideData>,
}

#[derive(Debug, Deserialize)]
struct RawDisposition {
    #[serde(default)]
    forced: u32,
}

#[derive(Debug, Deserialize)]
struct RawSideData {
    side_data_type: Option<String>,
}

impl RawProbe {
    fn into_media_probe(self) -> std::result::Result<MediaProbe, String> {
        let format = Format {
            container_name: self.format.format_name,
            duration_secs: self.format.duration.and_then(|d| d.parse().ok()),
            bit_rate: self.format.bit_rate.and_then(|b| b.parse().ok()),
            size_bytes: self.format.size.and_then(|s| s.parse().ok()),
        };

        let mut streams = Vec::with_capacity(self.streams.len());
        for raw in self.streams {
            let Some(stream) = raw.into_stream() else {
                continue;
            };
            streams.push(stream);
        }

        Ok(MediaProbe { format, streams })
    }
}

impl RawStream {
    fn into_stream(self) -> Option<Stream> {
        match self.codec_type.as_str() {
            "video" => Some(Stream::Video {
                index: self.index,
                codec: self.codec_name.unwrap_or_default(),
                width: self.width.unwrap_or(0),
                height: self.height.unwrap_or(0),
                pixel_format: self.pix_fmt.unwrap_or_default(),
                color_transfer: self.color_transfer,
                color_primaries: self.color_primaries,
                color_space: self.color_space,
                dovi_side_data: self
                    .side_data_list
                    .into_iter()
                    .find_map(|sd| sd.side_data_type.filter(|t| t.contains("DOVI"))),
            }),
            "audio" => Some(Stream::Audio {
                index: self.index,
                codec: self.codec_name.unwrap_or_default(),
                channels: self.channels.unwrap_or(0),
                channel_layout: self.channel_layout.unwrap_or_default(),
                language: self.tags.get("language").cloned().unwrap_or_default(),
                title: self.tags.get("title").cloned(),
            }),
            "subtitle" => Some(Stream::Subtitle {
                index: self.index,
                codec: self.codec_name.unwrap_or_default(),
                language: self.tags.get("language").cloned().unwrap_or_default(),
                forced: self.disposition.map(|d| d.forced != 0).unwrap_or(false),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn missing_tool_surfaces_probe_tool_missing() {
        let adapter = ProbeAdapter::new("definitely-not-a-real-probe-binary");
        let err = adapter.probe(Path::new("/tmp/whatever.mkv")).await.unwrap_err();
        assert!(matches!(err, Error::ProbeToolMissing { .. }));
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_probe_nonzero_exit() {
        // `false` always exits 1 and exists on every POSIX system.
        let adapter = ProbeAdapter::new("false");
        let err = adapter.probe(Path::new("/tmp/whatever.mkv")).await.unwrap_err();
        assert!(matches!(err, Error::ProbeNonzeroExit { .. }));
    }

    #[tokio::test]
    async fn timeout_fires_for_slow_tool() {
        // `yes` treats every argument as text to repeat forever, so it
        // never exits on its own regardless of the flags we pass it.
        let adapter = ProbeAdapter::new("yes").with_timeout(StdDuration::from_millis(50));
        let err = adapter.probe(Path::new("/tmp/whatever.mkv")).await.unwrap_err();
        assert!(matches!(err, Error::ProbeTimeout { .. }));
    }

    #[test]
    fn raw_probe_converts_video_and_audio_streams() {
        let json = r#"{
            "format": {"format_name": "mov,mp4,m4a", "duration": "120.5", "bit_rate": "4000000", "size": "60000000"},
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "pix_fmt": "yuv420p"},
                {"index": 1, "codec_type": "audio", "codec_name": "aac", "channels": 2, "channel_layout": "stereo", "tags": {"language": "eng"}}
            ]
        }"#;
        let raw: RawProbe = serde_json::from_str(json).unwrap();
        let probe = raw.into_media_probe().unwrap();
        assert_eq!(probe.format.duration_secs, Some(120.5));
        assert_eq!(probe.video_streams().len(), 1);
        assert_eq!(probe.audio_streams()[0].language, "eng");
    }

    #[test]
    fn dovi_side_data_is_detected() {
        let json = r#"{
            "format": {"format_name": "matroska"},
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "hevc", "width": 3840, "height": 2160,
                 "pix_fmt": "yuv420p10le", "color_transfer": "smpte2084",
                 "side_data_list": [{"side_data_type": "DOVI configuration record"}]}
            ]
        }"#;
        let raw: RawProbe = serde_json::from_str(json).unwrap();
        let probe = raw.into_media_probe().unwrap();
        let video = probe.primary_video().unwrap();
        assert_eq!(video.dovi_side_data.as_deref(), Some("DOVI configuration record"));
    }
}
