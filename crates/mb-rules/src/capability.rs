//! Encoder capability probe (§4.5.8).
//!
//! Run once per process: a tiny round-trip encode against a synthetic test
//! pattern decides whether the VAAPI hardware path and/or `libx264` are
//! actually usable on this host, rather than trusting that a device node
//! existing means the driver stack works end to end.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

/// Default VAAPI render node checked for hardware encode capability.
pub const DEFAULT_VAAPI_DEVICE: &str = "/dev/dri/renderD128";

/// Result of the one-time capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderCapability {
    pub hardware_available: bool,
    pub software_available: bool,
}

impl EncoderCapability {
    /// Conservative fallback assumed when the probe itself can't run (e.g.
    /// the encoder tool isn't even on `PATH` yet) — software libx264 is
    /// assumed present; hardware is assumed absent.
    #[must_use]
    pub fn assume_software_only() -> Self {
        Self {
            hardware_available: false,
            software_available: true,
        }
    }
}

/// Probe `ffmpeg_tool` for hardware (VAAPI at `vaapi_device`) and software
/// (`libx264`) encode capability via a one-frame test encode of a
/// synthetic color pattern.
#[must_use]
pub fn detect(ffmpeg_tool: &Path, vaapi_device: &Path) -> EncoderCapability {
    let hardware_available = vaapi_device.exists() && probe_vaapi(ffmpeg_tool, vaapi_device);
    let software_available = probe_libx264(ffmpeg_tool);

    EncoderCapability {
        hardware_available,
        software_available,
    }
}

/// Convenience wrapper using the default render node.
#[must_use]
pub fn detect_default(ffmpeg_tool: &Path) -> EncoderCapability {
    detect(ffmpeg_tool, Path::new(DEFAULT_VAAPI_DEVICE))
}

fn probe_vaapi(ffmpeg_tool: &Path, vaapi_device: &Path) -> bool {
    run_test_encode(
        ffmpeg_tool,
        &[
            "-init_hw_device".to_string(),
            format!("vaapi=va:{}", vaapi_device.display()),
            "-filter_hw_device".to_string(),
            "va".to_string(),
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            "color=c=black:s=64x64:d=0.1".to_string(),
            "-vf".to_string(),
            "format=nv12,hwupload".to_string(),
            "-c:v".to_string(),
            "h264_vaapi".to_string(),
        ],
    )
}

fn probe_libx264(ffmpeg_tool: &Path) -> bool {
    run_test_encode(
        ffmpeg_tool,
        &[
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            "color=c=black:s=64x64:d=0.1".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
        ],
    )
}

fn run_test_encode(tool: &Path, encode_args: &[String]) -> bool {
    let mut cmd = Command::new(tool);
    cmd.arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .arg("-y")
        .args(encode_args)
        .args(["-frames:v", "1", "-f", "null", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    run_with_timeout(cmd, Duration::from_secs(10))
}

/// Spawn `cmd`, waiting up to `timeout` for it to exit successfully. A
/// timeout, spawn failure, or non-zero exit all count as "not available" —
/// the probe only needs a clean yes/no, not error detail.
fn run_with_timeout(mut cmd: Command, timeout: Duration) -> bool {
    let Ok(mut child) = cmd.spawn() else {
        return false;
    };

    let start = std::time::Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status.success(),
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return false;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(_) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_reports_nothing_available() {
        let cap = detect(
            Path::new("definitely-not-a-real-ffmpeg-binary"),
            Path::new("/dev/dri/renderD128"),
        );
        assert!(!cap.hardware_available);
        assert!(!cap.software_available);
    }

    #[test]
    fn missing_vaapi_device_short_circuits_without_spawning() {
        let cap = detect(
            Path::new("false"),
            Path::new("/dev/definitely-not-a-real-device"),
        );
        assert!(!cap.hardware_available);
    }

    #[test]
    fn assume_software_only_fallback() {
        let cap = EncoderCapability::assume_software_only();
        assert!(cap.software_available);
        assert!(!cap.hardware_available);
    }
}
