//! The HDR Detector (§4.4): a pure function over already-probed video
//! stream fields. No bitstream parsing — the probe tool already did that.

use mb_core::{HdrInfo, HdrKind};

use crate::types::VideoStreamRef;

/// Classify a probed video stream's HDR signaling.
#[must_use]
pub fn detect(video: &VideoStreamRef<'_>) -> HdrInfo {
    let bit_depth = bit_depth_from_pixel_format(video.pixel_format);

    if video.dovi_side_data.is_some() {
        return HdrInfo {
            is_hdr: true,
            kind: HdrKind::DolbyVision,
            bit_depth,
        };
    }

    match video.color_transfer.as_deref() {
        Some("smpte2084") => {
            return HdrInfo {
                is_hdr: true,
                kind: HdrKind::Hdr10,
                bit_depth,
            }
        }
        Some("arib-std-b67") => {
            return HdrInfo {
                is_hdr: true,
                kind: HdrKind::Hlg,
                bit_depth,
            }
        }
        _ => {}
    }

    let primaries_bt2020 = video
        .color_primaries
        .as_deref()
        .map(|p| p.contains("bt2020"))
        .unwrap_or(false);

    if primaries_bt2020 && bit_depth > 8 {
        return HdrInfo {
            is_hdr: true,
            kind: HdrKind::Bt2020Generic,
            bit_depth,
        };
    }

    HdrInfo::sdr(bit_depth)
}

/// Infer bit depth from an ffprobe pixel format string. Defaults to 8 when
/// no 10/12-bit marker is present.
#[must_use]
pub fn bit_depth_from_pixel_format(pixel_format: &str) -> u8 {
    if pixel_format.ends_with("10le") || pixel_format.contains("p10") {
        10
    } else if pixel_format.ends_with("12le") || pixel_format.contains("p12") {
        12
    } else {
        8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stream;

    fn video(
        transfer: Option<&str>,
        primaries: Option<&str>,
        pixel_format: &str,
        dovi: Option<&str>,
    ) -> Stream {
        Stream::Video {
            index: 0,
            codec: "hevc".into(),
            width: 3840,
            height: 2160,
            pixel_format: pixel_format.into(),
            color_transfer: transfer.map(str::to_string),
            color_primaries: primaries.map(str::to_string),
            color_space: None,
            dovi_side_data: dovi.map(str::to_string),
        }
    }

    #[test]
    fn smpte2084_is_hdr10_regardless_of_primaries() {
        let s = video(Some("smpte2084"), Some("bt709"), "yuv420p10le", None);
        let info = detect(&s.as_video().unwrap());
        assert!(info.is_hdr);
        assert_eq!(info.kind, mb_core::HdrKind::Hdr10);
    }

    #[test]
    fn arib_std_b67_is_hlg() {
        let s = video(Some("arib-std-b67"), Some("bt2020"), "yuv420p10le", None);
        let info = detect(&s.as_video().unwrap());
        assert_eq!(info.kind, mb_core::HdrKind::Hlg);
    }

    #[test]
    fn dovi_overrides_smpte2084() {
        let s = video(
            Some("smpte2084"),
            Some("bt2020"),
            "yuv420p10le",
            Some("DOVI configuration record"),
        );
        let info = detect(&s.as_video().unwrap());
        assert_eq!(info.kind, mb_core::HdrKind::DolbyVision);
    }

    #[test]
    fn bt2020_primaries_with_high_bit_depth_and_no_transfer_is_generic_hdr() {
        let s = video(None, Some("bt2020"), "yuv420p10le", None);
        let info = detect(&s.as_video().unwrap());
        assert_eq!(info.kind, mb_core::HdrKind::Bt2020Generic);
    }

    #[test]
    fn bt2020_primaries_at_8_bit_is_not_hdr() {
        let s = video(None, Some("bt2020"), "yuv420p", None);
        let info = detect(&s.as_video().unwrap());
        assert!(!info.is_hdr);
    }

    #[test]
    fn plain_sdr_source_is_not_hdr() {
        let s = video(Some("bt709"), Some("bt709"), "yuv420p", None);
        let info = detect(&s.as_video().unwrap());
        assert!(!info.is_hdr);
        assert_eq!(info.bit_depth, 8);
    }

    #[test]
    fn bit_depth_inference() {
        assert_eq!(bit_depth_from_pixel_format("yuv420p10le"), 10);
        assert_eq!(bit_depth_from_pixel_format("yuv420p12le"), 12);
        assert_eq!(bit_depth_from_pixel_format("yuv420p"), 8);
    }
}
