//! The Decision Engine (§4.5): `MediaProbe` + flags -> `TranscodePlan`.

use std::path::{Path, PathBuf};

use mb_core::{ActionTag, Container, HdrInfo, OutputKind, Result};
use mb_probe::hdr;
use mb_probe::types::{AudioStreamRef, MediaProbe};

use crate::capability::EncoderCapability;
use crate::filename;
use crate::plan::{
    AudioReencode, AudioSource, DerivedKind, DerivedTrack, EncoderChoice, ExtractedPgs,
    PreservedAudio, SelectedSurround, SubtitleMapping, TranscodePlan, VideoAction,
};
use crate::titles;

/// Caller-controlled flags (§6 CLI surface: `--force-stereo`,
/// `--downgrade-resolution`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionFlags {
    pub force_stereo: bool,
    pub downgrade_resolution: bool,
}

const TEXT_SUBTITLE_CODECS: &[&str] = &["subrip", "srt", "ass", "ssa", "mov_text"];

fn is_text_subtitle(codec: &str) -> bool {
    TEXT_SUBTITLE_CODECS.iter().any(|c| codec.eq_ignore_ascii_case(c))
}

fn is_pgs_subtitle(codec: &str) -> bool {
    codec.to_ascii_lowercase().contains("pgs")
}

fn is_english_or_unlabeled(language: &str) -> bool {
    matches!(language, "eng" | "und" | "")
}

/// Entry point: dispatch to the video or audio decision path based on the
/// input's container.
pub fn decide(
    input_path: &Path,
    container: Container,
    probe: &MediaProbe,
    flags: DecisionFlags,
    capability: EncoderCapability,
) -> Result<TranscodePlan> {
    if container.is_audio_container() {
        Ok(decide_audio(input_path, container, probe))
    } else {
        decide_video(input_path, container, probe, flags, capability)
    }
}

/// §4.5.2: audio-only skip/re-encode decision.
pub fn decide_audio(input_path: &Path, container: Container, probe: &MediaProbe) -> TranscodePlan {
    let primary = probe.audio_streams().into_iter().next();
    let already_mp3 =
        container == Container::Mp3 && primary.map(|a| a.codec.eq_ignore_ascii_case("mp3")).unwrap_or(false);

    let (skip, action_tag, audio_reencode) = if already_mp3 {
        (true, ActionTag::Skip, None)
    } else {
        (
            false,
            ActionTag::NeedsConversion,
            Some(AudioReencode {
                codec: "libmp3lame".to_string(),
                bitrate_kbps: 320,
                copy_format_metadata: true,
            }),
        )
    };

    TranscodePlan {
        input_path: input_path.to_path_buf(),
        output_kind: OutputKind::Audio,
        skip,
        skip_reason: if skip {
            Some("already mp3".to_string())
        } else {
            None
        },
        video_action: VideoAction::None,
        selected_surround: None,
        derived_tracks: Vec::new(),
        preserved_audio: None,
        subtitle_map: Vec::new(),
        extracted_pgs: Vec::new(),
        audio_reencode,
        output_path_transform: None,
        action_tag,
    }
}

/// §4.5.1–§4.5.8: the video decision path.
pub fn decide_video(
    input_path: &Path,
    container: Container,
    probe: &MediaProbe,
    flags: DecisionFlags,
    capability: EncoderCapability,
) -> Result<TranscodePlan> {
    let audio_streams = probe.audio_streams();

    if !audio_streams.is_empty()
        && !audio_streams
            .iter()
            .any(|a| is_english_or_unlabeled(a.language))
    {
        // §7: no-English-audio is "log and skip", not a hard failure — the
        // cache still needs to remember this file was looked at and why.
        return Ok(TranscodePlan {
            input_path: input_path.to_path_buf(),
            output_kind: OutputKind::Video,
            skip: true,
            skip_reason: Some("no English audio".to_string()),
            video_action: VideoAction::None,
            selected_surround: None,
            derived_tracks: Vec::new(),
            preserved_audio: None,
            subtitle_map: Vec::new(),
            extracted_pgs: Vec::new(),
            audio_reencode: None,
            output_path_transform: None,
            action_tag: ActionTag::Skip,
        });
    }

    let video = probe.primary_video();
    let hdr_info = video.map(|v| hdr::detect(&v)).unwrap_or(HdrInfo::sdr(8));

    // --- surround selection (§4.5.3) ---
    let surround_candidates: Vec<AudioStreamRef<'_>> = audio_streams
        .iter()
        .copied()
        .filter(|a| a.channels >= 6)
        .collect();
    let selected_source = pick_surround(&surround_candidates);

    let needs_channelmap_fix = selected_source
        .map(|s| {
            s.channels == 6
                && (s.channel_layout.is_empty() || s.channel_layout.eq_ignore_ascii_case("unknown"))
        })
        .unwrap_or(false);

    let selected_surround = selected_source.map(|s| SelectedSurround {
        input_index: s.index,
        channels: s.channels,
        needs_channelmap_fix,
        channel_layout: if s.channel_layout.is_empty() || s.channel_layout.eq_ignore_ascii_case("unknown") {
            None
        } else {
            Some(s.channel_layout.to_string())
        },
        language: "eng".to_string(),
    });

    let has_existing_51 = audio_streams.iter().any(|a| a.channels == 6);
    let needs_51_from_71 = selected_source
        .map(|s| s.channels == 8 && !has_existing_51)
        .unwrap_or(false);

    let has_enhanced_stereo = audio_streams
        .iter()
        .any(|a| a.channels == 2 && titles::has_enhanced_stereo_signature(a.title));
    let needs_dialogue_stereo =
        selected_source.is_some() && (!has_enhanced_stereo || flags.force_stereo);

    // --- derived tracks, in the order the spec's invariant demands ---
    let mut derived_tracks = Vec::new();
    if needs_51_from_71 {
        derived_tracks.push(DerivedTrack {
            source: AudioSource::Input(selected_source.unwrap().index),
            kind: DerivedKind::Downmix51From71,
            title: titles::DERIVED_51_TITLE.to_string(),
            language: "eng".to_string(),
        });
    }
    if needs_dialogue_stereo {
        let source = if needs_51_from_71 {
            AudioSource::Derived51
        } else if needs_channelmap_fix {
            AudioSource::FixedChannelmap
        } else {
            AudioSource::Input(selected_source.unwrap().index)
        };
        derived_tracks.push(DerivedTrack {
            source,
            kind: DerivedKind::DialogueStereoFromSurround,
            title: titles::dialogue_stereo_title(flags.force_stereo).to_string(),
            language: "eng".to_string(),
        });
    }

    // --- preserved audio: an existing non-surround, acceptable-language stream ---
    let preserved_source = audio_streams
        .iter()
        .find(|a| a.channels < 6 && is_english_or_unlabeled(a.language))
        .copied();
    let preserved_audio = preserved_source.map(|a| PreservedAudio {
        input_index: a.index,
        title: titles::PRESERVED_STEREO_TITLE.to_string(),
        can_copy: a.codec.eq_ignore_ascii_case("aac"),
        channel_layout: if a.channel_layout.is_empty() {
            None
        } else {
            Some(a.channel_layout.to_string())
        },
        language: "eng".to_string(),
    });

    // --- non-English audio removal: any stream that isn't eng/und/empty
    // and isn't the selected surround is simply dropped by never being
    // mapped, which is what "removed" means here.
    let has_non_english_audio = audio_streams
        .iter()
        .any(|a| !is_english_or_unlabeled(a.language));

    let needs_metadata_fix = audio_streams.iter().any(|a| a.language != "eng");

    // --- subtitles (§4.5.6) ---
    let mut subtitle_map = Vec::new();
    let mut extracted_pgs = Vec::new();
    for s in probe.subtitle_streams() {
        if is_pgs_subtitle(s.codec) {
            let lang = if s.language.is_empty() { "und" } else { s.language };
            let suffix = if s.forced {
                format!(".forced.{lang}.sup")
            } else {
                format!(".{lang}.sup")
            };
            extracted_pgs.push(ExtractedPgs {
                input_index: s.index,
                output_suffix: suffix,
            });
        } else if is_text_subtitle(s.codec) && (s.language == "eng" || s.forced) {
            subtitle_map.push(SubtitleMapping {
                input_index: s.index,
                output_codec: "mov_text".to_string(),
                language: "eng".to_string(),
            });
        }
    }
    let has_pgs = !extracted_pgs.is_empty();

    // --- resolution & HDR (§4.5.7) ---
    let (height, width) = video.map(|v| (v.height, v.width)).unwrap_or((0, 0));
    let needs_resolution_downgrade = flags.downgrade_resolution && (height > 1080 || width > 1920);

    let scale_filter = if flags.downgrade_resolution && height > 1080 {
        Some("scale=-2:1080".to_string())
    } else if flags.downgrade_resolution && width > 1920 {
        Some("scale=1920:-2".to_string())
    } else {
        None
    };

    let video_filter = build_video_filter(hdr_info, needs_channelmap_fix, &scale_filter);

    // --- video codec / container compliance ---
    let video_is_h264 = video.map(|v| v.codec.eq_ignore_ascii_case("h264")).unwrap_or(true);
    let video_needs_reencode = !video_is_h264 || hdr_info.is_hdr || scale_filter.is_some();

    let all_audio_aac = audio_streams.iter().all(|a| a.codec.eq_ignore_ascii_case("aac"));
    let container_ok = matches!(container, Container::Mp4 | Container::Mkv);

    // --- skip decision (§4.5.1) ---
    let skip = video_is_h264
        && all_audio_aac
        && container_ok
        && !needs_dialogue_stereo
        && !needs_51_from_71
        && !needs_metadata_fix
        && !has_non_english_audio
        && !needs_resolution_downgrade
        && !flags.force_stereo
        && !has_pgs
        && video_filter.is_none();

    let video_action = if video.is_none() {
        VideoAction::None
    } else if video_needs_reencode {
        VideoAction::Reencode {
            encoder: choose_encoder(hdr_info, capability),
            video_filter: video_filter.clone(),
        }
    } else {
        VideoAction::Copy
    };

    let action_tag = if skip {
        ActionTag::Skip
    } else if hdr_info.is_hdr {
        ActionTag::NeedsHdrTonemap
    } else if video_needs_reencode {
        ActionTag::NeedsVideo
    } else if needs_dialogue_stereo || needs_51_from_71 || needs_metadata_fix || has_non_english_audio {
        ActionTag::NeedsAudio
    } else {
        ActionTag::NeedsConversion
    };

    let output_path_transform = if skip {
        None
    } else {
        filename::apply_to_path(input_path, needs_resolution_downgrade)
    };

    let skip_reason = if skip {
        Some("already compliant".to_string())
    } else {
        None
    };

    Ok(TranscodePlan {
        input_path: input_path.to_path_buf(),
        output_kind: OutputKind::Video,
        skip,
        skip_reason,
        video_action,
        selected_surround,
        derived_tracks,
        preserved_audio,
        subtitle_map,
        extracted_pgs,
        audio_reencode: None,
        output_path_transform,
        action_tag,
    })
}

/// §4.5.3 preference order: first `eng`-tagged candidate, else first
/// empty/absent-language candidate, else none. Non-English surround is
/// never selected.
fn pick_surround<'a>(candidates: &'a [AudioStreamRef<'a>]) -> Option<AudioStreamRef<'a>> {
    candidates
        .iter()
        .find(|c| c.language == "eng")
        .or_else(|| candidates.iter().find(|c| c.language.is_empty()))
        .copied()
}

/// Assemble the full `-vf` chain: channelmap fix (audio-side, not actually
/// part of `-vf`, kept out of this function), HDR tone-map, then scale.
/// Returns `None` when neither HDR nor a resolution change applies.
fn build_video_filter(
    hdr_info: HdrInfo,
    _needs_channelmap_fix: bool,
    scale_filter: &Option<String>,
) -> Option<String> {
    if !hdr_info.is_hdr && scale_filter.is_none() {
        return None;
    }

    let mut parts = Vec::new();
    if hdr_info.is_hdr {
        parts.push("zscale=t=linear:npl=100".to_string());
        parts.push("format=gbrpf32le".to_string());
        parts.push("zscale=p=bt709".to_string());
        parts.push("tonemap=tonemap=hable:desat=0".to_string());
        parts.push("zscale=t=bt709:m=bt709:r=tv".to_string());
        parts.push("format=yuv420p".to_string());
    }
    if let Some(scale) = scale_filter {
        parts.push(scale.clone());
    }
    Some(parts.join(","))
}

/// §4.5.8: HDR sources are forced to the software path regardless of
/// hardware availability.
fn choose_encoder(hdr_info: HdrInfo, capability: EncoderCapability) -> EncoderChoice {
    if !hdr_info.is_hdr && capability.hardware_available {
        return EncoderChoice::HardwareVaapi { qp: 23 };
    }
    if capability.software_available {
        EncoderChoice::SoftwareX264 {
            crf: 23,
            preset: "medium".to_string(),
            threads_auto: true,
        }
    } else {
        EncoderChoice::SoftwareX264 {
            crf: 23,
            preset: "fast".to_string(),
            threads_auto: false,
        }
    }
}

/// Resolve the final output path implied by `plan.output_path_transform`,
/// relative to the input's own directory and preserving its extension
/// unless the output kind changes it (handled by the caller for audio).
#[must_use]
pub fn resolved_output_path(plan: &TranscodePlan) -> PathBuf {
    match &plan.output_path_transform {
        Some(new_name) => plan
            .input_path
            .parent()
            .map(|p| p.join(new_name))
            .unwrap_or_else(|| new_name.clone()),
        None => plan.input_path.clone(),
    }
}
