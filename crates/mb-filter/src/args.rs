//! Translates a [`TranscodePlan`] into the concrete ffmpeg argument lists
//! the Transcode Executor spawns (§4.6).
//!
//! A plan with PGS subtitles to extract becomes *two* kinds of command: the
//! main transcode, and one small `-c copy` extraction per PGS stream. PGS
//! can't be muxed into an MP4/MKV the way text subtitles can, so pulling it
//! out as its own `ffmpeg` invocation is simpler than forcing it through the
//! same `-filter_complex` graph as the audio.

use std::path::{Path, PathBuf};

use mb_core::Container;
use mb_rules::plan::AudioOutputStream;
use mb_rules::{EncoderChoice, TranscodePlan, VideoAction};

use crate::graph::build_audio_graph;

/// One ffmpeg invocation to extract a single PGS subtitle stream to a
/// sidecar `.sup` file next to the (possibly renamed) output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgsExtraction {
    pub args: Vec<String>,
    pub sidecar_path: PathBuf,
    /// The suffix (e.g. `.eng.sup`) this sidecar was named with, so a
    /// caller that renames `output_path` after the fact can recompute the
    /// matching final sidecar name with [`sidecar_path_for`].
    pub suffix: String,
}

/// The sidecar path a PGS extraction with `suffix` would get next to
/// `output_path`. Shared between [`build`] (naming the temp-location
/// extraction) and callers that rename the temp file to its final name
/// afterward.
#[must_use]
pub fn sidecar_path_for(output_path: &Path, suffix: &str) -> PathBuf {
    output_path.with_extension(format!(
        "{}{}",
        output_path.extension().and_then(|e| e.to_str()).unwrap_or(""),
        suffix
    ))
}

/// Everything the Transcode Executor needs to run `ffmpeg` for one file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FfmpegPlan {
    /// Full argument list for the main transcode, `-i` onward. Empty when
    /// the plan is a skip.
    pub main_args: Vec<String>,
    pub pgs_extractions: Vec<PgsExtraction>,
}

/// Build the complete ffmpeg invocation(s) for `plan`. `output_path` is the
/// already-resolved final path (see `mb_rules::resolved_output_path`).
#[must_use]
pub fn build(plan: &TranscodePlan, input_path: &Path, output_path: &Path) -> FfmpegPlan {
    if plan.skip {
        return FfmpegPlan::default();
    }

    match plan.output_kind {
        mb_core::OutputKind::Audio => build_audio_only(plan, input_path, output_path),
        mb_core::OutputKind::Video => build_video(plan, input_path, output_path),
    }
}

fn build_audio_only(plan: &TranscodePlan, input_path: &Path, output_path: &Path) -> FfmpegPlan {
    let mut args = vec!["-i".to_string(), input_path.display().to_string()];

    if let Some(reencode) = &plan.audio_reencode {
        args.extend([
            "-c:a".to_string(),
            reencode.codec.clone(),
            "-b:a".to_string(),
            format!("{}k", reencode.bitrate_kbps),
        ]);
        if reencode.copy_format_metadata {
            args.extend(["-map_metadata".to_string(), "0".to_string()]);
        }
    }

    args.extend(["-y".to_string(), output_path.display().to_string()]);

    FfmpegPlan {
        main_args: args,
        pgs_extractions: Vec::new(),
    }
}

/// Normalize a probe-reported channel layout for the `-ch_layout:a:N` flag
/// (§4.6): `5.1(side)` -> `5.1`, `7.1(wide)` -> `7.1`, pass through anything
/// else unchanged.
fn normalize_layout(layout: &str) -> String {
    if let Some(paren) = layout.find('(') {
        layout[..paren].to_string()
    } else {
        layout.to_string()
    }
}

fn build_video(plan: &TranscodePlan, input_path: &Path, output_path: &Path) -> FfmpegPlan {
    let mut args = vec!["-i".to_string(), input_path.display().to_string()];

    let audio_graph = build_audio_graph(plan);
    if let Some(filter_complex) = audio_graph.render() {
        args.extend(["-filter_complex".to_string(), filter_complex]);
    }

    if !matches!(plan.video_action, VideoAction::None) {
        args.extend(["-map".to_string(), "0:v:0".to_string()]);
    }
    append_video_args(&mut args, &plan.video_action);

    let order = plan.output_audio_order();
    for (out_index, stream) in order.iter().enumerate() {
        match stream {
            AudioOutputStream::Surround(surround) => {
                // After a channelmap fix the layout is asserted as 5.1 by
                // the filter graph itself, even though the source reported
                // none; otherwise fall back to whatever the source reported.
                let layout = if surround.needs_channelmap_fix {
                    Some("5.1".to_string())
                } else {
                    surround.channel_layout.as_deref().map(normalize_layout)
                };
                let source = audio_graph
                    .fixed_channelmap_label
                    .clone()
                    .map(|l| format!("[{l}]"))
                    .unwrap_or_else(|| format!("0:{}", surround.input_index));
                match layout {
                    Some(layout) => push_audio_map(
                        &mut args,
                        &source,
                        out_index,
                        "aac",
                        Some("192k"),
                        Some(&layout),
                        &surround.language,
                    ),
                    None => push_audio_map(&mut args, &source, out_index, "copy", None, None, &surround.language),
                }
            }
            AudioOutputStream::Derived(track) if track.kind == mb_rules::DerivedKind::Downmix51From71 => {
                let label = audio_graph.derived_51_label.clone().expect("derived 5.1 label present");
                push_audio_map(
                    &mut args,
                    &format!("[{label}]"),
                    out_index,
                    "aac",
                    Some("192k"),
                    Some("5.1"),
                    &track.language,
                );
            }
            AudioOutputStream::Derived(dialogue) => {
                let label = audio_graph
                    .dialogue_stereo_label
                    .clone()
                    .expect("dialogue stereo label present");
                push_audio_map(&mut args, &format!("[{label}]"), out_index, "aac", None, None, &dialogue.language);
                args.extend([format!("-q:a:{out_index}"), "2".to_string()]);
            }
            AudioOutputStream::Preserved(preserved) => {
                let source = format!("0:{}", preserved.input_index);
                if preserved.can_copy {
                    push_audio_map(&mut args, &source, out_index, "copy", None, None, &preserved.language);
                } else {
                    let layout = preserved.channel_layout.as_deref().map(normalize_layout);
                    push_audio_map(
                        &mut args,
                        &source,
                        out_index,
                        "aac",
                        Some("192k"),
                        layout.as_deref(),
                        &preserved.language,
                    );
                }
            }
        }
    }

    for mapping in &plan.subtitle_map {
        let s_index = subtitle_out_index(plan, mapping.input_index);
        args.extend([
            "-map".to_string(),
            format!("0:{}", mapping.input_index),
            format!("-c:s:{s_index}"),
            mapping.output_codec.clone(),
            format!("-metadata:s:s:{s_index}"),
            format!("language={}", mapping.language),
        ]);
    }

    let container = Container::from_path(output_path);
    if matches!(container, Container::Mp4) {
        args.extend(["-movflags".to_string(), "faststart".to_string()]);
    }

    args.extend(["-y".to_string(), output_path.display().to_string()]);

    let pgs_extractions = plan
        .extracted_pgs
        .iter()
        .map(|pgs| {
            let sidecar_path = sidecar_path_for(output_path, &pgs.output_suffix);
            PgsExtraction {
                args: vec![
                    "-i".to_string(),
                    input_path.display().to_string(),
                    "-map".to_string(),
                    format!("0:{}", pgs.input_index),
                    "-c".to_string(),
                    "copy".to_string(),
                    "-y".to_string(),
                    sidecar_path.display().to_string(),
                ],
                sidecar_path,
                suffix: pgs.output_suffix.clone(),
            }
        })
        .collect();

    FfmpegPlan {
        main_args: args,
        pgs_extractions,
    }
}

fn subtitle_out_index(plan: &TranscodePlan, input_index: u32) -> usize {
    plan.subtitle_map
        .iter()
        .position(|m| m.input_index == input_index)
        .unwrap_or(0)
}

fn push_audio_map(
    args: &mut Vec<String>,
    source: &str,
    out_index: usize,
    codec: &str,
    bitrate: Option<&str>,
    ch_layout: Option<&str>,
    language: &str,
) {
    args.extend(["-map".to_string(), source.to_string()]);
    args.extend([format!("-c:a:{out_index}"), codec.to_string()]);
    if let Some(bitrate) = bitrate {
        args.extend([format!("-b:a:{out_index}"), bitrate.to_string()]);
    }
    if let Some(layout) = ch_layout {
        args.extend([format!("-ch_layout:a:{out_index}"), layout.to_string()]);
    }
    args.extend([format!("-metadata:s:a:{out_index}"), format!("language={language}")]);
}

fn append_video_args(args: &mut Vec<String>, action: &VideoAction) {
    match action {
        VideoAction::None => {}
        VideoAction::Copy => {
            args.extend(["-c:v".to_string(), "copy".to_string()]);
        }
        VideoAction::Reencode { encoder, video_filter } => {
            if let Some(filter) = video_filter {
                args.extend(["-vf".to_string(), filter.clone()]);
            }
            match encoder {
                EncoderChoice::HardwareVaapi { qp } => {
                    args.extend([
                        "-c:v".to_string(),
                        "h264_vaapi".to_string(),
                        "-qp".to_string(),
                        qp.to_string(),
                    ]);
                }
                EncoderChoice::SoftwareX264 { crf, preset, threads_auto } => {
                    args.extend([
                        "-c:v".to_string(),
                        "libx264".to_string(),
                        "-crf".to_string(),
                        crf.to_string(),
                        "-preset".to_string(),
                        preset.clone(),
                    ]);
                    if *threads_auto {
                        args.extend(["-threads".to_string(), "0".to_string()]);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mb_core::{ActionTag, OutputKind};
    use mb_rules::{AudioSource, DerivedKind, DerivedTrack, PreservedAudio, SelectedSurround, SubtitleMapping};
    use std::path::PathBuf;

    fn base_plan() -> TranscodePlan {
        TranscodePlan {
            input_path: PathBuf::from("/tv/show/ep.mkv"),
            output_kind: OutputKind::Video,
            skip: false,
            skip_reason: None,
            video_action: VideoAction::Copy,
            selected_surround: None,
            derived_tracks: Vec::new(),
            preserved_audio: None,
            subtitle_map: Vec::new(),
            extracted_pgs: Vec::new(),
            audio_reencode: None,
            output_path_transform: None,
            action_tag: ActionTag::NeedsAudio,
        }
    }

    #[test]
    fn skip_plan_produces_no_args() {
        let mut plan = base_plan();
        plan.skip = true;
        let built = build(&plan, Path::new("/in.mkv"), Path::new("/out.mkv"));
        assert!(built.main_args.is_empty());
    }

    #[test]
    fn copy_video_with_preserved_stereo() {
        let mut plan = base_plan();
        plan.preserved_audio = Some(PreservedAudio {
            input_index: 1,
            title: "English Stereo (AAC-CBR192k)".into(),
            can_copy: true,
            channel_layout: Some("stereo".into()),
            language: "eng".to_string(),
        });
        let built = build(&plan, Path::new("/in.mkv"), Path::new("/out.mkv"));
        assert!(built.main_args.contains(&"0:v:0".to_string()));
        assert!(built.main_args.contains(&"0:1".to_string()));
        assert!(built.main_args.contains(&"copy".to_string()));
    }

    #[test]
    fn every_filter_complex_label_has_a_consumer() {
        let mut plan = base_plan();
        plan.selected_surround = Some(SelectedSurround {
            input_index: 1,
            channels: 8,
            needs_channelmap_fix: false,
            channel_layout: Some("7.1".to_string()),
            language: "eng".to_string(),
        });
        plan.derived_tracks = vec![
            DerivedTrack {
                source: AudioSource::Input(1),
                kind: DerivedKind::Downmix51From71,
                title: "5.1 Surround".into(),
                language: "eng".into(),
            },
            DerivedTrack {
                source: AudioSource::Derived51,
                kind: DerivedKind::DialogueStereoFromSurround,
                title: "English Stereo (C0.5-R6-AAC-VBR2)".into(),
                language: "eng".into(),
            },
        ];
        let built = build(&plan, Path::new("/in.mkv"), Path::new("/out.mkv"));

        let filter_idx = built.main_args.iter().position(|a| a == "-filter_complex").unwrap();
        let filter_complex = &built.main_args[filter_idx + 1];

        for map_arg in built
            .main_args
            .iter()
            .filter(|a| a.starts_with('[') && a.ends_with(']'))
        {
            assert!(
                filter_complex.contains(map_arg),
                "mapped label {map_arg} has no producer in {filter_complex}"
            );
        }
    }

    #[test]
    fn surround_with_known_layout_gets_aac_and_ch_layout() {
        let mut plan = base_plan();
        plan.selected_surround = Some(SelectedSurround {
            input_index: 1,
            channels: 8,
            needs_channelmap_fix: false,
            channel_layout: Some("7.1(wide)".to_string()),
            language: "eng".to_string(),
        });
        let built = build(&plan, Path::new("/in.mkv"), Path::new("/out.mkv"));
        assert!(built.main_args.contains(&"-ch_layout:a:0".to_string()));
        let idx = built.main_args.iter().position(|a| a == "-ch_layout:a:0").unwrap();
        assert_eq!(built.main_args[idx + 1], "7.1");
        assert!(built.main_args.contains(&"aac".to_string()));
    }

    #[test]
    fn channelmap_fixed_surround_gets_5_1_layout() {
        let mut plan = base_plan();
        plan.selected_surround = Some(SelectedSurround {
            input_index: 1,
            channels: 6,
            needs_channelmap_fix: true,
            channel_layout: None,
            language: "eng".to_string(),
        });
        let built = build(&plan, Path::new("/in.mkv"), Path::new("/out.mkv"));
        let idx = built.main_args.iter().position(|a| a == "-ch_layout:a:0").unwrap();
        assert_eq!(built.main_args[idx + 1], "5.1");
    }

    #[test]
    fn derived_51_track_carries_explicit_5_1_layout() {
        let mut plan = base_plan();
        plan.selected_surround = Some(SelectedSurround {
            input_index: 1,
            channels: 8,
            needs_channelmap_fix: false,
            channel_layout: Some("7.1".to_string()),
            language: "eng".to_string(),
        });
        plan.derived_tracks = vec![DerivedTrack {
            source: AudioSource::Input(1),
            kind: DerivedKind::Downmix51From71,
            title: "5.1 Surround".into(),
            language: "eng".into(),
        }];
        let built = build(&plan, Path::new("/in.mkv"), Path::new("/out.mkv"));
        let idx = built.main_args.iter().position(|a| a == "-ch_layout:a:1").unwrap();
        assert_eq!(built.main_args[idx + 1], "5.1");
    }

    #[test]
    fn pgs_extraction_produces_separate_invocation() {
        let mut plan = base_plan();
        plan.extracted_pgs = vec![mb_rules::ExtractedPgs {
            input_index: 3,
            output_suffix: ".eng.sup".to_string(),
        }];
        let built = build(&plan, Path::new("/in.mkv"), Path::new("/out.mkv"));
        assert_eq!(built.pgs_extractions.len(), 1);
        assert!(built.pgs_extractions[0].args.contains(&"0:3".to_string()));
        assert!(built.pgs_extractions[0]
            .sidecar_path
            .to_string_lossy()
            .ends_with(".eng.sup"));
    }

    #[test]
    fn subtitle_mapping_uses_mov_text_for_mp4() {
        let mut plan = base_plan();
        plan.subtitle_map = vec![SubtitleMapping {
            input_index: 4,
            output_codec: "mov_text".to_string(),
            language: "eng".to_string(),
        }];
        let built = build(&plan, Path::new("/in.mkv"), Path::new("/out.mp4"));
        assert!(built.main_args.contains(&"mov_text".to_string()));
        assert!(built.main_args.contains(&"faststart".to_string()));
    }
}
