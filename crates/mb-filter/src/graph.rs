//! `-filter_complex` assembly for the audio side of a [`TranscodePlan`].
//!
//! Every label is generated fresh per call, so two builds of the same plan
//! never collide, and each is consumed at most once downstream (the
//! exception — a derived 5.1 track that also feeds the dialogue-stereo
//! downmix — goes through `asplit` so both consumers get their own copy).

use mb_rules::{AudioSource, DerivedKind, TranscodePlan};

/// 7.1 -> 5.1 downmix: rear-wide channels (c6/c7) fold into the rear pair
/// (c4/c5) at -3dB, everything else passes straight through (§4.5.4).
const DOWNMIX_71_TO_51: &str = "pan=5.1|c0=c0|c1=c1|c2=c2|c3=c3|c4=c4+0.7*c6|c5=c5+0.7*c7";

/// Dialogue-boosted stereo downmix: center (c2) and rear (c4/c5) folded into
/// the front pair, followed by a compressor so quiet dialogue doesn't get
/// lost next to loud effects (§4.5.4).
const DIALOGUE_DOWNMIX: &str =
    "pan=stereo|c0=0.35*c0+0.5*c2+0.25*c4|c1=0.35*c1+0.5*c2+0.25*c5";
const DIALOGUE_COMPRESSOR: &str =
    "acompressor=level_in=1.5:threshold=0.1:ratio=6:attack=20:release=250";

/// Explicit channel-order reassertion for a 6-channel stream reporting
/// unknown layout (§3 Channelmap fix, §4.5.3).
const CHANNELMAP_FIX: &str = "channelmap=0-FL|1-FR|2-FC|3-LFE|4-BL|5-BR:5.1";

/// One `-filter_complex` chain entry: `[inputs]filter_expr[outputs]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStep {
    pub inputs: Vec<String>,
    pub expr: String,
    pub outputs: Vec<String>,
}

impl FilterStep {
    fn render(&self) -> String {
        let inputs: String = self.inputs.iter().map(|l| format!("[{l}]")).collect();
        let outputs: String = self.outputs.iter().map(|l| format!("[{l}]")).collect();
        format!("{inputs}{}{outputs}", self.expr)
    }
}

/// Every audio filter-graph step needed by `plan`, plus the label each
/// output audio stream should be mapped from (`None` means "map the input
/// stream index directly, no filter involved").
#[derive(Debug, Default)]
pub struct AudioGraph {
    pub steps: Vec<FilterStep>,
    /// Label that now holds the fixed-channelmap surround track, if the
    /// selected surround stream needed one.
    pub fixed_channelmap_label: Option<String>,
    /// Label holding the synthesized 5.1-from-7.1 downmix, if any.
    pub derived_51_label: Option<String>,
    /// Label holding the dialogue-boosted stereo downmix, if any.
    pub dialogue_stereo_label: Option<String>,
}

impl AudioGraph {
    /// Render every step as the `;`-joined body of a single `-filter_complex`
    /// argument, or `None` if no audio filtering is needed at all.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        if self.steps.is_empty() {
            return None;
        }
        Some(
            self.steps
                .iter()
                .map(FilterStep::render)
                .collect::<Vec<_>>()
                .join(";"),
        )
    }
}

/// Build the audio filter graph for `plan`. Pure function of the plan's
/// derived-track and selected-surround decisions; doesn't touch the
/// filesystem or any process.
#[must_use]
pub fn build_audio_graph(plan: &TranscodePlan) -> AudioGraph {
    let mut graph = AudioGraph::default();

    let Some(surround) = &plan.selected_surround else {
        return graph;
    };

    // The channelmap fix, if needed, is the very first step: every later
    // consumer of "the surround track" reads this label instead of the raw
    // input when it applies.
    let surround_label = if surround.needs_channelmap_fix {
        let label = "surround_fixed".to_string();
        graph.steps.push(FilterStep {
            inputs: vec![format!("0:{}", surround.input_index)],
            expr: CHANNELMAP_FIX.to_string(),
            outputs: vec![label.clone()],
        });
        graph.fixed_channelmap_label = Some(label.clone());
        label
    } else {
        format!("0:{}", surround.input_index)
    };

    let derived_51 = plan
        .derived_tracks
        .iter()
        .find(|t| t.kind == DerivedKind::Downmix51From71);
    let dialogue = plan
        .derived_tracks
        .iter()
        .find(|t| t.kind == DerivedKind::DialogueStereoFromSurround);

    // Whether the 5.1 downmix label needs `asplit` because both the
    // standalone 5.1 track and the dialogue downmix consume it.
    let derived_51_feeds_dialogue = derived_51.is_some()
        && dialogue.is_some_and(|d| d.source == AudioSource::Derived51);

    if derived_51.is_some() {
        if derived_51_feeds_dialogue {
            // Both the standalone 5.1 output and the dialogue downmix read
            // from the derived 5.1, so it must be split: `[surround_51_tmp]`
            // -> `asplit=2` -> `[surround_51]` (output) + `[for_stereo]`
            // (dialogue source), matching the literal command the spec
            // expects for a 7.1 source with no pre-existing 5.1.
            let tmp_label = "surround_51_tmp".to_string();
            graph.steps.push(FilterStep {
                inputs: vec![surround_label.clone()],
                expr: DOWNMIX_71_TO_51.to_string(),
                outputs: vec![tmp_label.clone()],
            });

            let (out_label, dialogue_source_label) =
                ("surround_51".to_string(), "for_stereo".to_string());
            graph.steps.push(FilterStep {
                inputs: vec![tmp_label],
                expr: "asplit=2".to_string(),
                outputs: vec![out_label.clone(), dialogue_source_label.clone()],
            });
            graph.derived_51_label = Some(out_label);
            emit_dialogue_downmix(&mut graph, &dialogue_source_label);
        } else {
            let downmix_label = "surround_51".to_string();
            graph.steps.push(FilterStep {
                inputs: vec![surround_label.clone()],
                expr: DOWNMIX_71_TO_51.to_string(),
                outputs: vec![downmix_label.clone()],
            });
            graph.derived_51_label = Some(downmix_label);
        }
    } else if dialogue.is_some() {
        emit_dialogue_downmix(&mut graph, &surround_label);
    }

    graph
}

fn emit_dialogue_downmix(graph: &mut AudioGraph, source_label: &str) {
    // Single combined step for the pan+compressor chain, matching the
    // spec's literal `[for_stereo]pan=...,acompressor=...[aout]` fragment.
    let compressed = "aout".to_string();
    graph.steps.push(FilterStep {
        inputs: vec![source_label.to_string()],
        expr: format!("{DIALOGUE_DOWNMIX},{DIALOGUE_COMPRESSOR}"),
        outputs: vec![compressed.clone()],
    });
    graph.dialogue_stereo_label = Some(compressed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mb_rules::{AudioSource, DerivedKind, DerivedTrack, SelectedSurround, VideoAction};
    use std::path::PathBuf;

    fn base_plan() -> TranscodePlan {
        TranscodePlan {
            input_path: PathBuf::from("/tv/show/ep.mkv"),
            output_kind: mb_core::OutputKind::Video,
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
            action_tag: mb_core::ActionTag::NeedsAudio,
        }
    }

    #[test]
    fn no_surround_produces_empty_graph() {
        let graph = build_audio_graph(&base_plan());
        assert!(graph.steps.is_empty());
        assert!(graph.render().is_none());
    }

    #[test]
    fn channelmap_fix_alone_emits_one_step() {
        let mut plan = base_plan();
        plan.selected_surround = Some(SelectedSurround {
            input_index: 1,
            channels: 6,
            needs_channelmap_fix: true,
            channel_layout: None,
            language: "eng".to_string(),
        });
        let graph = build_audio_graph(&plan);
        assert_eq!(graph.steps.len(), 1);
        assert_eq!(graph.fixed_channelmap_label.as_deref(), Some("surround_fixed"));
        assert!(graph.render().unwrap().contains("channelmap"));
    }

    #[test]
    fn seven_one_with_dialogue_downmix_uses_asplit() {
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
        let graph = build_audio_graph(&plan);
        let rendered = graph.render().unwrap();
        assert!(rendered.contains("asplit=2"));
        assert!(graph.derived_51_label.is_some());
        assert!(graph.dialogue_stereo_label.is_some());
    }

    #[test]
    fn dialogue_only_skips_asplit() {
        let mut plan = base_plan();
        plan.selected_surround = Some(SelectedSurround {
            input_index: 1,
            channels: 6,
            needs_channelmap_fix: false,
            channel_layout: Some("5.1".to_string()),
            language: "eng".to_string(),
        });
        plan.derived_tracks = vec![DerivedTrack {
            source: AudioSource::Input(1),
            kind: DerivedKind::DialogueStereoFromSurround,
            title: "English Stereo (C0.5-R6-AAC-VBR2)".into(),
            language: "eng".into(),
        }];
        let graph = build_audio_graph(&plan);
        assert!(!graph.render().unwrap().contains("asplit"));
        assert!(graph.derived_51_label.is_none());
        assert!(graph.dialogue_stereo_label.is_some());
    }
}
