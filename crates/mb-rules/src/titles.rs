//! Audio track titling constants (§4.5.5).
//!
//! The "is this already an enhanced stereo track?" check is a literal
//! substring match against [`ENHANCED_STEREO_SIGNATURE`] in an existing
//! stream's title tag. This is deliberately fragile: changing the
//! signature string is, per the specification's own Design Notes, exactly
//! the kind of change that must bump [`mb_cache::PROCESSING_VERSION`] so
//! every cached `skip` decision gets re-evaluated. Do not "clean up" the
//! string without also bumping that constant.

/// Substring that marks an existing stereo track as an already-upgraded
/// dialogue-boosted downmix.
pub const ENHANCED_STEREO_SIGNATURE: &str = "C0.5-R6";

/// Title for a preserved (not derived) surround track, by channel count.
#[must_use]
pub fn surround_title(channels: u32) -> &'static str {
    match channels {
        6 => "5.1 Surround",
        8 => "7.1 Surround",
        _ => "Surround",
    }
}

/// Title for a 5.1 track synthesized from a 7.1 source.
pub const DERIVED_51_TITLE: &str = "5.1 Surround";

/// Title for the synthesized dialogue-boosted stereo downmix.
#[must_use]
pub fn dialogue_stereo_title(force_triggered: bool) -> &'static str {
    if force_triggered {
        "English Stereo (Dialogue-C0.5-R6-AAC-VBR2)"
    } else {
        "English Stereo (C0.5-R6-AAC-VBR2)"
    }
}

/// Title for a pre-existing stereo track preserved as-is (no derivation).
pub const PRESERVED_STEREO_TITLE: &str = "English Stereo (AAC-CBR192k)";

/// Whether an existing stream's title tag already carries the enhanced
/// stereo signature (i.e. is upgradable-skippable rather than needing a
/// fresh derivation).
#[must_use]
pub fn has_enhanced_stereo_signature(title: Option<&str>) -> bool {
    title
        .map(|t| t.contains(ENHANCED_STEREO_SIGNATURE))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surround_titles_by_channel_count() {
        assert_eq!(surround_title(6), "5.1 Surround");
        assert_eq!(surround_title(8), "7.1 Surround");
        assert_eq!(surround_title(2), "Surround");
    }

    #[test]
    fn dialogue_titles_reflect_force_trigger() {
        assert!(dialogue_stereo_title(false).contains("C0.5-R6"));
        assert!(!dialogue_stereo_title(false).contains("Dialogue"));
        assert!(dialogue_stereo_title(true).contains("Dialogue-C0.5-R6"));
    }

    #[test]
    fn signature_detection_matches_substring_anywhere() {
        assert!(has_enhanced_stereo_signature(Some(
            "English Stereo (C0.5-R6-AAC-VBR2)"
        )));
        assert!(has_enhanced_stereo_signature(Some("prefix C0.5-R6 suffix")));
        assert!(!has_enhanced_stereo_signature(Some("English Stereo (AAC-CBR192k)")));
        assert!(!has_enhanced_stereo_signature(None));
    }
}
