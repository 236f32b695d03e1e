//! Resolution-token filename rewrite (§6).
//!
//! Applied to the filename stem only, first match wins. If no token
//! matches but a downgrade happened anyway, a `1080p` tag is inserted
//! before the first recognized quality tag, or appended if none is present.

use regex::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

struct TokenRule {
    pattern: &'static str,
    replacement: &'static str,
}

const TOKEN_RULES: &[TokenRule] = &[
    TokenRule {
        pattern: r"\b(4K|UHD|2160p?)\b",
        replacement: "1080p",
    },
    TokenRule {
        pattern: r"\b1440p?\b",
        replacement: "1080p",
    },
    TokenRule {
        pattern: r"\b(1800p?|1620p?|1200p?)\b",
        replacement: "1080p",
    },
];

const QUALITY_TAGS: &[&str] = &["WEBDL", "WEB-DL", "BluRay", "BDRip", "DVDRip", "HDRip"];

fn compiled_rules() -> &'static Vec<Regex> {
    static RULES: OnceLock<Vec<Regex>> = OnceLock::new();
    RULES.get_or_init(|| {
        TOKEN_RULES
            .iter()
            .map(|r| {
                RegexBuilder::new(r.pattern)
                    .case_insensitive(true)
                    .build()
                    .expect("resolution token pattern is valid")
            })
            .collect()
    })
}

fn quality_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternation = QUALITY_TAGS.join("|");
        RegexBuilder::new(&format!(r"\b({alternation})\b"))
            .case_insensitive(true)
            .build()
            .expect("quality tag pattern is valid")
    })
}

/// Rewrite a filename stem (no extension) to replace any resolution token
/// with `1080p`. Idempotent: re-running on an already-rewritten stem is a
/// no-op because `1080p` isn't itself a rewrite target.
///
/// Returns `None` when no resolution token was found (caller decides
/// whether to fall back to [`insert_1080p_tag`]).
#[must_use]
pub fn rewrite_resolution_token(stem: &str) -> Option<String> {
    for (rule, regex) in TOKEN_RULES.iter().zip(compiled_rules()) {
        if regex.is_match(stem) {
            return Some(regex.replace(stem, rule.replacement).into_owned());
        }
    }
    None
}

/// Insert a `1080p` tag before the first recognized quality tag, or append
/// it to the end of the stem if none is present. Used when a downgrade was
/// performed but the filename carried no resolution token to replace.
#[must_use]
pub fn insert_1080p_tag(stem: &str) -> String {
    let re = quality_tag_regex();
    if let Some(m) = re.find(stem) {
        format!("{}1080p {}", &stem[..m.start()], &stem[m.start()..])
    } else {
        format!("{stem} 1080p")
    }
}

/// Full resolution-rewrite policy: try the token replacement first; if none
/// applies and `downgrade_happened`, fall back to tag insertion. Returns
/// `None` when the stem is unchanged.
#[must_use]
pub fn apply(stem: &str, downgrade_happened: bool) -> Option<String> {
    if let Some(rewritten) = rewrite_resolution_token(stem) {
        return Some(rewritten);
    }
    if downgrade_happened {
        return Some(insert_1080p_tag(stem));
    }
    None
}

/// Apply the resolution-rewrite policy to a full file path, returning a new
/// bare filename (stem + original extension) when it changes, `None`
/// otherwise. Operates on the stem only; the extension is never rewritten.
#[must_use]
pub fn apply_to_path(path: &Path, downgrade_happened: bool) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension().and_then(|e| e.to_str());

    let new_stem = apply(stem, downgrade_happened)?;
    let new_name = match ext {
        Some(ext) => format!("{new_stem}.{ext}"),
        None => new_stem,
    };
    Some(PathBuf::from(new_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_4k_token() {
        assert_eq!(
            rewrite_resolution_token("Movie.2020.4K.BluRay"),
            Some("Movie.2020.1080p.BluRay".to_string())
        );
    }

    #[test]
    fn replaces_uhd_and_2160p() {
        assert_eq!(
            rewrite_resolution_token("Show S01E01 UHD"),
            Some("Show S01E01 1080p".to_string())
        );
        assert_eq!(
            rewrite_resolution_token("Show S01E01 2160p"),
            Some("Show S01E01 1080p".to_string())
        );
    }

    #[test]
    fn replaces_1440p() {
        assert_eq!(
            rewrite_resolution_token("Movie 1440p WEBDL"),
            Some("Movie 1080p WEBDL".to_string())
        );
    }

    #[test]
    fn no_token_returns_none() {
        assert_eq!(rewrite_resolution_token("Movie.2020.1080p.BluRay"), None);
    }

    #[test]
    fn idempotent_on_already_rewritten_name() {
        let once = rewrite_resolution_token("Movie.2020.4K.BluRay").unwrap();
        assert_eq!(rewrite_resolution_token(&once), None);
        assert_eq!(apply(&once, true), Some(once.clone()));
    }

    #[test]
    fn inserts_before_quality_tag_when_no_token_present() {
        assert_eq!(
            insert_1080p_tag("Movie.2020.BluRay.x264"),
            "Movie.2020.1080p BluRay.x264"
        );
    }

    #[test]
    fn appends_when_no_quality_tag_present() {
        assert_eq!(insert_1080p_tag("Movie.2020.x264"), "Movie.2020.x264 1080p");
    }

    #[test]
    fn apply_prefers_token_rewrite_over_insertion() {
        assert_eq!(
            apply("Movie.2020.4K.BluRay", true),
            Some("Movie.2020.1080p.BluRay".to_string())
        );
    }

    #[test]
    fn apply_returns_none_when_nothing_to_do() {
        assert_eq!(apply("Movie.2020.BluRay", false), None);
    }

    #[test]
    fn apply_to_path_preserves_extension() {
        let path = Path::new("/tv/Show/Show.S01E01.2160p.mkv");
        let rewritten = apply_to_path(path, false).unwrap();
        assert_eq!(rewritten, PathBuf::from("Show.S01E01.1080p.mkv"));
    }

    #[test]
    fn apply_to_path_none_when_unchanged() {
        let path = Path::new("/tv/Show/Show.S01E01.720p.mkv");
        assert_eq!(apply_to_path(path, false), None);
    }
}
