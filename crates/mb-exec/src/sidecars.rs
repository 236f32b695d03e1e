//! Sidecar file handling when an output filename changes (§4.7).
//!
//! Subtitle and companion-info sidecars (`.srt`, `.nfo`, extracted `.sup`,
//! etc.) share the input's stem. If the Decision Engine's filename rewrite
//! changed the stem, every sidecar present on disk is renamed to match so
//! it doesn't silently stop being picked up by whatever reads it next to
//! the media file.

use std::path::{Path, PathBuf};

/// Extensions treated as sidecars of a media file, beyond the media file
/// itself. `.sup` is included because PGS extraction (§4.5.6) creates one
/// next to the source before any rename happens.
pub const SIDECAR_EXTENSIONS: &[&str] = &[
    "srt", "vtt", "ass", "ssa", "sub", "idx", "sup", "txt", "nfo",
];

/// Find every sidecar of `input_path` present in its directory (matching
/// stem, one of [`SIDECAR_EXTENSIONS`]). Doesn't match `input_path` itself.
#[must_use]
pub fn find_sidecars(input_path: &Path) -> Vec<PathBuf> {
    let Some(dir) = input_path.parent() else {
        return Vec::new();
    };
    let Some(stem) = input_path.file_stem().and_then(|s| s.to_str()) else {
        return Vec::new();
    };

    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p != input_path)
        .filter(|p| {
            p.file_stem().and_then(|s| s.to_str()) == Some(stem)
                && p.extension()
                    .and_then(|e| e.to_str())
                    .map(|ext| SIDECAR_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
                    .unwrap_or(false)
        })
        .collect()
}

/// Rename every sidecar of `input_path` to match `output_path`'s stem, in
/// the same directory as `output_path`. No-op (empty result) when the stems
/// already match. Best-effort per file: one failure doesn't abort the rest.
pub fn rename_sidecars(input_path: &Path, output_path: &Path) -> Vec<(PathBuf, std::io::Error)> {
    let mut failures = Vec::new();

    if input_path.file_stem() == output_path.file_stem()
        && input_path.parent() == output_path.parent()
    {
        return failures;
    }

    let Some(new_stem) = output_path.file_stem().and_then(|s| s.to_str()) else {
        return failures;
    };
    let Some(new_dir) = output_path.parent() else {
        return failures;
    };

    for sidecar in find_sidecars(input_path) {
        let Some(ext) = sidecar.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        // Preserve multi-part suffixes like `.eng.sup` / `.forced.eng.sup`
        // by replacing only the leading stem, not the full file name.
        let old_name = sidecar.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let old_stem = sidecar.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let remainder = &old_name[old_stem.len()..];
        let _ = ext;

        let new_path = new_dir.join(format!("{new_stem}{remainder}"));
        if let Err(e) = std::fs::rename(&sidecar, &new_path) {
            failures.push((sidecar, e));
        }
    }

    failures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_matching_stem_sidecars_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("movie.mkv"), b"").unwrap();
        std::fs::write(dir.path().join("movie.srt"), b"").unwrap();
        std::fs::write(dir.path().join("movie.eng.sup"), b"").unwrap();
        std::fs::write(dir.path().join("other.srt"), b"").unwrap();

        let sidecars = find_sidecars(&dir.path().join("movie.mkv"));
        assert_eq!(sidecars.len(), 2);
    }

    #[test]
    fn rename_sidecars_preserves_language_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Movie.2020.4K.BluRay.mkv");
        std::fs::write(&input, b"").unwrap();
        std::fs::write(dir.path().join("Movie.2020.4K.BluRay.eng.sup"), b"").unwrap();

        let output = dir.path().join("Movie.2020.1080p.BluRay.mp4");
        let failures = rename_sidecars(&input, &output);
        assert!(failures.is_empty());
        assert!(dir.path().join("Movie.2020.1080p.BluRay.eng.sup").exists());
    }

    #[test]
    fn no_rename_needed_when_stems_match() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("movie.mkv");
        let output = dir.path().join("movie.mp4");
        std::fs::write(&input, b"").unwrap();
        std::fs::write(dir.path().join("movie.srt"), b"").unwrap();

        // Same stem ("movie"), different extension on the media file
        // itself is fine — sidecar renaming only keys off the stem.
        let failures = rename_sidecars(&input, &output);
        assert!(failures.is_empty());
        assert!(dir.path().join("movie.srt").exists());
    }
}
