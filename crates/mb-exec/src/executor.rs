//! The Transcode Executor (§4.7): runs the ffmpeg invocations a
//! [`TranscodePlan`] implies, under an exclusive file lock, with an atomic
//! temp-then-rename swap and full cache/sidecar bookkeeping.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use mb_cache::{CacheEntry, MetadataCache};
use mb_core::{Container, Error, Fingerprint, HdrInfo, Result};
use mb_lock::{AcquireOutcome, FileLock};
use mb_probe::MediaProbe;
use mb_rules::{resolved_output_path, TranscodePlan};
use tokio::process::Command;

use crate::sidecars;

/// Outcome of running the executor on one input file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub output_path: PathBuf,
    pub skipped: bool,
    pub duration_secs: f64,
}

/// Run the full plan for `input_path`: lock, transcode (or skip), atomic
/// rename, sidecar handling, cache update. The lock is released on every
/// exit path because [`mb_lock::LockGuard`] drops at the end of this
/// function's scope regardless of how it returns.
pub async fn execute(
    input_path: &Path,
    probe: &MediaProbe,
    hdr: HdrInfo,
    plan: &TranscodePlan,
    ffmpeg_tool: &Path,
    cache: &mut MetadataCache,
) -> Result<ExecutionOutcome> {
    let fp = Fingerprint::of_path(input_path)?;

    if plan.skip {
        let entry = CacheEntry::from_probe(&fp, probe, hdr, plan.action_tag);
        cache.store(&fp, entry)?;
        return Ok(ExecutionOutcome {
            output_path: input_path.to_path_buf(),
            skipped: true,
            duration_secs: 0.0,
        });
    }

    let lock = FileLock::new(input_path);
    let _guard = match lock.acquire(false)? {
        AcquireOutcome::Acquired(guard) => guard,
        AcquireOutcome::Held(held) => {
            return Err(Error::lock_held(
                input_path,
                format!("{}:{}", held.hostname, held.pid),
            ))
        }
    };

    let started = Instant::now();
    let final_output = resolved_output_path(plan);
    let temp_output = temp_path_for(&final_output);

    let result = run_transcode(input_path, plan, ffmpeg_tool, &temp_output).await;

    match result {
        Ok(()) => {
            finalize_success(input_path, plan, &final_output, &temp_output)?;
            let duration = started.elapsed().as_secs_f64();
            cache.update_after_conversion(&fp, &final_output, true, None, Some(duration))?;
            Ok(ExecutionOutcome {
                output_path: final_output,
                skipped: false,
                duration_secs: duration,
            })
        }
        Err(e) => {
            cleanup_temp(&final_output, plan);
            let _ = std::fs::remove_file(&temp_output);
            cache.update_after_conversion(&fp, &final_output, false, Some(e.to_string()), None)?;
            Err(e)
        }
    }
}

/// `<stem>.tmp.<ext>` next to the final output, matching §4.7's crash-safe
/// write pattern.
fn temp_path_for(final_output: &Path) -> PathBuf {
    let stem = final_output.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let ext = final_output.extension().and_then(|e| e.to_str()).unwrap_or("mp4");
    final_output.with_file_name(format!("{stem}.tmp.{ext}"))
}

async fn run_transcode(
    input_path: &Path,
    plan: &TranscodePlan,
    ffmpeg_tool: &Path,
    temp_output: &Path,
) -> Result<()> {
    let ffmpeg_plan = mb_filter::build(plan, input_path, temp_output);

    run_ffmpeg(ffmpeg_tool, &ffmpeg_plan.main_args, input_path).await?;

    for extraction in &ffmpeg_plan.pgs_extractions {
        run_ffmpeg(ffmpeg_tool, &extraction.args, input_path).await?;
    }

    Ok(())
}

async fn run_ffmpeg(ffmpeg_tool: &Path, args: &[String], input_path: &Path) -> Result<()> {
    let output = Command::new(ffmpeg_tool)
        .arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| Error::Other(format!("failed to spawn encoder: {e}")))?;

    if !output.status.success() {
        return Err(Error::EncoderNonzeroExit {
            path: input_path.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}

/// Rename the temp output into place, move sidecars to match, and delete
/// the original source when its path differs from the final output.
fn finalize_success(
    input_path: &Path,
    plan: &TranscodePlan,
    final_output: &Path,
    temp_output: &Path,
) -> Result<()> {
    if final_output != input_path && final_output.exists() {
        std::fs::remove_file(final_output)?;
    }
    std::fs::rename(temp_output, final_output)?;

    for extraction_suffix in plan.extracted_pgs.iter().map(|p| &p.output_suffix) {
        let temp_sidecar = mb_filter::sidecar_path_for(temp_output, extraction_suffix);
        let final_sidecar = mb_filter::sidecar_path_for(final_output, extraction_suffix);
        if temp_sidecar.exists() {
            std::fs::rename(&temp_sidecar, &final_sidecar)?;
        }
    }

    let failures = sidecars::rename_sidecars(input_path, final_output);
    for (path, error) in failures {
        tracing::warn!(sidecar = %path.display(), %error, "failed to rename sidecar");
    }

    if input_path != final_output {
        std::fs::remove_file(input_path)?;
    }

    Ok(())
}

fn cleanup_temp(final_output: &Path, plan: &TranscodePlan) {
    for extraction_suffix in plan.extracted_pgs.iter().map(|p| &p.output_suffix) {
        let temp_output = temp_path_for(final_output);
        let temp_sidecar = mb_filter::sidecar_path_for(&temp_output, extraction_suffix);
        let _ = std::fs::remove_file(temp_sidecar);
    }
}

/// Remove leftover `.tmp.<ext>` files older than one hour from a previous
/// crashed run, for every container extension the engine writes (§9
/// supplemental: stale temp sweep).
pub fn sweep_stale_temp_files(directory: &Path, max_age: std::time::Duration) -> std::io::Result<usize> {
    let mut removed = 0;
    let now = std::time::SystemTime::now();

    for entry in std::fs::read_dir(directory)?.filter_map(|e| e.ok()) {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.contains(".tmp.") {
            continue;
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !matches!(Container::from_extension(ext), Container::Mp4 | Container::Mp3) {
            continue;
        }

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        if now.duration_since(modified).unwrap_or_default() > max_age && std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mb_core::{ActionTag, OutputKind};
    use mb_probe::{Format, MediaProbe};
    use mb_rules::VideoAction;
    use std::time::Duration;

    fn probe() -> MediaProbe {
        MediaProbe {
            format: Format {
                container_name: "mov,mp4".into(),
                duration_secs: Some(60.0),
                bit_rate: Some(1_000_000),
                size_bytes: Some(1024),
            },
            streams: vec![],
        }
    }

    fn skip_plan(path: &Path) -> TranscodePlan {
        TranscodePlan {
            input_path: path.to_path_buf(),
            output_kind: OutputKind::Video,
            skip: true,
            skip_reason: Some("already compliant".into()),
            video_action: VideoAction::Copy,
            selected_surround: None,
            derived_tracks: Vec::new(),
            preserved_audio: None,
            subtitle_map: Vec::new(),
            extracted_pgs: Vec::new(),
            audio_reencode: None,
            output_path_transform: None,
            action_tag: ActionTag::Skip,
        }
    }

    #[tokio::test]
    async fn skip_plan_updates_cache_without_touching_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("movie.mp4");
        std::fs::write(&input, b"data").unwrap();

        let mut cache = MetadataCache::load(dir.path()).unwrap();
        let plan = skip_plan(&input);

        let outcome = execute(
            &input,
            &probe(),
            HdrInfo::sdr(8),
            &plan,
            Path::new("ffmpeg"),
            &mut cache,
        )
        .await
        .unwrap();

        assert!(outcome.skipped);
        assert!(input.exists());
        let fp = Fingerprint::of_path(&input).unwrap();
        assert!(cache.lookup(&fp).is_some());
    }

    #[test]
    fn temp_path_uses_tmp_infix() {
        let path = Path::new("/tv/Show/ep.mp4");
        assert_eq!(temp_path_for(path), PathBuf::from("/tv/Show/ep.tmp.mp4"));
    }

    #[test]
    fn sweep_removes_old_temp_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("movie.tmp.mp4");
        let fresh = dir.path().join("other.tmp.mp4");
        std::fs::write(&old, b"x").unwrap();
        std::fs::write(&fresh, b"x").unwrap();

        // Backdate `old`'s mtime using filetime isn't available here, so
        // this exercises the "nothing old enough yet" branch instead.
        let removed = sweep_stale_temp_files(dir.path(), Duration::from_secs(3600)).unwrap();
        assert_eq!(removed, 0);
        assert!(old.exists());
        assert!(fresh.exists());
    }
}
