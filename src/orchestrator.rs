//! The Orchestrator (§4.9): walks a file or directory, runs each input
//! through probe → decide → execute, and notifies the indexer once the
//! batch completes. A failure on one file never aborts the batch; only
//! `Error::InterruptRequested` does.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mb_cache::MetadataCache;
use mb_core::config::Config;
use mb_core::{Container, Error, HdrInfo, MediaTypeFilter, Result};
use mb_probe::ProbeAdapter;
use mb_rules::{DecisionFlags, EncoderCapability};
use tokio::sync::Notify;
use walkdir::WalkDir;

/// Temp files older than this are assumed to be debris from an interrupted
/// previous run (§4.9, §5 stale-resource recovery).
const STALE_TEMP_MAX_AGE: Duration = Duration::from_secs(3600);

/// Outcome of one orchestrator run, printed by the CLI on completion.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: u32,
    pub skipped: u32,
    pub failed: u32,
    pub notified_libraries: Vec<String>,
}

/// Owns the tool paths and one-time encoder capability probe for a run.
pub struct Orchestrator {
    config: Config,
    ffmpeg_tool: PathBuf,
    ffprobe_tool: PathBuf,
    capability: EncoderCapability,
}

impl Orchestrator {
    /// Resolve tool paths from `config.venv_path` and probe encoder
    /// capability once, up front, per §5's "capability-probed once per
    /// process, not gated" policy.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let ffmpeg_tool = resolve_tool(&config.venv_path, "ffmpeg");
        let ffprobe_tool = resolve_tool(&config.venv_path, "ffprobe");
        let capability = mb_rules::capability::detect_default(&ffmpeg_tool);
        tracing::info!(?capability, "encoder capability probe complete");
        Self {
            config,
            ffmpeg_tool,
            ffprobe_tool,
            capability,
        }
    }

    /// Run over exactly one of `dir` (recursive) or `file`. `cancel` is
    /// notified by the caller's signal handler; when it fires mid-file the
    /// in-flight future is dropped (releasing the lock and killing any
    /// spawned encoder child, per `mb_exec`'s `kill_on_drop`) and the run
    /// returns `Error::InterruptRequested`.
    pub async fn run(
        &self,
        dir: Option<&Path>,
        file: Option<&Path>,
        media_type: MediaTypeFilter,
        flags: DecisionFlags,
        cancel: Arc<Notify>,
    ) -> Result<BatchReport> {
        self.sweep_stale_temp_files();

        let targets = match (dir, file) {
            (_, Some(f)) => vec![f.to_path_buf()],
            (Some(d), None) => walk_media_files(d, media_type),
            (None, None) => Vec::new(),
        };

        let mut report = BatchReport::default();
        let mut changed_paths = Vec::new();
        let mut caches: HashMap<PathBuf, MetadataCache> = HashMap::new();

        for path in targets {
            let outcome = tokio::select! {
                biased;
                () = cancel.notified() => return Err(Error::InterruptRequested),
                result = self.process_one(&path, flags, &mut caches) => result,
            };

            match outcome {
                Ok(Some(output_path)) => {
                    report.processed += 1;
                    changed_paths.push(output_path);
                }
                Ok(None) => report.skipped += 1,
                Err(Error::UnsupportedFormat { .. }) => {
                    tracing::info!(path = %path.display(), "skipping unsupported format");
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "file failed, continuing batch");
                    report.failed += 1;
                }
            }
        }

        if !changed_paths.is_empty() {
            let notifier = mb_notify::IndexerClient::new(self.config.indexer.clone());
            let notified = notifier.notify_batch(&changed_paths).await;
            report.notified_libraries = notified.iter().map(ToString::to_string).collect();
            tracing::info!(libraries = ?report.notified_libraries, "indexer notification complete");
        }

        Ok(report)
    }

    /// Probe, decide, and execute one file. Returns the final output path on
    /// a real conversion, `None` on a skip, propagating everything else.
    async fn process_one(
        &self,
        path: &Path,
        flags: DecisionFlags,
        caches: &mut HashMap<PathBuf, MetadataCache>,
    ) -> Result<Option<PathBuf>> {
        let container = Container::from_path(path);
        if container == Container::Other {
            return Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }

        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        if !caches.contains_key(&dir) {
            caches.insert(dir.clone(), MetadataCache::load(&dir)?);
        }
        let cache = caches.get_mut(&dir).expect("just inserted");

        tracing::debug!(path = %path.display(), "probing");
        let probe = ProbeAdapter::new(&self.ffprobe_tool).probe(path).await?;

        let hdr = probe
            .primary_video()
            .map(|v| mb_probe::hdr::detect(&v))
            .unwrap_or_else(|| HdrInfo::sdr(8));

        let plan = mb_rules::decide(path, container, &probe, flags, self.capability)?;
        tracing::info!(path = %path.display(), action = %plan.action_tag, "decision made");

        let outcome = mb_exec::execute(path, &probe, hdr, &plan, &self.ffmpeg_tool, cache).await?;

        if outcome.skipped {
            Ok(None)
        } else {
            tracing::info!(
                path = %path.display(),
                output = %outcome.output_path.display(),
                duration_secs = outcome.duration_secs,
                "conversion complete"
            );
            Ok(Some(outcome.output_path))
        }
    }

    /// Sweep every configured library root for crash debris before walking
    /// (§4.9, §5). Best-effort: a sweep failure is logged, never fatal.
    fn sweep_stale_temp_files(&self) {
        for dir in library_roots(&self.config) {
            match mb_exec::sweep_stale_temp_files(&dir, STALE_TEMP_MAX_AGE) {
                Ok(0) => {}
                Ok(removed) => {
                    tracing::info!(dir = %dir.display(), removed, "swept stale temp files")
                }
                Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "stale temp sweep failed"),
            }
        }
    }
}

/// `<venv_path>/bin/<name>` if present, else fall back to looking `name` up
/// on `PATH` at spawn time.
fn resolve_tool(venv_path: &Path, name: &str) -> PathBuf {
    let candidate = venv_path.join("bin").join(name);
    if candidate.is_file() {
        candidate
    } else {
        PathBuf::from(name)
    }
}

fn library_roots(config: &Config) -> Vec<PathBuf> {
    [
        &config.library_dirs.tv,
        &config.library_dirs.movies,
        &config.library_dirs.music,
        &config.library_dirs.misc,
    ]
    .into_iter()
    .filter_map(|dir| dir.clone())
    .filter(|dir| dir.is_dir())
    .collect()
}

/// Recursively collect media files under `dir` accepted by `media_type`,
/// skipping already-existing `<stem>.tmp.<ext>` artifacts (§4.9).
fn walk_media_files(dir: &Path, media_type: MediaTypeFilter) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.contains(".tmp.") {
                return false;
            }
            let container = Container::from_path(path);
            container != Container::Other && media_type.accepts(container)
        })
        .collect()
}
