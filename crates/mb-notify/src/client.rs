//! The Indexer Notifier (§4.8): tells a downstream library indexer (e.g.
//! Sonarr/Radarr/Jellyfin-style) which libraries changed after a batch run.
//!
//! A notification failure never fails the batch — the files were already
//! transcoded and cached successfully; the indexer will pick them up on its
//! own next scheduled scan even if this call fails. Non-fatal by design,
//! logged via [`mb_core::Error::IndexerNotifyFailed`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mb_core::config::IndexerConfig;
use mb_core::{Error, LibraryKind, Result};
use reqwest::Client;

use crate::mapping;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the downstream indexer's refresh API.
#[derive(Debug, Clone)]
pub struct IndexerClient {
    client: Client,
    config: IndexerConfig,
}

impl IndexerClient {
    #[must_use]
    pub fn new(config: IndexerConfig) -> Self {
        let client = Client::builder()
            .timeout(CONNECTION_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to build indexer HTTP client, using defaults");
                Client::new()
            });
        Self { client, config }
    }

    /// Group `changed_paths` by [`LibraryKind`], rewrite each through the
    /// configured path mappings, and notify the indexer once per kind that
    /// has at least one changed file. Returns the kinds successfully
    /// notified; a per-kind failure is logged and skipped, never returned
    /// as a hard error, so one indexer hiccup doesn't mask the rest.
    pub async fn notify_batch(&self, changed_paths: &[PathBuf]) -> Vec<LibraryKind> {
        if !self.config.indexer_enabled {
            return Vec::new();
        }

        let mut by_kind: HashMap<LibraryKind, Vec<PathBuf>> = HashMap::new();
        for path in changed_paths {
            if let Some(kind) = LibraryKind::infer_from_path(path) {
                let rewritten = mapping::rewrite(path, &self.config.path_mappings);
                by_kind.entry(kind).or_default().push(rewritten);
            }
        }

        let mut notified = Vec::new();
        for (kind, paths) in by_kind {
            match self.refresh(kind, &paths).await {
                Ok(()) => notified.push(kind),
                Err(e) => tracing::warn!(%kind, error = %e, "indexer notification failed"),
            }
        }
        notified
    }

    /// Trigger a refresh for one library kind covering `paths`.
    async fn refresh(&self, kind: LibraryKind, paths: &[PathBuf]) -> Result<()> {
        let Some(url) = &self.config.indexer_url else {
            return Err(Error::IndexerNotifyFailed {
                message: "indexer_enabled is true but indexer_url is not set".to_string(),
            });
        };
        let Some(token) = &self.config.indexer_token else {
            return Err(Error::IndexerNotifyFailed {
                message: "indexer_enabled is true but indexer_token is not set".to_string(),
            });
        };

        let body = RefreshRequest {
            library: kind.to_string(),
            paths: paths.iter().map(|p| p.display().to_string()).collect(),
            smart_scan: self.config.indexer_smart_scan,
            force_thorough_refresh: self.config.indexer_force_thorough_refresh,
        };

        let response = self
            .client
            .post(format!("{}/api/library/refresh", url.trim_end_matches('/')))
            .header("X-Api-Token", token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::IndexerNotifyFailed { message: e.to_string() })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::IndexerNotifyFailed {
                message: format!("indexer returned {status}: {text}"),
            });
        }

        Ok(())
    }

    /// Probe the indexer's reachability without triggering a refresh.
    pub async fn test_connection(&self) -> bool {
        let Some(url) = &self.config.indexer_url else {
            return false;
        };
        let Some(token) = &self.config.indexer_token else {
            return false;
        };

        self.client
            .get(format!("{}/api/system/status", url.trim_end_matches('/')))
            .header("X-Api-Token", token)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, serde::Serialize)]
struct RefreshRequest {
    library: String,
    paths: Vec<String>,
    smart_scan: bool,
    force_thorough_refresh: bool,
}

/// Convenience used by callers that already have a single path and just
/// want its inferred library kind rewritten, without going through the
/// batching path (e.g. a `--file` single-file run).
#[must_use]
pub fn rewrite_for_indexer(path: &Path, config: &IndexerConfig) -> PathBuf {
    mapping::rewrite(path, &config.path_mappings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mb_core::config::PathMapping;

    fn config() -> IndexerConfig {
        IndexerConfig {
            indexer_url: Some("http://indexer.local".to_string()),
            indexer_token: Some("secret".to_string()),
            indexer_enabled: true,
            indexer_smart_scan: true,
            indexer_force_thorough_refresh: false,
            path_mappings: vec![PathMapping {
                source_prefix: PathBuf::from("/data"),
                indexer_prefix: PathBuf::from("/media"),
            }],
        }
    }

    #[tokio::test]
    async fn disabled_config_notifies_nothing() {
        let mut cfg = config();
        cfg.indexer_enabled = false;
        let client = IndexerClient::new(cfg);
        let notified = client.notify_batch(&[PathBuf::from("/data/tv/Show/ep.mkv")]).await;
        assert!(notified.is_empty());
    }

    #[tokio::test]
    async fn missing_url_surfaces_as_failed_refresh() {
        let mut cfg = config();
        cfg.indexer_url = None;
        let client = IndexerClient::new(cfg);
        let err = client
            .refresh(LibraryKind::Tv, &[PathBuf::from("/media/tv/Show/ep.mkv")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IndexerNotifyFailed { .. }));
    }

    #[test]
    fn rewrite_for_indexer_applies_mapping() {
        let cfg = config();
        let rewritten = rewrite_for_indexer(Path::new("/data/movies/Movie/movie.mkv"), &cfg);
        assert_eq!(rewritten, PathBuf::from("/media/movies/Movie/movie.mkv"));
    }
}
