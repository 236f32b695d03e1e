//! Engine configuration (§6: External Interfaces — Configuration).
//!
//! Loaded at startup from a TOML file; every field has a sane default so
//! omitting a key degrades gracefully. A config path that is given but
//! cannot be read or parsed is treated as an operator mistake and rejected
//! outright via [`crate::Error::ConfigInvalid`], rather than silently
//! falling back to defaults. [`Config::validate`] covers everything else —
//! non-fatal warnings about a config that parses fine but is incomplete
//! (e.g. no library directories at all).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Path used to locate the bundled encoder tooling (ffmpeg/ffprobe).
    pub venv_path: PathBuf,
    /// Informational list of download directories (not scanned directly).
    pub download_dirs: Vec<PathBuf>,
    /// Library root directories keyed by kind.
    pub library_dirs: LibraryDirs,
    /// Downstream library indexer settings.
    pub indexer: IndexerConfig,
}

/// Library root directories, one per kind (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LibraryDirs {
    pub tv: Option<PathBuf>,
    pub movies: Option<PathBuf>,
    pub music: Option<PathBuf>,
    pub misc: Option<PathBuf>,
}

/// Downstream indexer configuration, including the prefix-mapping table
/// referenced in the specification's Design Notes (the host→indexer path
/// mapping, made configurable rather than hard-coded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub indexer_url: Option<String>,
    pub indexer_token: Option<String>,
    pub indexer_enabled: bool,
    pub indexer_smart_scan: bool,
    pub indexer_force_thorough_refresh: bool,
    /// `{source_prefix -> indexer_prefix}`, applied in declaration order,
    /// first match wins.
    pub path_mappings: Vec<PathMapping>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            indexer_url: None,
            indexer_token: None,
            indexer_enabled: true,
            indexer_smart_scan: true,
            indexer_force_thorough_refresh: true,
            path_mappings: Vec::new(),
        }
    }
}

/// One entry of the host-path-to-indexer-path rewrite table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathMapping {
    pub source_prefix: PathBuf,
    pub indexer_prefix: PathBuf,
}

impl Config {
    /// Parse a config from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::ConfigInvalid(format!("invalid config TOML: {e}")))
    }

    /// Load config from `path`, falling back to defaults when `path` is
    /// `None`. Propagates I/O and parse failures rather than silently
    /// defaulting, because a named config path that cannot be read is
    /// almost always an operator mistake worth surfacing (§7: `ConfigInvalid`
    /// is fatal at startup).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigInvalid(format!("failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    /// Non-fatal warnings about this configuration. An empty result does
    /// not guarantee the config is fully usable for every mode (a
    /// `--dir`-only run doesn't need `indexer_token`, for instance) — it
    /// only flags the checks that are universally meaningful.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.library_dirs.tv.is_none()
            && self.library_dirs.movies.is_none()
            && self.library_dirs.music.is_none()
            && self.library_dirs.misc.is_none()
        {
            warnings.push("no library directories configured".to_string());
        }

        if self.indexer.indexer_enabled && self.indexer.indexer_url.is_none() {
            warnings.push("indexer_enabled is true but indexer_url is not set".to_string());
        }

        if self.indexer.indexer_enabled && self.indexer.indexer_token.is_none() {
            warnings.push("indexer_enabled is true but indexer_token is not set".to_string());
        }

        for (key, dir) in [
            ("tv", &self.library_dirs.tv),
            ("movies", &self.library_dirs.movies),
            ("music", &self.library_dirs.music),
            ("misc", &self.library_dirs.misc),
        ] {
            if let Some(dir) = dir {
                if !dir.exists() {
                    warnings.push(format!("library directory '{key}' does not exist: {}", dir.display()));
                }
            }
        }

        warnings
    }

    /// Detect whether we are running inside the fixed container layout
    /// (the script lives under `/scripts`) and, if so, which upstream
    /// integration (sonarr/radarr/lidarr) mounted which library directory.
    #[must_use]
    pub fn detect_container_environment() -> Option<ContainerKind> {
        if !Path::new("/scripts").is_dir() {
            return None;
        }
        let tv = Path::new("/tv").exists();
        let movies = Path::new("/movies").exists();
        let music = Path::new("/music").exists();
        Some(match (tv, movies, music) {
            (true, false, false) => ContainerKind::Sonarr,
            (false, true, false) => ContainerKind::Radarr,
            (false, false, true) => ContainerKind::Lidarr,
            _ => ContainerKind::Unknown,
        })
    }

    /// Rewrite `venv_path`, `library_dirs`, and `download_dirs` to the fixed
    /// container mount points when running under the container layout.
    /// No-op on a host install.
    pub fn adapt_for_container(&mut self) -> Option<ContainerKind> {
        let kind = Self::detect_container_environment()?;

        self.venv_path = PathBuf::from("/scripts/.venv");
        self.library_dirs = LibraryDirs {
            tv: Some(PathBuf::from("/tv")),
            movies: Some(PathBuf::from("/movies")),
            music: Some(PathBuf::from("/music")),
            misc: Some(PathBuf::from("/misc")),
        };
        self.download_dirs = vec![
            PathBuf::from("/downloads/completed"),
            PathBuf::from("/downloads/incomplete"),
        ];

        tracing::debug!(?kind, "adapted configuration for container environment");
        Some(kind)
    }
}

/// Which upstream *arr integration this container instance serves, inferred
/// from which single library directory is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Sonarr,
    Radarr,
    Lidarr,
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_indexer_enabled() {
        let config = Config::default();
        assert!(config.indexer.indexer_enabled);
        assert!(config.indexer.indexer_smart_scan);
        assert!(config.indexer.indexer_force_thorough_refresh);
    }

    #[test]
    fn validate_warns_on_missing_library_dirs() {
        let config = Config::default();
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("no library directories")));
    }

    #[test]
    fn validate_warns_on_indexer_without_url() {
        let mut config = Config::default();
        config.library_dirs.movies = Some(PathBuf::from("/tmp"));
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("indexer_url")));
        assert!(warnings.iter().any(|w| w.contains("indexer_token")));
    }

    #[test]
    fn from_toml_round_trip() {
        let toml_str = r#"
            venv_path = "/opt/mediabox/.venv"

            [library_dirs]
            movies = "/data/movies"

            [indexer]
            indexer_url = "http://indexer.local"
            indexer_token = "secret"
        "#;
        let config = Config::from_toml(toml_str).unwrap();
        assert_eq!(config.venv_path, PathBuf::from("/opt/mediabox/.venv"));
        assert_eq!(config.library_dirs.movies, Some(PathBuf::from("/data/movies")));
        assert_eq!(config.indexer.indexer_url.as_deref(), Some("http://indexer.local"));
    }

    #[test]
    fn load_with_no_path_returns_default() {
        let config = Config::load(None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_missing_path_is_config_invalid() {
        let err = Config::load(Some(Path::new("/nonexistent/mediabox.toml"))).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[test]
    fn detect_container_environment_absent_on_host() {
        // In the test environment /scripts should not exist.
        if !Path::new("/scripts").is_dir() {
            assert_eq!(Config::detect_container_environment(), None);
        }
    }
}
