//! Command-line surface (§6: External Interfaces).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use mb_core::MediaTypeFilter;

#[derive(Debug, Parser)]
#[command(name = "mediabox", version, about = "Automated media library normalizer")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Recurse over a directory.
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Process a single file.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Restrict which media types are processed.
    #[arg(long, value_enum, default_value_t = MediaType::Both)]
    pub r#type: MediaType,

    /// Force dialogue-stereo derivation even if an enhanced stereo track exists.
    #[arg(long)]
    pub force_stereo: bool,

    /// Cap video at 1080p and rewrite the output filename's resolution token.
    #[arg(long)]
    pub downgrade_resolution: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MediaType {
    Video,
    Audio,
    Both,
}

impl From<MediaType> for MediaTypeFilter {
    fn from(value: MediaType) -> Self {
        match value {
            MediaType::Video => MediaTypeFilter::Video,
            MediaType::Audio => MediaTypeFilter::Audio,
            MediaType::Both => MediaTypeFilter::Both,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Probe one file and print its `MediaProbe`.
    Probe {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Verify ffmpeg/ffprobe and the encoder capability probe.
    CheckTools,
    /// Parse and validate a config file (or the defaults) without running.
    Validate {
        config: Option<PathBuf>,
    },
    /// Print the engine version.
    Version,
}
