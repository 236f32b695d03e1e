use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use mb_core::config::Config;
use mb_core::MediaTypeFilter;
use mb_rules::DecisionFlags;
use mediabox::cli::{Cli, Commands};
use mediabox::Orchestrator;
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediabox=trace,mb_core=debug,mb_probe=debug,mb_rules=debug,mb_filter=debug,mb_exec=debug,mb_notify=debug".to_string()
        } else {
            "mediabox=info,mb_exec=info".to_string()
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&env_filter))
        .init();

    let exit_code = run(cli);
    std::process::exit(exit_code);
}

/// Dispatch on the parsed CLI, returning the process exit code per §6's
/// contract (`0` success, `1` usage/path error, `2` configuration error).
fn run(cli: Cli) -> i32 {
    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return e.exit_code();
        }
    };
    if let Some(kind) = config.adapt_for_container() {
        tracing::info!(?kind, "running under container layout");
    }

    match cli.command {
        Some(Commands::Probe { file, json }) => probe_file(&file, json, &config),
        Some(Commands::CheckTools) => check_tools(&config),
        Some(Commands::Validate { config: path }) => validate_config(path.or(cli.config)),
        Some(Commands::Version) => {
            println!("mediabox {}", env!("CARGO_PKG_VERSION"));
            0
        }
        None => run_batch(cli, &mut config),
    }
}

fn run_batch(cli: Cli, config: &mut Config) -> i32 {
    let (dir, file) = match resolve_targets(cli.dir, cli.file) {
        Ok(targets) => targets,
        Err(message) => {
            eprintln!("{message}");
            return 1;
        }
    };

    let warnings = config.validate();
    for w in &warnings {
        tracing::warn!("{w}");
    }

    let media_type: MediaTypeFilter = cli.r#type.into();
    let flags = DecisionFlags {
        force_stereo: cli.force_stereo,
        downgrade_resolution: cli.downgrade_resolution,
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return 1;
        }
    };

    rt.block_on(async move {
        let orchestrator = Orchestrator::new(config.clone());
        let cancel = Arc::new(Notify::new());
        spawn_signal_watcher(cancel.clone());

        match orchestrator
            .run(dir.as_deref(), file.as_deref(), media_type, flags, cancel)
            .await
        {
            Ok(report) => {
                println!(
                    "processed {} file(s), skipped {}, failed {}",
                    report.processed, report.skipped, report.failed
                );
                if report.failed > 0 {
                    1
                } else {
                    0
                }
            }
            Err(e) => {
                eprintln!("batch aborted: {e}");
                e.exit_code()
            }
        }
    })
}

/// Use `dir`/`file` as given; if neither was provided, prompt interactively
/// (§6: "An interactive prompt is offered when no `--dir`/`--file` is
/// provided; in automation that path is never taken").
fn resolve_targets(
    dir: Option<PathBuf>,
    file: Option<PathBuf>,
) -> Result<(Option<PathBuf>, Option<PathBuf>), String> {
    if dir.is_some() || file.is_some() {
        return Ok((dir, file));
    }

    print!("No --dir or --file given. Enter a path to process: ");
    std::io::stdout().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|e| format!("failed to read input: {e}"))?;
    let path = PathBuf::from(line.trim());

    if path.is_dir() {
        Ok((Some(path), None))
    } else if path.is_file() {
        Ok((None, Some(path)))
    } else {
        Err(format!("path does not exist: {}", path.display()))
    }
}

/// Spawn a task that resolves `cancel` on `SIGINT`/`SIGTERM` (§4.9, §5).
fn spawn_signal_watcher(cancel: Arc<Notify>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::warn!("interrupt received, cleaning up current file");
        cancel.notify_one();
    });
}

fn probe_file(file: &Path, json: bool, config: &Config) -> i32 {
    if !file.exists() {
        eprintln!("file does not exist: {}", file.display());
        return 1;
    }

    let ffprobe_tool = config
        .venv_path
        .join("bin")
        .join("ffprobe");
    let ffprobe_tool = if ffprobe_tool.is_file() {
        ffprobe_tool
    } else {
        PathBuf::from("ffprobe")
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return 1;
        }
    };

    let probe = rt.block_on(async { mb_probe::ProbeAdapter::new(ffprobe_tool).probe(file).await });

    let probe = match probe {
        Ok(probe) => probe,
        Err(e) => {
            eprintln!("probe failed: {e}");
            return 1;
        }
    };

    if json {
        match serde_json::to_string_pretty(&probe) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("failed to serialize probe: {e}");
                return 1;
            }
        }
        return 0;
    }

    println!("File: {}", file.display());
    println!("Container: {}", probe.format.container_name);
    if let Some(duration) = probe.format.duration_secs {
        println!("Duration: {:.1}s", duration);
    }

    println!("\nVideo streams: {}", probe.video_streams().len());
    for v in probe.video_streams() {
        let hdr = mb_probe::hdr::detect(&v);
        print!("  [{}] {} {}x{}", v.index, v.codec, v.width, v.height);
        if hdr.is_hdr {
            print!(" ({})", hdr.kind);
        }
        println!();
    }

    println!("\nAudio streams: {}", probe.audio_streams().len());
    for a in probe.audio_streams() {
        print!("  [{}] {} {}ch ({})", a.index, a.codec, a.channels, a.language);
        if let Some(title) = a.title {
            print!(" \"{title}\"");
        }
        println!();
    }

    println!("\nSubtitle streams: {}", probe.subtitle_streams().len());
    for s in probe.subtitle_streams() {
        println!(
            "  [{}] {} ({}){}",
            s.index,
            s.codec,
            s.language,
            if s.forced { " [forced]" } else { "" }
        );
    }

    0
}

fn check_tools(config: &Config) -> i32 {
    let ffmpeg = resolve_for_check(&config.venv_path, "ffmpeg");
    let ffprobe = resolve_for_check(&config.venv_path, "ffprobe");

    println!("Checking external tools...\n");

    let ffmpeg_ok = which::which(&ffmpeg).is_ok() || ffmpeg.is_file();
    let ffprobe_ok = which::which(&ffprobe).is_ok() || ffprobe.is_file();

    print_tool_status("ffmpeg", &ffmpeg, ffmpeg_ok);
    print_tool_status("ffprobe", &ffprobe, ffprobe_ok);

    if ffmpeg_ok {
        let capability = mb_rules::capability::detect_default(&ffmpeg);
        println!(
            "\nEncoder capability: hardware (VAAPI) = {}, software (libx264) = {}",
            capability.hardware_available, capability.software_available
        );
    }

    if ffmpeg_ok && ffprobe_ok {
        println!("\nAll required tools are available!");
        0
    } else {
        println!("\nSome tools are missing. Install ffmpeg/ffprobe or set venv_path.");
        1
    }
}

fn resolve_for_check(venv_path: &Path, name: &str) -> PathBuf {
    let candidate = venv_path.join("bin").join(name);
    if candidate.is_file() {
        candidate
    } else {
        PathBuf::from(name)
    }
}

fn print_tool_status(name: &str, path: &Path, ok: bool) {
    let status = if ok { "OK" } else { "MISSING" };
    println!("[{status:>7}] {name} - {}", path.display());
}

fn validate_config(path: Option<PathBuf>) -> i32 {
    match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config = match Config::load(Some(&p)) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("{e}");
                    return e.exit_code();
                }
            };
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid");
            } else {
                for w in &warnings {
                    println!("  Warning: {w}");
                }
            }
            print_config_summary(&config);
            0
        }
        None => {
            println!("No config file specified, using defaults");
            print_config_summary(&Config::default());
            0
        }
    }
}

fn print_config_summary(config: &Config) {
    println!("  venv_path: {}", config.venv_path.display());
    println!(
        "  library_dirs: tv={:?} movies={:?} music={:?} misc={:?}",
        config.library_dirs.tv,
        config.library_dirs.movies,
        config.library_dirs.music,
        config.library_dirs.misc
    );
    println!(
        "  indexer: enabled={} url={:?}",
        config.indexer.indexer_enabled, config.indexer.indexer_url
    );
}
