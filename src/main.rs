use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use photodex::config::Config;
use photodex::db::PhotoStore;
use photodex::embed::ClipEmbedder;
use photodex::logging;
use photodex::pipeline::{CycleOutcome, Orchestrator};
use photodex::scanner::{LibraryScanner, ScanProgress};
use photodex::source::FsMediaSource;

struct CliArgs {
    config_path: Option<PathBuf>,
    source_root: Option<PathBuf>,
    once: bool,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        source_root: None,
        once: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("photodex {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    cli.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--source" | "-s" => {
                if i + 1 < args.len() {
                    cli.source_root = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --source requires a path argument");
                    std::process::exit(1);
                }
            }
            "--once" | "-1" => {
                cli.once = true;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn print_help() {
    println!(
        r#"photodex - on-device photo indexing pipeline

USAGE:
    photodex [OPTIONS]

OPTIONS:
    --config, -c PATH   Path to config file
    --source, -s PATH   Photo library root (overrides config)
    --once, -1          Run a single pipeline cycle and exit
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PHOTODEX_CONFIG     Path to config file (overrides default location)
    PHOTODEX_LOG        Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/photodex/config.toml

See also: photodex-daemon --help"#
    );
}

fn main() -> Result<()> {
    let cli = parse_args();

    let _ = logging::init(Some(Config::config_dir().join("logs")));

    let mut config = match cli.config_path {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(root) = cli.source_root {
        config.source.root = root;
    }

    let store = Arc::new(PhotoStore::open(&config.db_path)?);
    let embedder = Arc::new(ClipEmbedder::new(config.model.clone()));
    let scanner = LibraryScanner::new(
        Arc::clone(&store),
        config.source.page_size,
        config.indexing.page_pause(),
    );
    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        embedder,
        scanner,
        config.indexing.workers,
        config.indexing.batch_size,
    );
    let source = FsMediaSource::new(
        config.source.root.clone(),
        config.source.image_extensions.clone(),
    );

    tracing::info!(root = %config.source.root.display(), "indexing photo library");

    let on_progress = |p: ScanProgress| {
        let fraction = if p.total > 0 {
            (p.scanned as f64 / p.total as f64).min(1.0)
        } else {
            0.0
        };
        tracing::info!(
            scanned = p.scanned,
            total = p.total,
            "scan progress: {:.0}%",
            fraction * 100.0
        );
    };

    loop {
        let outcome = orchestrator.run_cycle(&source, Some(&on_progress))?;
        let counts = store.status_counts()?;
        tracing::info!(
            indexed = counts.indexed,
            total = counts.total,
            scan_complete = counts.scan_complete,
            "cycle finished"
        );

        match outcome {
            CycleOutcome::Idle => {
                tracing::info!("pipeline idle, nothing left to index");
                break;
            }
            CycleOutcome::MoreWork | CycleOutcome::Busy => {
                if cli.once {
                    break;
                }
            }
        }
    }

    Ok(())
}
