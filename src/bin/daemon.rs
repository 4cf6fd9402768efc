//! Photodex daemon for periodic background indexing.
//!
//! The daemon periodically runs one pipeline cycle: completing the initial
//! library scan if needed, then one batch of embedding generation. It shares
//! the SQLite database with the foreground CLI, so the two can interleave
//! freely; the orchestrator's reentrancy guard keeps batches from being
//! double-processed.
//!
//! Each tick reports a fetch-style result: `no-data` when the pipeline was
//! idle, `new-data` when work was done, `failed` when the cycle errored.
//!
//! ## Usage
//!
//! ```bash
//! photodex-daemon              # Run in foreground
//! photodex-daemon --once       # Run one cycle and exit
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};

use photodex::config::Config;
use photodex::db::PhotoStore;
use photodex::embed::ClipEmbedder;
use photodex::logging;
use photodex::pipeline::{CycleOutcome, Orchestrator};
use photodex::scanner::LibraryScanner;
use photodex::source::FsMediaSource;

/// Result vocabulary of one background trigger invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchResult {
    NoData,
    NewData,
    Failed,
}

impl fmt::Display for FetchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchResult::NoData => f.write_str("no-data"),
            FetchResult::NewData => f.write_str("new-data"),
            FetchResult::Failed => f.write_str("failed"),
        }
    }
}

struct DaemonArgs {
    /// Poll interval override in seconds.
    poll_interval: Option<u64>,
    once: bool,
    config_path: Option<PathBuf>,
}

fn parse_args() -> DaemonArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut daemon = DaemonArgs {
        poll_interval: None,
        once: false,
        config_path: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--once" | "-1" => {
                daemon.once = true;
            }
            "--interval" | "-i" => {
                if i + 1 < args.len() {
                    if let Ok(interval) = args[i + 1].parse() {
                        daemon.poll_interval = Some(interval);
                    }
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    daemon.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    daemon
}

fn print_help() {
    println!(
        r#"photodex-daemon - Background indexing for photodex

USAGE:
    photodex-daemon [OPTIONS]

OPTIONS:
    --once, -1          Run one pipeline cycle and exit
    --interval, -i N    Poll interval in seconds (default: from config)
    --config, -c PATH   Path to config file
    --help, -h          Show this help message

ENVIRONMENT:
    PHOTODEX_CONFIG     Path to config file (overrides default location)
    PHOTODEX_LOG        Log level (trace, debug, info, warn, error)

Each tick runs one pipeline cycle: the initial library scan if it has not
completed, then one batch of embedding generation. Once the pipeline
reports no pending work, ticks become cheap no-ops."#
    );
}

fn main() -> Result<()> {
    let args = parse_args();

    let _ = logging::init(Some(Config::config_dir().join("logs")));

    info!("photodex daemon starting");

    let config = match args.config_path {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let poll_interval = args.poll_interval.unwrap_or(config.daemon.poll_interval);

    let store = Arc::new(PhotoStore::open(&config.db_path)?);
    info!(db = %config.db_path.display(), "database opened");

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

    if args.once {
        info!("running in single-shot mode");
        let result = run_tick(&orchestrator, &source);
        info!(result = %result, "tick finished");
    } else {
        info!(poll_interval, "running in daemon mode");
        loop {
            let result = run_tick(&orchestrator, &source);
            info!(result = %result, "tick finished");
            thread::sleep(Duration::from_secs(poll_interval));
        }
    }

    info!("photodex daemon stopped");
    Ok(())
}

fn run_tick(orchestrator: &Orchestrator, source: &FsMediaSource) -> FetchResult {
    match orchestrator.run_cycle(source, None) {
        Ok(CycleOutcome::Idle) => FetchResult::NoData,
        Ok(CycleOutcome::Busy) => FetchResult::NoData,
        Ok(CycleOutcome::MoreWork) => FetchResult::NewData,
        Err(e) => {
            error!(error = %e, "cycle failed");
            FetchResult::Failed
        }
    }
}
