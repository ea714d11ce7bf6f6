//! On-call roster viewer.
//!
//! Shows the contact roster from the freshest source available - local
//! cache, published snapshot, or the live spreadsheet backend - and keeps
//! working offline from the cache.

mod render;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use roster_core::resolver::Resolution;
use roster_core::schedule::BoardLoader;
use roster_core::{CacheManager, Config, FileStore, HttpSource, SourceResolver};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use render::{TerminalBoardObserver, TerminalObserver};

const USAGE: &str = "\
Usage: oncall-roster [OPTIONS]

Options:
  --today           Show today's on-call board instead of the contact roster
  --watch <SECS>    Re-check the sources every SECS seconds
  --clear-cache     Remove the cached roster and exit
  -h, --help        Print this help";

/// Set to a directory to also write daily-rolling log files there.
const ENV_LOG_DIR: &str = "ONCALL_LOG_DIR";

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    today: bool,
    watch: Option<u64>,
    clear_cache: bool,
    help: bool,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--today" => parsed.today = true,
            "--clear-cache" => parsed.clear_cache = true,
            "-h" | "--help" => parsed.help = true,
            "--watch" => {
                let secs = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--watch needs a number of seconds"))?;
                let secs: u64 = secs
                    .parse()
                    .with_context(|| format!("Invalid --watch interval: {}", secs))?;
                if secs == 0 {
                    anyhow::bail!("--watch interval must be at least 1 second");
                }
                parsed.watch = Some(secs);
            }
            other => anyhow::bail!("Unknown argument: {}\n\n{}", other, USAGE),
        }
    }
    Ok(parsed)
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "oncall-roster.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&argv)?;
    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }

    let _log_guard = init_tracing();
    info!("oncall-roster starting");

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };

    let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
    let store = Arc::new(FileStore::new(cache_dir)?);
    let cache = CacheManager::with_roster_key(store, &config.cache_key);

    if args.clear_cache {
        cache.clear_roster()?;
        println!("Cached roster cleared.");
        return Ok(());
    }

    let snapshot = HttpSource::new("snapshot", &config.snapshot_url, config.request_timeout())?;
    let live = snapshot.sibling("live", &config.contacts_url());

    if args.today {
        let timetable = snapshot.sibling("timetable", &config.timetable_url());
        let loader = BoardLoader::new(timetable, live, cache)
            .with_loading_timeout(config.loading_timeout());
        let mut observer = TerminalBoardObserver::default();
        if let Err(e) = loader.load(&mut observer).await {
            warn!(error = %e, "No on-call board available");
        }
        return Ok(());
    }

    let resolver = SourceResolver::new(cache, Arc::new(snapshot), Arc::new(live))
        .with_loading_timeout(config.loading_timeout());

    let Some(interval) = args.watch else {
        let mut observer = TerminalObserver::default();
        if resolver.resolve(&mut observer).await == Resolution::Exhausted {
            anyhow::bail!("No roster source available");
        }
        return Ok(());
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    loop {
        ticker.tick().await;
        let mut observer = TerminalObserver::default();
        let resolution = resolver.resolve(&mut observer).await;
        info!(?resolution, next_in_secs = interval, "Watch pass complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_defaults() {
        assert_eq!(parse_args(&[]).unwrap(), Args::default());
    }

    #[test]
    fn test_parse_args_flags() {
        let parsed = parse_args(&args(&["--today", "--watch", "30"])).unwrap();
        assert!(parsed.today);
        assert_eq!(parsed.watch, Some(30));
    }

    #[test]
    fn test_parse_args_rejects_bad_input() {
        assert!(parse_args(&args(&["--watch"])).is_err());
        assert!(parse_args(&args(&["--watch", "0"])).is_err());
        assert!(parse_args(&args(&["--watch", "soon"])).is_err());
        assert!(parse_args(&args(&["--verbose"])).is_err());
    }
}
