//! smart-tabs daemon entrypoint.
//!
//! Polls kitty for its tabs and keeps every tab's title and color matched to
//! its working directory and foreground command. One instance per user,
//! enforced by a pid lock in the runtime directory.

use clap::Parser;
use smart_tabs_core::{Config, CwdStore, InstanceLock, Reconciler, StorageConfig};
use std::env;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod poll_loop;
mod signals;

use poll_loop::PollLoop;

const DEBUG_ENV: &str = "SMART_TABS_DEBUG";

#[derive(Parser)]
#[command(name = "smart-tabs-daemon")]
#[command(about = "Colors and titles kitty tabs by working directory")]
#[command(version)]
struct Cli {
    /// Verbose logging to ~/.config/kitty/smart_tabs_daemon.log
    #[arg(long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();
    let debug = cli.debug || debug_env_enabled();

    let storage = match StorageConfig::from_env() {
        Ok(storage) => storage,
        Err(err) => {
            eprintln!("smart-tabs-daemon: {}", err);
            std::process::exit(1);
        }
    };
    let _logging_guard = init_logging(debug, &storage.daemon_log_file());

    if let Err(err) = signals::install() {
        warn!(error = %err, "Failed to install signal handlers");
    }

    if let Err(err) = storage.ensure_runtime_root() {
        error!(error = %err, "Failed to prepare runtime directory");
        eprintln!("smart-tabs-daemon: {}", err);
        std::process::exit(1);
    }

    let mut lock = match InstanceLock::acquire(&storage.lock_file()) {
        Ok(lock) => lock,
        Err(err) => {
            error!(error = %err, "Failed to acquire daemon lock");
            eprintln!("smart-tabs-daemon: {}", err);
            std::process::exit(1);
        }
    };

    let config = Config::load(&storage.config_file());
    info!(
        pid = std::process::id(),
        lock = %lock.path().display(),
        base_interval_ms = config.poll.base_interval.as_millis() as u64,
        palette_size = config.palette.len(),
        "smart-tabs daemon started"
    );

    let tuning = config.poll.clone();
    let store = CwdStore::new(storage.clone());
    let mut reconciler = Reconciler::with_kitty(config, storage);
    let mut poll_loop = PollLoop::new(&tuning, signals::shutdown_flag());
    let cycles = poll_loop.run(|| reconciler.reconcile_all(debug));

    let stats = store.cleanup();
    lock.release();
    info!(
        cycles,
        records_removed = stats.records_removed,
        temp_files_removed = stats.temp_files_removed,
        "smart-tabs daemon stopped"
    );
}

fn debug_env_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

/// Debug mode logs everything to the fixed log file; otherwise `RUST_LOG`
/// (default `info`) goes to stderr.
fn init_logging(debug: bool, log_file: &Path) -> Option<WorkerGuard> {
    if !debug {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return None;
    }

    let (Some(dir), Some(file_name)) = (log_file.parent(), log_file.file_name()) else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .init();
        return None;
    };
    if let Err(err) = fs_err::create_dir_all(dir) {
        eprintln!("smart-tabs-daemon: cannot create log directory: {}", err);
    }

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}
