//! File logging for the hook.
//!
//! The hook runs inside the user's shell prompt, so diagnostics never go to the
//! terminal. Events land in `~/.config/kitty/smart_tabs_hook.log`: `warn` and
//! above by default, everything with `SMART_TABS_DEBUG=1`.

use smart_tabs_core::StorageConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEBUG_ENV: &str = "SMART_TABS_DEBUG";

pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

/// Returns `None` when no log location is available; events are then dropped.
pub fn init(force_debug: bool) -> Option<WorkerGuard> {
    let storage = StorageConfig::from_env().ok()?;
    let log_file = storage.hook_log_file();
    let dir = log_file.parent()?;
    let file_name = log_file.file_name()?;
    fs_err::create_dir_all(dir).ok()?;

    let level = if force_debug || debug_enabled() {
        "debug"
    } else {
        "warn"
    };
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .ok()?;
    Some(guard)
}
