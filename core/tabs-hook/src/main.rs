//! smart-tabs-hook: shell integration and one-shot CLI for smart-tabs.
//!
//! ## Subcommands
//!
//! - `cwd`: Record a tab's working directory (called by shell prompt hooks)
//! - `update`: Run a single reconciliation cycle without the daemon
//! - `cleanup`: Remove every cwd record from the runtime directory

mod cwd;
mod logging;

use clap::{Parser, Subcommand};
use smart_tabs_core::{Config, CwdStore, Reconciler, StorageConfig};

#[derive(Parser)]
#[command(name = "smart-tabs-hook")]
#[command(about = "Shell integration for smart-tabs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the working directory of a kitty tab
    Cwd {
        /// kitty tab id (positive integer)
        #[arg(value_name = "TAB_ID", allow_hyphen_values = true)]
        tab_id: String,

        /// Absolute path of the shell's current directory
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Update every tab once and exit
    Update {
        /// Log per-tab decisions to the hook log
        #[arg(long)]
        debug: bool,
    },

    /// Remove all cwd records and leftover temp files
    Cleanup,
}

fn main() {
    let cli = Cli::parse();
    let force_debug = matches!(cli.command, Commands::Update { debug: true });
    let _logging_guard = logging::init(force_debug);

    match cli.command {
        Commands::Cwd { tab_id, path } => {
            if let Err(e) = cwd::run(&tab_id, &path) {
                tracing::warn!(error = %e, tab_id = %tab_id, "smart-tabs-hook cwd failed");
                eprintln!("smart-tabs-hook: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Update { debug } => {
            let storage = match StorageConfig::from_env() {
                Ok(storage) => storage,
                Err(e) => {
                    tracing::error!(error = %e, "smart-tabs-hook update failed");
                    std::process::exit(1);
                }
            };
            let config = Config::load(&storage.config_file());
            let mut reconciler = Reconciler::with_kitty(config, storage);
            let changes = reconciler.reconcile_all(debug || logging::debug_enabled());
            tracing::debug!(changes, "One-shot update complete");
        }
        Commands::Cleanup => {
            let storage = match StorageConfig::from_env() {
                Ok(storage) => storage,
                Err(e) => {
                    eprintln!("smart-tabs-hook: {}", e);
                    std::process::exit(1);
                }
            };
            let stats = CwdStore::new(storage).cleanup();
            tracing::info!(
                records_removed = stats.records_removed,
                temp_files_removed = stats.temp_files_removed,
                "Cleaned up cwd records"
            );
            if !stats.errors.is_empty() {
                eprintln!("smart-tabs-hook: cleanup had {} failure(s)", stats.errors.len());
                std::process::exit(1);
            }
        }
    }
}
