//! Storage configuration and path management for smart-tabs.
//!
//! Every path the daemon and the shell hook touch is decided here, so the two
//! processes always agree on where side-channel records and the lock live.
//!
//! ## Layout
//!
//! ```text
//! $XDG_RUNTIME_DIR/kitty-smart-tabs/     (fallback: ~/.cache/kitty-smart-tabs/)
//! ├── tab_<id>_cwd                       per-tab working directory record
//! ├── tab_<id>_<random>.tmp              in-flight write, renamed over the record
//! └── daemon.pid                         single-instance lock
//!
//! ~/.config/kitty/
//! ├── smart_tabs.conf                     user configuration
//! ├── smart_tabs_daemon.log              daemon debug log
//! └── smart_tabs_hook.log                hook diagnostics
//! ```
//!
//! Tests use `StorageConfig::with_root(temp_dir)` for isolation.

use crate::error::{Result, TabsError};
use fs_err as fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const RUNTIME_DIR_NAME: &str = "kitty-smart-tabs";
const CONFIG_ENV: &str = "SMART_TABS_CONFIG";
const CONFIG_FILE_NAME: &str = "smart_tabs.conf";
const LOCK_FILE_NAME: &str = "daemon.pid";
const DAEMON_LOG_NAME: &str = "smart_tabs_daemon.log";
const HOOK_LOG_NAME: &str = "smart_tabs_hook.log";
const OWNER_ONLY_DIR: u32 = 0o700;

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding side-channel records and the lock file.
    runtime_root: PathBuf,
    /// Directory holding the config file and logs (default: ~/.config/kitty)
    config_dir: PathBuf,
}

impl StorageConfig {
    /// Resolves paths for the current user.
    ///
    /// The runtime root prefers `$XDG_RUNTIME_DIR`, which is private to the
    /// user and cleared on logout; without it, a directory under `~/.cache`
    /// is used instead of a shared temp directory.
    pub fn from_env() -> Result<Self> {
        let home = dirs::home_dir().ok_or(TabsError::HomeDirNotFound)?;
        let runtime_root = match dirs::runtime_dir().filter(|dir| dir.is_dir()) {
            Some(dir) => dir.join(RUNTIME_DIR_NAME),
            None => home.join(".cache").join(RUNTIME_DIR_NAME),
        };
        Ok(Self {
            runtime_root,
            config_dir: home.join(".config").join("kitty"),
        })
    }

    /// Creates a StorageConfig rooted in a custom directory.
    /// Used for testing with temp directories.
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            runtime_root: root.join(RUNTIME_DIR_NAME),
            config_dir: root.join("config"),
        }
    }

    pub fn runtime_root(&self) -> &Path {
        &self.runtime_root
    }

    /// Returns the runtime root, creating it if needed.
    ///
    /// Permissions are re-asserted to owner-only on every call; a directory
    /// someone loosened after creation is tightened again before use.
    pub fn ensure_runtime_root(&self) -> Result<&Path> {
        fs::create_dir_all(&self.runtime_root)
            .map_err(|err| TabsError::io("create runtime directory", err))?;
        fs::set_permissions(
            &self.runtime_root,
            std::fs::Permissions::from_mode(OWNER_ONLY_DIR),
        )
        .map_err(|err| TabsError::io("restrict runtime directory", err))?;
        Ok(&self.runtime_root)
    }

    /// Path to the side-channel record for a tab.
    pub fn cwd_record(&self, tab_id: u32) -> PathBuf {
        self.runtime_root.join(format!("tab_{}_cwd", tab_id))
    }

    /// Path to the single-instance lock file.
    pub fn lock_file(&self) -> PathBuf {
        self.runtime_root.join(LOCK_FILE_NAME)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path to the user configuration file. `SMART_TABS_CONFIG` overrides it.
    pub fn config_file(&self) -> PathBuf {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => self.config_dir.join(CONFIG_FILE_NAME),
        }
    }

    pub fn daemon_log_file(&self) -> PathBuf {
        self.config_dir.join(DAEMON_LOG_NAME)
    }

    pub fn hook_log_file(&self) -> PathBuf {
        self.config_dir.join(HOOK_LOG_NAME)
    }
}
