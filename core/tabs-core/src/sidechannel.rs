//! Per-tab working-directory records written by shell hooks.
//!
//! Shell hooks cannot talk to the daemon directly, so on every `cd` they run
//! `smart-tabs-hook cwd <tab_id> <path>`, which lands here. The daemon reads the
//! record back as the most trustworthy source for a tab's directory; kitty's
//! own `cwd` field lags behind when the shell changes directory.
//!
//! ## Record Format
//!
//! `<runtime_root>/tab_<id>_cwd` containing the absolute path, mode 0600.
//!
//! ## Write Protocol
//!
//! Writers create `tab_<id>_<random>.tmp` in the same directory, fill it, set
//! mode 0600, then rename it over the record. Rename is atomic within a
//! filesystem, so a concurrent reader sees the old record or the new one,
//! never a partial write. A failed write removes its temp file.
//!
//! ## Read Checks
//!
//! A record is ignored unless it is a regular file owned by the current user
//! with no group/other permission bits, and its content passes the same path
//! validation the writer applied. Every failure reads as "no record".

use crate::error::{Result, TabsError};
use crate::storage::StorageConfig;
use fs_err as fs;
use smart_tabs_protocol::{validate_cwd, validate_tab_id, MAX_CWD_BYTES};
use std::io::{Read, Write};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use tracing::{debug, warn};

const RECORD_PREFIX: &str = "tab_";
const RECORD_SUFFIX: &str = "_cwd";
const TEMP_SUFFIX: &str = ".tmp";
const OWNER_ONLY_FILE: u32 = 0o600;
const GROUP_OTHER_BITS: u32 = 0o077;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupStats {
    /// Number of `tab_<id>_cwd` records removed.
    pub records_removed: u32,
    /// Number of orphaned `.tmp` files from interrupted writes removed.
    pub temp_files_removed: u32,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CwdStore {
    storage: StorageConfig,
}

impl CwdStore {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    /// Atomically records `cwd` as the working directory of `tab_id`.
    pub fn write(&self, tab_id: i64, cwd: &str) -> Result<()> {
        let tab_id = validate_tab_id(tab_id)?;
        let cwd = validate_cwd(cwd)?;

        let root = self.storage.ensure_runtime_root()?;
        let target = self.storage.cwd_record(tab_id);

        let mut temp = tempfile::Builder::new()
            .prefix(&format!("{}{}_", RECORD_PREFIX, tab_id))
            .suffix(TEMP_SUFFIX)
            .tempfile_in(root)
            .map_err(|err| TabsError::io("create temp record", err))?;

        // From here on, dropping `temp` on an error path deletes the file.
        temp.write_all(cwd.as_bytes())
            .map_err(|err| TabsError::io("write temp record", err))?;
        temp.as_file()
            .sync_all()
            .map_err(|err| TabsError::io("sync temp record", err))?;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(OWNER_ONLY_FILE))
            .map_err(|err| TabsError::io("restrict temp record", err))?;
        temp.persist(&target)
            .map_err(|err| TabsError::io("commit cwd record", err.error))?;

        debug!(tab_id, cwd, "Wrote cwd record");
        Ok(())
    }

    /// Reads the working directory recorded for `tab_id`, if trustworthy.
    pub fn read(&self, tab_id: i64) -> Option<String> {
        let tab_id = validate_tab_id(tab_id).ok()?;
        if let Err(err) = self.storage.ensure_runtime_root() {
            debug!(tab_id, error = %err, "Storage root unavailable");
            return None;
        }
        let path = self.storage.cwd_record(tab_id);

        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                debug!(tab_id, error = %err, "Failed to stat cwd record");
                return None;
            }
        };

        if !metadata.file_type().is_file() {
            warn!(tab_id, path = %path.display(), "Ignoring cwd record that is not a regular file");
            return None;
        }
        if metadata.uid() != current_uid() {
            warn!(tab_id, path = %path.display(), "Ignoring cwd record owned by another user");
            return None;
        }
        if metadata.mode() & GROUP_OTHER_BITS != 0 {
            warn!(tab_id, path = %path.display(), "Ignoring cwd record with insecure permissions");
            return None;
        }

        let mut raw = String::new();
        let read = fs::File::open(&path)
            .and_then(|file| file.take(MAX_CWD_BYTES as u64 + 1).read_to_string(&mut raw));
        if let Err(err) = read {
            debug!(tab_id, error = %err, "Failed to read cwd record");
            return None;
        }

        match validate_cwd(raw.trim()) {
            Ok(cwd) => Some(cwd.to_string()),
            Err(err) => {
                debug!(tab_id, error = %err, "Ignoring invalid cwd record");
                None
            }
        }
    }

    /// Removes every per-tab record, plus temp files left by interrupted writers.
    pub fn cleanup(&self) -> CleanupStats {
        let mut stats = CleanupStats::default();
        let root = self.storage.runtime_root();

        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return stats,
            Err(err) => {
                stats.errors.push(format!("Failed to list {}: {}", root.display(), err));
                return stats;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.starts_with(RECORD_PREFIX) {
                continue;
            }
            let is_record = name.ends_with(RECORD_SUFFIX);
            let is_temp = name.ends_with(TEMP_SUFFIX);
            if !is_record && !is_temp {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) if is_record => stats.records_removed += 1,
                Ok(()) => stats.temp_files_removed += 1,
                Err(err) => stats.errors.push(err.to_string()),
            }
        }

        if !stats.errors.is_empty() {
            warn!(errors = ?stats.errors, "Cwd record cleanup had failures");
        }
        stats
    }
}

fn current_uid() -> u32 {
    // SAFETY: getuid has no preconditions and cannot fail.
    unsafe { libc::getuid() }
}
