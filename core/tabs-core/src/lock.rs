//! Single-instance daemon lock.
//!
//! The lock is a file holding the owner's pid. Creation is exclusive; if the
//! file already exists and its pid is no longer alive, the lock is stale and
//! taken over.

use crate::error::{Result, TabsError};
use crate::process::is_pid_alive;
use fs_err as fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const LOCK_FILE_MODE: u32 = 0o600;

#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    pid: u32,
    released: bool,
}

impl InstanceLock {
    /// Acquires the lock for the current process.
    pub fn acquire(path: &Path) -> Result<Self> {
        Self::acquire_for(path, std::process::id())
    }

    pub fn acquire_for(path: &Path, pid: u32) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| TabsError::io("create lock directory", err))?;
        }

        match create_exclusive(path, pid) {
            Ok(()) => return Ok(Self::held(path, pid)),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(TabsError::io("create lock file", err)),
        }

        match read_lock_pid(path) {
            Some(holder) if holder == pid => {
                debug!(pid, "Lock already held by this process");
                return Ok(Self::held(path, pid));
            }
            Some(holder) if is_pid_alive(holder) => {
                return Err(TabsError::LockHeld {
                    pid: holder,
                    path: path.to_path_buf(),
                });
            }
            Some(holder) => info!(stale_pid = holder, "Reclaiming stale daemon lock"),
            None => warn!(path = %path.display(), "Reclaiming unreadable daemon lock"),
        }

        fs::remove_file(path).map_err(|err| TabsError::io("remove stale lock", err))?;
        create_exclusive(path, pid).map_err(|err| match err.kind() {
            // Another instance won the race for the stale lock.
            std::io::ErrorKind::AlreadyExists => TabsError::LockHeld {
                pid: read_lock_pid(path).unwrap_or_default(),
                path: path.to_path_buf(),
            },
            _ => TabsError::io("create lock file", err),
        })?;
        Ok(Self::held(path, pid))
    }

    fn held(path: &Path, pid: u32) -> Self {
        Self {
            path: path.to_path_buf(),
            pid,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the lock file if it still records this holder's pid.
    ///
    /// Returns `true` when the file was removed.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;

        if read_lock_pid(&self.path) != Some(self.pid) {
            warn!(path = %self.path.display(), "Lock no longer ours; leaving it in place");
            return false;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "Failed to remove daemon lock");
                false
            }
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        self.release();
    }
}

fn create_exclusive(path: &Path, pid: u32) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(LOCK_FILE_MODE)
        .open(path)?;
    writeln!(file, "{}", pid)?;
    file.sync_all()
}

fn read_lock_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    const DEAD_PID: u32 = i32::MAX as u32;

    #[test]
    fn acquire_writes_pid_with_owner_only_mode() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("daemon.pid");

        let lock = InstanceLock::acquire(&path).unwrap();
        assert_eq!(read_lock_pid(&path), Some(std::process::id()));
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("daemon.pid");
        std::fs::write(&path, format!("{}\n", DEAD_PID)).unwrap();

        let _lock = InstanceLock::acquire(&path).unwrap();
        assert_eq!(read_lock_pid(&path), Some(std::process::id()));
    }

    #[test]
    fn garbage_lock_is_reclaimed() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("daemon.pid");
        std::fs::write(&path, "not a pid").unwrap();

        let _lock = InstanceLock::acquire(&path).unwrap();
        assert_eq!(read_lock_pid(&path), Some(std::process::id()));
    }

    #[test]
    fn live_lock_is_refused() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("daemon.pid");
        let _first = InstanceLock::acquire_for(&path, 1).unwrap();

        let err = InstanceLock::acquire(&path).unwrap_err();
        assert!(matches!(err, TabsError::LockHeld { pid: 1, .. }));
        assert!(err.to_string().contains("Daemon already running (PID 1)"));
    }

    #[test]
    fn release_leaves_foreign_lock_alone() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("daemon.pid");

        let mut lock = InstanceLock::acquire(&path).unwrap();
        std::fs::write(&path, "1\n").unwrap();
        assert!(!lock.release());
        assert_eq!(read_lock_pid(&path), Some(1));
    }

    #[test]
    fn release_is_idempotent() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("daemon.pid");

        let mut lock = InstanceLock::acquire(&path).unwrap();
        assert!(lock.release());
        assert!(!lock.release());
    }
}
