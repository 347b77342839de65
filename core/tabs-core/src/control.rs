//! Control interface to the terminal emulator.
//!
//! The engine only needs three operations: list tabs, set a tab's title, set a
//! tab's color. [`ControlAdapter`] is the seam; [`KittyAdapter`] implements it
//! with `kitty @` remote-control subprocesses, and tests substitute fakes.

use crate::command::run_with_timeout;
use crate::error::{Result, TabsError};
use smart_tabs_protocol::{parse_snapshot, OsWindow, LIST_TIMEOUT_MS, MUTATION_TIMEOUT_MS};
use std::os::unix::fs::FileTypeExt;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

const LISTEN_ON_ENV: &str = "KITTY_LISTEN_ON";
const SOCKET_PREFIX: &str = "kitty-";

pub trait ControlAdapter: Send + Sync {
    fn list_tabs(&self) -> Result<Vec<OsWindow>>;
    fn set_tab_title(&self, tab_id: u32, title: &str) -> Result<()>;
    /// Sets both the active and inactive foreground color of a tab.
    fn set_tab_color(&self, tab_id: u32, color: &str) -> Result<()>;
    /// Drops any cached connection endpoint so the next call rediscovers it.
    fn invalidate_endpoint(&self) {}
}

#[derive(Debug)]
pub struct KittyAdapter {
    binary: String,
    socket_dir: PathBuf,
    cached_socket: Mutex<Option<String>>,
}

impl Default for KittyAdapter {
    fn default() -> Self {
        Self::new("kitty", PathBuf::from("/tmp"))
    }
}

impl KittyAdapter {
    pub fn new(binary: impl Into<String>, socket_dir: PathBuf) -> Self {
        Self {
            binary: binary.into(),
            socket_dir,
            cached_socket: Mutex::new(None),
        }
    }

    /// Remote-control endpoint, e.g. `unix:/tmp/kitty-1234`.
    ///
    /// `KITTY_LISTEN_ON` wins when set. Otherwise the first `kitty-*` socket in
    /// the socket directory is used and cached until invalidated.
    pub fn endpoint(&self) -> Option<String> {
        if let Ok(listen_on) = std::env::var(LISTEN_ON_ENV) {
            if !listen_on.trim().is_empty() {
                return Some(listen_on);
            }
        }

        let mut cached = self
            .cached_socket
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        if cached.is_none() {
            *cached = self.discover_socket();
            if let Some(endpoint) = cached.as_deref() {
                debug!(endpoint, "Discovered kitty socket");
            }
        }
        cached.clone()
    }

    fn discover_socket(&self) -> Option<String> {
        let entries = std::fs::read_dir(&self.socket_dir).ok()?;
        let mut sockets: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with(SOCKET_PREFIX))
            })
            .filter(|entry| {
                entry
                    .file_type()
                    .map(|kind| kind.is_socket())
                    .unwrap_or(false)
            })
            .map(|entry| entry.path())
            .collect();
        sockets.sort();
        sockets
            .into_iter()
            .next()
            .map(|path| format!("unix:{}", path.display()))
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg("@");
        if let Some(endpoint) = self.endpoint() {
            command.args(["--to", endpoint.as_str()]);
        }
        command
    }

    fn run(&self, args: &[&str], timeout_ms: u64) -> Result<Output> {
        let mut command = self.command();
        command.args(args);
        let label = args.first().copied().unwrap_or_default().to_string();

        let output = run_with_timeout(&mut command, Duration::from_millis(timeout_ms)).map_err(
            |err| match err.kind() {
                std::io::ErrorKind::TimedOut => TabsError::ControlTimeout {
                    command: label.clone(),
                    timeout_ms,
                },
                _ => TabsError::ControlCall {
                    command: label.clone(),
                    details: err.to_string(),
                },
            },
        )?;

        if !output.status.success() {
            return Err(TabsError::ControlCall {
                command: label,
                details: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(output)
    }
}

impl ControlAdapter for KittyAdapter {
    fn list_tabs(&self) -> Result<Vec<OsWindow>> {
        let output = self.run(&["ls"], LIST_TIMEOUT_MS)?;
        Ok(parse_snapshot(&output.stdout)?)
    }

    fn set_tab_title(&self, tab_id: u32, title: &str) -> Result<()> {
        let matcher = format!("--match=id:{}", tab_id);
        self.run(&["set-tab-title", &matcher, "--", title], MUTATION_TIMEOUT_MS)?;
        Ok(())
    }

    fn set_tab_color(&self, tab_id: u32, color: &str) -> Result<()> {
        let matcher = format!("--match=id:{}", tab_id);
        let active = format!("active_fg={}", color);
        let inactive = format!("inactive_fg={}", color);
        self.run(
            &["set-tab-color", &matcher, &active, &inactive],
            MUTATION_TIMEOUT_MS,
        )?;
        Ok(())
    }

    fn invalidate_endpoint(&self) {
        *self
            .cached_socket
            .lock()
            .unwrap_or_else(|err| err.into_inner()) = None;
    }
}
