//! Wire types and validation for the kitty remote-control snapshot.
//!
//! This crate is shared by the daemon and the shell hook so both sides agree on
//! what a valid tab id and a valid working-directory record look like. The
//! snapshot types mirror the JSON emitted by `kitty @ ls`: OS windows contain
//! tabs, tabs contain windows, windows report their foreground processes.
//!
//! Unknown fields are ignored; kitty adds fields between releases and the
//! daemon must keep working across them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Upper bound for a `kitty @ ls` call.
pub const LIST_TIMEOUT_MS: u64 = 2_000;
/// Upper bound for a single `set-tab-title` / `set-tab-color` call.
pub const MUTATION_TIMEOUT_MS: u64 = 500;
/// Longest working-directory record accepted from a shell hook.
pub const MAX_CWD_BYTES: usize = 4096;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid tab id: {0}")]
    InvalidTabId(String),

    #[error("invalid cwd: {0}")]
    InvalidCwd(&'static str),

    #[error("snapshot is not valid JSON: {0}")]
    MalformedSnapshot(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OsWindow {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub tabs: Vec<Tab>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Tab {
    /// Raw id as reported. Use [`Tab::tab_id`] to get a validated value.
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub windows: Vec<Window>,
}

impl Tab {
    pub fn tab_id(&self) -> Option<u32> {
        tab_id_from_value(&self.id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Window {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub pid: Option<i64>,
    #[serde(default)]
    pub foreground_processes: Vec<ForegroundProcess>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ForegroundProcess {
    #[serde(default)]
    pub pid: Option<i64>,
    #[serde(default)]
    pub cmdline: Vec<String>,
}

impl ForegroundProcess {
    /// The process id, when it is a usable positive value.
    pub fn valid_pid(&self) -> Option<u32> {
        self.pid
            .filter(|pid| *pid > 0)
            .and_then(|pid| u32::try_from(pid).ok())
    }
}

pub fn parse_snapshot(bytes: &[u8]) -> Result<Vec<OsWindow>, ProtocolError> {
    serde_json::from_slice(bytes).map_err(|err| ProtocolError::MalformedSnapshot(err.to_string()))
}

/// Accepts only positive integers that fit in a `u32`.
pub fn validate_tab_id(raw: i64) -> Result<u32, ProtocolError> {
    if raw <= 0 {
        return Err(ProtocolError::InvalidTabId(raw.to_string()));
    }
    u32::try_from(raw).map_err(|_| ProtocolError::InvalidTabId(raw.to_string()))
}

/// Tab ids come from an external process; anything but a positive integer is
/// treated as absent.
pub fn tab_id_from_value(value: &Value) -> Option<u32> {
    let raw = value.as_i64()?;
    validate_tab_id(raw).ok()
}

/// Validates a working-directory record.
///
/// The same rules apply when a hook writes a record and when the daemon reads
/// one back.
pub fn validate_cwd(cwd: &str) -> Result<&str, ProtocolError> {
    if cwd.is_empty() {
        return Err(ProtocolError::InvalidCwd("must not be empty"));
    }
    if !cwd.starts_with('/') {
        return Err(ProtocolError::InvalidCwd("must be an absolute path"));
    }
    if cwd.split('/').any(|segment| segment == "..") {
        return Err(ProtocolError::InvalidCwd("path traversal is not allowed"));
    }
    if cwd.len() > MAX_CWD_BYTES {
        return Err(ProtocolError::InvalidCwd("path is too long"));
    }
    Ok(cwd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_kitty_ls_output() {
        let raw = json!([{
            "id": 1,
            "is_focused": true,
            "tabs": [{
                "id": 7,
                "title": "zsh",
                "layout": "stack",
                "windows": [{
                    "id": 42,
                    "cwd": "/home/user/project",
                    "pid": 1200,
                    "foreground_processes": [
                        {"pid": 1201, "cmdline": ["nvim", "src/main.rs"], "cwd": "/home/user/project"}
                    ]
                }]
            }]
        }]);

        let windows = parse_snapshot(raw.to_string().as_bytes()).expect("parse");
        assert_eq!(windows.len(), 1);
        let tab = &windows[0].tabs[0];
        assert_eq!(tab.tab_id(), Some(7));
        assert_eq!(tab.windows[0].cwd.as_deref(), Some("/home/user/project"));
        let process = &tab.windows[0].foreground_processes[0];
        assert_eq!(process.valid_pid(), Some(1201));
        assert_eq!(process.cmdline, vec!["nvim", "src/main.rs"]);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let windows = parse_snapshot(br#"[{"tabs": [{"windows": [{}]}]}]"#).expect("parse");
        let tab = &windows[0].tabs[0];
        assert_eq!(tab.tab_id(), None);
        assert!(tab.windows[0].cwd.is_none());
        assert!(tab.windows[0].foreground_processes.is_empty());
    }

    #[test]
    fn rejects_non_json_snapshot() {
        assert!(matches!(
            parse_snapshot(b"not json"),
            Err(ProtocolError::MalformedSnapshot(_))
        ));
    }

    #[test]
    fn tab_id_must_be_positive_integer() {
        assert_eq!(tab_id_from_value(&json!(12)), Some(12));
        assert_eq!(tab_id_from_value(&json!(0)), None);
        assert_eq!(tab_id_from_value(&json!(-3)), None);
        assert_eq!(tab_id_from_value(&json!("12")), None);
        assert_eq!(tab_id_from_value(&json!(1.5)), None);
        assert_eq!(tab_id_from_value(&json!(true)), None);
        assert_eq!(tab_id_from_value(&Value::Null), None);
        assert!(validate_tab_id(i64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn foreground_pid_rejects_non_positive() {
        let process = ForegroundProcess {
            pid: Some(0),
            cmdline: vec!["zsh".to_string()],
        };
        assert_eq!(process.valid_pid(), None);
    }

    #[test]
    fn validate_cwd_accepts_absolute_paths() {
        assert_eq!(validate_cwd("/home/user/test"), Ok("/home/user/test"));
        assert_eq!(validate_cwd("/"), Ok("/"));
        assert_eq!(validate_cwd("/srv/..hidden"), Ok("/srv/..hidden"));
    }

    #[test]
    fn validate_cwd_rejects_bad_paths() {
        assert!(validate_cwd("").is_err());
        assert!(validate_cwd("relative/path").is_err());
        assert!(validate_cwd("/home/user/../root").is_err());
        assert!(validate_cwd("/home/user/..").is_err());
        let long = format!("/{}", "a".repeat(MAX_CWD_BYTES));
        assert!(validate_cwd(&long).is_err());
    }
}
