//! Error types for smart-tabs core operations.

use smart_tabs_protocol::ProtocolError;
use std::path::PathBuf;

/// All errors that can occur in smart-tabs core operations.
///
/// Most of the polling path never surfaces these: the reconciliation engine
/// turns failures into skipped tabs or a zero-change cycle. They exist for the
/// boundaries where a caller must be told "no", such as a shell hook writing a
/// malformed record or a second daemon trying to start.
#[derive(Debug, thiserror::Error)]
pub enum TabsError {
    // ─────────────────────────────────────────────────────────────────────
    // Validation Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid tab id: {0}")]
    InvalidTabId(String),

    #[error("Invalid cwd: {reason}")]
    InvalidCwd { reason: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Control Interface Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Control call failed: {command}: {details}")]
    ControlCall { command: String, details: String },

    #[error("Control call timed out after {timeout_ms}ms: {command}")]
    ControlTimeout { command: String, timeout_ms: u64 },

    // ─────────────────────────────────────────────────────────────────────
    // Daemon Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Daemon already running (PID {pid}). If not running, remove {}", path.display())]
    LockHeld { pid: u32, path: PathBuf },
}

impl TabsError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TabsError::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<ProtocolError> for TabsError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidTabId(raw) => TabsError::InvalidTabId(raw),
            ProtocolError::InvalidCwd(reason) => TabsError::InvalidCwd {
                reason: reason.to_string(),
            },
            ProtocolError::MalformedSnapshot(details) => TabsError::ControlCall {
                command: "ls".to_string(),
                details,
            },
        }
    }
}

/// Convenience type alias for Results using TabsError.
pub type Result<T> = std::result::Result<T, TabsError>;
