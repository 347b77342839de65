//! Shell cwd reporting.
//!
//! Called by the shell's prompt hook after every directory change:
//!
//! ```bash
//! smart-tabs-hook cwd "$KITTY_TAB_ID" "$PWD"
//! ```
//!
//! The record is written atomically; the daemon picks it up on its next cycle.

use smart_tabs_core::{CwdStore, StorageConfig, TabsError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CwdError {
    #[error("tab id must be an integer, got {0:?}")]
    TabIdNotNumeric(String),

    #[error(transparent)]
    Store(#[from] TabsError),
}

pub fn run(tab_id: &str, path: &str) -> Result<(), CwdError> {
    let storage = StorageConfig::from_env()?;
    run_with_storage(storage, tab_id, path)
}

pub fn run_with_storage(storage: StorageConfig, tab_id: &str, path: &str) -> Result<(), CwdError> {
    let tab_id: i64 = tab_id
        .trim()
        .parse()
        .map_err(|_| CwdError::TabIdNotNumeric(tab_id.to_string()))?;
    CwdStore::new(storage).write(tab_id, path)?;
    tracing::debug!(tab_id, path, "Recorded shell cwd");
    Ok(())
}
