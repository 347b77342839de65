//! # smart-tabs-core
//!
//! Keeps kitty tab titles and colors in step with what each tab is doing:
//! the directory it is in and the command running in it.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. The daemon drives one cycle at a time.
//! - **Graceful degradation**: External failures skip a tab or a cycle; only
//!   boundary validation (hook writes, lock acquisition) returns errors.
//! - **Deterministic colors**: A directory maps to the same palette color in
//!   every process and every run.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use smart_tabs_core::{Config, Reconciler, StorageConfig};
//!
//! let storage = StorageConfig::from_env()?;
//! let config = Config::load(&storage.config_file());
//! let mut reconciler = Reconciler::with_kitty(config, storage);
//! let changed = reconciler.reconcile_all(false);
//! ```

pub mod classifier;
pub mod colors;
pub mod command;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod lock;
pub mod process;
pub mod resolver;
pub mod sidechannel;
pub mod storage;
pub mod title;

pub use classifier::{classify, select_running_command};
pub use colors::color_for;
pub use config::{Config, FilterConfig, PollTuning};
pub use control::{ControlAdapter, KittyAdapter};
pub use engine::{Reconciler, TabPlan};
pub use error::{Result, TabsError};
pub use lock::InstanceLock;
pub use process::{is_pid_alive, ProcessInspector, SystemProcessInspector};
pub use resolver::{CwdResolver, CwdSource};
pub use sidechannel::{CleanupStats, CwdStore};
pub use storage::StorageConfig;
pub use title::{format_title, sanitize_title};

pub use smart_tabs_protocol as protocol;
