//! Working-directory resolution for a tab.
//!
//! Sources are tried in order and the first one that produces an absolute path
//! wins:
//!
//! | Source | Where it looks |
//! |---|---|
//! | `side_channel` | record written by the shell hook on `cd` |
//! | `process` | cwd of a window's foreground process |
//! | `reported` | the `cwd` field kitty reports for a window |

use crate::process::ProcessInspector;
use crate::sidechannel::CwdStore;
use smart_tabs_protocol::Tab;
use std::sync::Arc;
use tracing::trace;

/// One link in the resolution chain.
pub trait CwdSource: Send + Sync {
    fn name(&self) -> &'static str;
    fn resolve(&self, tab_id: u32, tab: &Tab) -> Option<String>;
}

pub struct SideChannelSource {
    store: CwdStore,
}

impl SideChannelSource {
    pub fn new(store: CwdStore) -> Self {
        Self { store }
    }
}

impl CwdSource for SideChannelSource {
    fn name(&self) -> &'static str {
        "side_channel"
    }

    fn resolve(&self, tab_id: u32, _tab: &Tab) -> Option<String> {
        self.store.read(i64::from(tab_id))
    }
}

pub struct ProcessSource {
    inspector: Arc<dyn ProcessInspector>,
}

impl ProcessSource {
    pub fn new(inspector: Arc<dyn ProcessInspector>) -> Self {
        Self { inspector }
    }
}

impl CwdSource for ProcessSource {
    fn name(&self) -> &'static str {
        "process"
    }

    fn resolve(&self, _tab_id: u32, tab: &Tab) -> Option<String> {
        tab.windows
            .iter()
            .filter_map(|window| {
                window
                    .foreground_processes
                    .iter()
                    .find_map(|process| process.valid_pid())
            })
            .find_map(|pid| self.inspector.cwd_of(pid))
            .filter(|cwd| is_absolute(cwd))
    }
}

pub struct ReportedCwdSource;

impl CwdSource for ReportedCwdSource {
    fn name(&self) -> &'static str {
        "reported"
    }

    fn resolve(&self, _tab_id: u32, tab: &Tab) -> Option<String> {
        tab.windows
            .iter()
            .filter_map(|window| window.cwd.as_deref())
            .map(str::trim)
            .find(|cwd| !cwd.is_empty())
            .filter(|cwd| is_absolute(cwd))
            .map(str::to_string)
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

pub struct CwdResolver {
    sources: Vec<Box<dyn CwdSource>>,
}

impl CwdResolver {
    /// The standard chain: side channel, then process introspection, then
    /// kitty's reported cwd.
    pub fn new(store: CwdStore, inspector: Arc<dyn ProcessInspector>) -> Self {
        Self::with_sources(vec![
            Box::new(SideChannelSource::new(store)),
            Box::new(ProcessSource::new(inspector)),
            Box::new(ReportedCwdSource),
        ])
    }

    pub fn with_sources(sources: Vec<Box<dyn CwdSource>>) -> Self {
        Self { sources }
    }

    /// Resolves the tab's working directory, or returns an empty string.
    ///
    /// Tabs without a positive integer id are not resolved at all.
    pub fn resolve_cwd(&self, tab: &Tab) -> String {
        let Some(tab_id) = tab.tab_id() else {
            trace!(id = %tab.id, "Skipping cwd resolution for invalid tab id");
            return String::new();
        };

        for source in &self.sources {
            if let Some(cwd) = source.resolve(tab_id, tab) {
                trace!(tab_id, source = source.name(), cwd = %cwd, "Resolved tab cwd");
                return cwd;
            }
        }
        String::new()
    }
}
