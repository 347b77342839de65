//! Reconciliation engine.
//!
//! Each cycle lists every tab, computes the title and color it should have,
//! and issues mutation calls only for tabs whose display actually changed.
//!
//! ## Caches
//!
//! Two per-tab caches keep steady-state cycles free of mutation calls:
//!
//! - **input**: the `(cwd, command, index)` last applied; an identical tuple
//!   skips the tab before any formatting.
//! - **output**: the `(title, color)` last applied; catches inputs that differ
//!   but sanitize to the same display.
//!
//! Both are written only after the title and color calls have both succeeded,
//! so a partially applied tab is retried on the next cycle.

use crate::classifier::select_running_command;
use crate::colors::color_for;
use crate::config::Config;
use crate::control::{ControlAdapter, KittyAdapter};
use crate::error::Result;
use crate::process::SystemProcessInspector;
use crate::resolver::CwdResolver;
use crate::sidechannel::CwdStore;
use crate::storage::StorageConfig;
use crate::title::{display_dir, format_title, normalize_cwd, sanitize_title};
use smart_tabs_protocol::OsWindow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
struct InputKey {
    cwd: String,
    command: Option<String>,
    tab_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AppliedDisplay {
    title: String,
    color: String,
}

/// Desired display state for one tab in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabPlan {
    pub tab_id: u32,
    /// 1-based position within its OS window.
    pub tab_index: usize,
    /// Normalized working directory.
    pub cwd: String,
    pub display_dir: String,
    pub command: Option<String>,
}

pub struct Reconciler<A: ControlAdapter> {
    adapter: A,
    resolver: CwdResolver,
    config: Config,
    input_cache: HashMap<u32, InputKey>,
    output_cache: HashMap<u32, AppliedDisplay>,
}

impl<A: ControlAdapter> Reconciler<A> {
    pub fn new(adapter: A, resolver: CwdResolver, config: Config) -> Self {
        Self {
            adapter,
            resolver,
            config,
            input_cache: HashMap::new(),
            output_cache: HashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn clear_caches(&mut self) {
        self.input_cache.clear();
        self.output_cache.clear();
    }

    /// Runs one reconciliation cycle and returns the number of tabs mutated.
    ///
    /// Never fails: a failed listing yields zero, a failed mutation leaves
    /// that tab for the next cycle. With `debug` set, per-tab decisions are
    /// logged at info level.
    pub fn reconcile_all(&mut self, debug: bool) -> usize {
        let windows = match self.adapter.list_tabs() {
            Ok(windows) => windows,
            Err(err) => {
                warn!(error = %err, "Failed to list tabs");
                self.adapter.invalidate_endpoint();
                return 0;
            }
        };

        let plans = self.plan(&windows);
        let colors = assign_colors(&plans, &self.config.palette);

        let mut changes = 0;
        for plan in &plans {
            let input = InputKey {
                cwd: plan.cwd.clone(),
                command: plan.command.clone(),
                tab_index: plan.tab_index,
            };
            if self.input_cache.get(&plan.tab_id) == Some(&input) {
                continue;
            }

            let tab_index = Some(plan.tab_index);
            let title = sanitize_title(
                &format_title(
                    tab_index,
                    self.config.show_tab_index,
                    &plan.display_dir,
                    plan.command.as_deref(),
                ),
                self.config.max_title_length,
            );
            let color = colors
                .get(plan.cwd.as_str())
                .cloned()
                .unwrap_or_else(|| color_for(&plan.cwd, &self.config.palette));
            let applied = AppliedDisplay { title, color };

            if self.output_cache.get(&plan.tab_id) == Some(&applied) {
                continue;
            }

            if let Err(err) = self.apply(plan.tab_id, &applied) {
                warn!(tab_id = plan.tab_id, error = %err, "Failed to update tab");
                continue;
            }

            if debug {
                info!(
                    tab_id = plan.tab_id,
                    title = %applied.title,
                    color = %applied.color,
                    "Updated tab"
                );
            } else {
                debug!(tab_id = plan.tab_id, title = %applied.title, "Updated tab");
            }
            self.input_cache.insert(plan.tab_id, input);
            self.output_cache.insert(plan.tab_id, applied);
            changes += 1;
        }
        changes
    }

    /// Resolves every tab with a valid id and a known cwd.
    pub fn plan(&self, windows: &[OsWindow]) -> Vec<TabPlan> {
        let mut plans = Vec::new();
        for os_window in windows {
            for (position, tab) in os_window.tabs.iter().enumerate() {
                let Some(tab_id) = tab.tab_id() else {
                    debug!(id = %tab.id, "Skipping tab with invalid id");
                    continue;
                };
                let resolved = self.resolver.resolve_cwd(tab);
                if resolved.is_empty() {
                    debug!(tab_id, "Skipping tab without a resolvable cwd");
                    continue;
                }

                let cwd = normalize_cwd(&resolved).to_string();
                let command = if self.config.show_commands {
                    select_running_command(tab, &self.config.filters)
                } else {
                    None
                };
                plans.push(TabPlan {
                    tab_id,
                    tab_index: position + 1,
                    display_dir: display_dir(&cwd, self.config.max_dir_length),
                    cwd,
                    command,
                });
            }
        }
        plans
    }

    fn apply(&self, tab_id: u32, display: &AppliedDisplay) -> Result<()> {
        self.adapter.set_tab_title(tab_id, &display.title)?;
        self.adapter.set_tab_color(tab_id, &display.color)?;
        Ok(())
    }
}

impl Reconciler<KittyAdapter> {
    /// Production wiring: kitty remote control, the side-channel store in
    /// `storage`, and OS process introspection.
    pub fn with_kitty(config: Config, storage: StorageConfig) -> Self {
        let resolver = CwdResolver::new(CwdStore::new(storage), Arc::new(SystemProcessInspector));
        Self::new(KittyAdapter::default(), resolver, config)
    }
}

/// One color per distinct normalized cwd.
fn assign_colors<'a, S: AsRef<str>>(
    plans: &'a [TabPlan],
    palette: &[S],
) -> HashMap<&'a str, String> {
    let mut colors = HashMap::new();
    for plan in plans {
        colors
            .entry(plan.cwd.as_str())
            .or_insert_with(|| color_for(&plan.cwd, palette));
    }
    colors
}
