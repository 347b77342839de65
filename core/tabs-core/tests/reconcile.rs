//! End-to-end reconciliation cycles against a recording control adapter.

use serde_json::json;
use smart_tabs_core::protocol::{ForegroundProcess, OsWindow, Tab, Window};
use smart_tabs_core::{
    color_for, Config, ControlAdapter, CwdResolver, CwdStore, ProcessInspector, Reconciler,
    StorageConfig, TabsError,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Title(u32, String),
    Color(u32, String),
}

#[derive(Default)]
struct AdapterState {
    snapshot: Option<Vec<OsWindow>>,
    calls: Vec<Call>,
    failing_color_tabs: HashSet<u32>,
    invalidations: usize,
}

#[derive(Clone, Default)]
struct RecordingAdapter {
    state: Arc<Mutex<AdapterState>>,
}

impl RecordingAdapter {
    fn set_snapshot(&self, snapshot: Option<Vec<OsWindow>>) {
        self.state.lock().expect("lock state").snapshot = snapshot;
    }

    fn fail_color_for(&self, tab_id: u32, fail: bool) {
        let mut state = self.state.lock().expect("lock state");
        if fail {
            state.failing_color_tabs.insert(tab_id);
        } else {
            state.failing_color_tabs.remove(&tab_id);
        }
    }

    fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.state.lock().expect("lock state").calls)
    }

    fn invalidations(&self) -> usize {
        self.state.lock().expect("lock state").invalidations
    }
}

impl ControlAdapter for RecordingAdapter {
    fn list_tabs(&self) -> smart_tabs_core::Result<Vec<OsWindow>> {
        self.state
            .lock()
            .expect("lock state")
            .snapshot
            .clone()
            .ok_or_else(|| TabsError::ControlCall {
                command: "ls".to_string(),
                details: "no kitty".to_string(),
            })
    }

    fn set_tab_title(&self, tab_id: u32, title: &str) -> smart_tabs_core::Result<()> {
        self.state
            .lock()
            .expect("lock state")
            .calls
            .push(Call::Title(tab_id, title.to_string()));
        Ok(())
    }

    fn set_tab_color(&self, tab_id: u32, color: &str) -> smart_tabs_core::Result<()> {
        let mut state = self.state.lock().expect("lock state");
        if state.failing_color_tabs.contains(&tab_id) {
            return Err(TabsError::ControlTimeout {
                command: "set-tab-color".to_string(),
                timeout_ms: 500,
            });
        }
        state.calls.push(Call::Color(tab_id, color.to_string()));
        Ok(())
    }

    fn invalidate_endpoint(&self) {
        self.state.lock().expect("lock state").invalidations += 1;
    }
}

struct NoProcessCwd;

impl ProcessInspector for NoProcessCwd {
    fn cwd_of(&self, _pid: u32) -> Option<String> {
        None
    }
}

struct Harness {
    _temp: TempDir,
    adapter: RecordingAdapter,
    store: CwdStore,
    reconciler: Reconciler<RecordingAdapter>,
}

fn harness(config: Config) -> Harness {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = CwdStore::new(StorageConfig::with_root(temp.path().to_path_buf()));
    let adapter = RecordingAdapter::default();
    let resolver = CwdResolver::new(store.clone(), Arc::new(NoProcessCwd));
    let reconciler = Reconciler::new(adapter.clone(), resolver, config);
    Harness {
        _temp: temp,
        adapter,
        store,
        reconciler,
    }
}

fn tab(id: u32, cwd: &str, commands: &[&[&str]]) -> Tab {
    Tab {
        id: json!(id),
        title: None,
        windows: vec![Window {
            id: json!(id * 10),
            cwd: Some(cwd.to_string()),
            pid: None,
            foreground_processes: commands
                .iter()
                .map(|argv| ForegroundProcess {
                    pid: None,
                    cmdline: argv.iter().map(|part| part.to_string()).collect(),
                })
                .collect(),
        }],
    }
}

fn os_window(tabs: Vec<Tab>) -> Vec<OsWindow> {
    vec![OsWindow { id: json!(1), tabs }]
}

fn titles(calls: &[Call]) -> Vec<(u32, String)> {
    calls
        .iter()
        .filter_map(|call| match call {
            Call::Title(id, title) => Some((*id, title.clone())),
            Call::Color(..) => None,
        })
        .collect()
}

fn colors(calls: &[Call]) -> Vec<(u32, String)> {
    calls
        .iter()
        .filter_map(|call| match call {
            Call::Color(id, color) => Some((*id, color.clone())),
            Call::Title(..) => None,
        })
        .collect()
}

#[test]
fn unchanged_snapshot_is_idempotent() {
    let mut h = harness(Config::default());
    h.adapter.set_snapshot(Some(os_window(vec![
        tab(1, "/home/user/alpha", &[&["nvim"]]),
        tab(2, "/home/user/beta", &[]),
    ])));

    assert_eq!(h.reconciler.reconcile_all(false), 2);
    assert_eq!(h.adapter.take_calls().len(), 4);

    assert_eq!(h.reconciler.reconcile_all(false), 0);
    assert!(h.adapter.take_calls().is_empty());
}

#[test]
fn identical_display_for_new_input_makes_no_calls() {
    let config = Config {
        palette: vec!["#123456".to_string()],
        ..Config::default()
    };
    let mut h = harness(config);
    h.adapter
        .set_snapshot(Some(os_window(vec![tab(1, "/a/proj", &[])])));
    assert_eq!(h.reconciler.reconcile_all(false), 1);
    assert_eq!(
        h.adapter.take_calls(),
        vec![
            Call::Title(1, "1: proj".to_string()),
            Call::Color(1, "#123456".to_string()),
        ]
    );

    // Same title and color from a different cwd.
    h.adapter
        .set_snapshot(Some(os_window(vec![tab(1, "/b/proj", &[])])));
    assert_eq!(h.reconciler.reconcile_all(false), 0);
    assert!(h.adapter.take_calls().is_empty());
    assert_eq!(h.reconciler.reconcile_all(false), 0);
    assert!(h.adapter.take_calls().is_empty());

    // The input cache still holds /a/proj, so moving back is also silent.
    h.adapter
        .set_snapshot(Some(os_window(vec![tab(1, "/a/proj", &[])])));
    assert_eq!(h.reconciler.reconcile_all(false), 0);
    assert!(h.adapter.take_calls().is_empty());

    h.adapter
        .set_snapshot(Some(os_window(vec![tab(1, "/b/proj", &[&["nvim"]])])));
    assert_eq!(h.reconciler.reconcile_all(false), 1);
    assert_eq!(
        titles(&h.adapter.take_calls()),
        vec![(1, "1: proj [nvim]".to_string())]
    );
}

#[test]
fn changed_cwd_issues_exactly_one_title_and_color() {
    let mut h = harness(Config::default());
    h.adapter.set_snapshot(Some(os_window(vec![
        tab(1, "/home/user/alpha", &[]),
        tab(2, "/home/user/beta", &[]),
    ])));
    h.reconciler.reconcile_all(false);
    h.adapter.take_calls();

    h.adapter.set_snapshot(Some(os_window(vec![
        tab(1, "/home/user/gamma", &[]),
        tab(2, "/home/user/beta", &[]),
    ])));
    assert_eq!(h.reconciler.reconcile_all(false), 1);

    let calls = h.adapter.take_calls();
    assert_eq!(titles(&calls), vec![(1, "1: gamma".to_string())]);
    assert_eq!(
        colors(&calls),
        vec![(1, color_for("/home/user/gamma", &h.reconciler.config().palette))]
    );
}

#[test]
fn shared_project_tabs_share_color_and_show_commands() {
    let mut h = harness(Config::default());
    h.adapter.set_snapshot(Some(os_window(vec![
        tab(1, "/home/user/myproject", &[&["nvim", "src/main.rs"]]),
        tab(2, "/home/user/myproject", &[&["-zsh"]]),
        tab(3, "/home/user/myproject", &[&["git", "status"]]),
    ])));

    assert_eq!(h.reconciler.reconcile_all(false), 3);
    let calls = h.adapter.take_calls();

    let colors = colors(&calls);
    assert_eq!(colors.len(), 3);
    assert!(colors.iter().all(|(_, color)| *color == colors[0].1));

    let titles = titles(&calls);
    assert_eq!(titles[0], (1, "1: myproject [nvim]".to_string()));
    assert_eq!(titles[1], (2, "2: myproject".to_string()));
    assert_eq!(titles[2], (3, "3: myproject [git]".to_string()));
}

#[test]
fn priority_command_beats_earlier_candidate() {
    let mut h = harness(Config::default());
    h.adapter.set_snapshot(Some(os_window(vec![tab(
        1,
        "/srv/app",
        &[&["htop"], &["git", "log"]],
    )])));

    h.reconciler.reconcile_all(false);
    let titles = titles(&h.adapter.take_calls());
    assert_eq!(titles, vec![(1, "1: app [git]".to_string())]);
}

#[test]
fn failed_listing_reports_zero_and_invalidates_endpoint() {
    let mut h = harness(Config::default());
    h.adapter.set_snapshot(None);

    assert_eq!(h.reconciler.reconcile_all(false), 0);
    assert_eq!(h.adapter.invalidations(), 1);
    assert!(h.adapter.take_calls().is_empty());
}

#[test]
fn partial_failure_is_retried_next_cycle() {
    let mut h = harness(Config::default());
    h.adapter.set_snapshot(Some(os_window(vec![
        tab(1, "/home/user/alpha", &[]),
        tab(2, "/home/user/beta", &[]),
    ])));
    h.adapter.fail_color_for(1, true);

    assert_eq!(h.reconciler.reconcile_all(false), 1);
    h.adapter.take_calls();

    h.adapter.fail_color_for(1, false);
    assert_eq!(h.reconciler.reconcile_all(false), 1);
    let calls = h.adapter.take_calls();
    assert_eq!(titles(&calls), vec![(1, "1: alpha".to_string())]);
    assert_eq!(colors(&calls).len(), 1);

    assert_eq!(h.reconciler.reconcile_all(false), 0);
}

#[test]
fn tab_index_can_be_hidden() {
    let config = Config {
        show_tab_index: false,
        ..Config::default()
    };
    let mut h = harness(config);
    h.adapter.set_snapshot(Some(os_window(vec![
        tab(4, "/home/user/alpha", &[&["vim"]]),
        tab(9, "/home/user/beta", &[]),
    ])));

    h.reconciler.reconcile_all(false);
    assert_eq!(
        titles(&h.adapter.take_calls()),
        vec![
            (4, "alpha [vim]".to_string()),
            (9, "beta".to_string())
        ]
    );
}

#[test]
fn commands_can_be_hidden() {
    let config = Config {
        show_commands: false,
        ..Config::default()
    };
    let mut h = harness(config);
    h.adapter
        .set_snapshot(Some(os_window(vec![tab(1, "/home/user/alpha", &[&["nvim"]])])));

    h.reconciler.reconcile_all(false);
    assert_eq!(
        titles(&h.adapter.take_calls()),
        vec![(1, "1: alpha".to_string())]
    );
}

#[test]
fn side_channel_record_overrides_reported_cwd() {
    let mut h = harness(Config::default());
    h.store.write(1, "/home/user/from-hook").expect("write record");
    h.adapter
        .set_snapshot(Some(os_window(vec![tab(1, "/home/user/stale", &[])])));

    h.reconciler.reconcile_all(false);
    assert_eq!(
        titles(&h.adapter.take_calls()),
        vec![(1, "1: from-hook".to_string())]
    );
}

#[test]
fn trailing_slash_does_not_split_colors() {
    let mut h = harness(Config::default());
    h.adapter.set_snapshot(Some(os_window(vec![
        tab(1, "/home/user/project/", &[]),
        tab(2, "/home/user/project", &[]),
    ])));

    h.reconciler.reconcile_all(false);
    let calls = h.adapter.take_calls();
    let colors = colors(&calls);
    assert_eq!(colors[0].1, colors[1].1);
    assert_eq!(
        colors[0].1,
        color_for("/home/user/project", &h.reconciler.config().palette)
    );
    assert_eq!(titles(&calls)[0], (1, "1: project".to_string()));
}

#[test]
fn invalid_tabs_are_never_mutated() {
    let mut h = harness(Config::default());
    let mut bad_id = tab(1, "/home/user/alpha", &[]);
    bad_id.id = json!(-5);
    let mut no_cwd = tab(2, "", &[]);
    no_cwd.windows[0].cwd = None;
    h.adapter.set_snapshot(Some(os_window(vec![
        bad_id,
        no_cwd,
        tab(3, "/home/user/gamma", &[]),
    ])));

    assert_eq!(h.reconciler.reconcile_all(false), 1);
    let titles = titles(&h.adapter.take_calls());
    assert_eq!(titles, vec![(3, "3: gamma".to_string())]);
}

#[test]
fn clearing_caches_reapplies_everything() {
    let mut h = harness(Config::default());
    h.adapter
        .set_snapshot(Some(os_window(vec![tab(1, "/home/user/alpha", &[])])));

    assert_eq!(h.reconciler.reconcile_all(false), 1);
    assert_eq!(h.reconciler.reconcile_all(false), 0);
    h.reconciler.clear_caches();
    assert_eq!(h.reconciler.reconcile_all(true), 1);
}

#[test]
fn hostile_directory_names_are_sanitized() {
    let mut h = harness(Config::default());
    h.adapter.set_snapshot(Some(os_window(vec![tab(
        1,
        "/home/user/evil\u{202E}\u{1b}[31mname",
        &[],
    )])));

    h.reconciler.reconcile_all(false);
    let titles = titles(&h.adapter.take_calls());
    assert_eq!(titles, vec![(1, "1: evil[31mname".to_string())]);
}
