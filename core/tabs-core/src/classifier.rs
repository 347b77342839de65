//! Foreground process classification.
//!
//! Turns a process command line into the short label shown in brackets after
//! the directory name, or `None` when the process is not worth showing.
//!
//! ## Pipeline
//!
//! 1. Take the basename of `argv[0]` and strip one leading `-` (login shells
//!    report themselves as `-zsh`).
//! 2. Run the rejection rules in [`REJECTION_RULES`] order. Any hit filters
//!    the process out.
//! 3. Unwrap interpreters: `python tools/analyzer.py` becomes `analyzer`.
//! 4. Truncate to `max_cmd_length` with a trailing ellipsis.
//!
//! All name comparisons are case-insensitive.

use crate::config::FilterConfig;
use crate::title::truncate_with_ellipsis;
use smart_tabs_protocol::Tab;

/// The emulator, its launcher, and this tool itself.
const SELF_NAMES: &[&str] = &[
    "kitty",
    "kitten",
    "color_tabs_by_cwd",
    "smart_tabs",
    "smart-tabs-daemon",
    "smart-tabs-hook",
];

/// Short-lived utilities that would only make titles flicker.
const SYSTEM_UTILITIES: &[&str] = &[
    "sleep", "wait", "cat", "echo", "true", "false", "test", "grep", "sed", "awk", "tail", "head",
];

/// Interpreters and the script extensions stripped from their first argument.
const INTERPRETERS: &[(&str, &[&str])] = &[
    ("node", &["js", "mjs", "cjs"]),
    ("python", &["py"]),
    ("python3", &["py"]),
    ("python2", &["py"]),
    ("ruby", &["rb"]),
    ("perl", &["pl"]),
    ("php", &["php"]),
];

/// Script names too generic to identify anything; the scan moves past them.
const GENERIC_SCRIPT_NAMES: &[&str] = &["index", "main", "app", "cli", "bin", "start", "run"];

/// Arguments that look like paths but never name a script.
const BARE_PATH_ARGS: &[&str] = &["/", ".", ".."];

type RejectionRule = fn(&str, &FilterConfig) -> bool;

/// Ordered rejection rules. Each receives the lowercased command name.
pub const REJECTION_RULES: &[(&str, RejectionRule)] = &[
    ("shell", is_shell),
    ("self", is_self_tool),
    ("system_utility", is_system_utility),
    ("ignored_command", is_ignored_command),
    ("ignored_prefix", has_ignored_prefix),
    ("ignored_suffix", has_ignored_suffix),
];

fn is_shell(name: &str, filters: &FilterConfig) -> bool {
    filters.ignored_shells.contains(name)
}

fn is_self_tool(name: &str, _filters: &FilterConfig) -> bool {
    SELF_NAMES.contains(&name)
}

fn is_system_utility(name: &str, _filters: &FilterConfig) -> bool {
    SYSTEM_UTILITIES.contains(&name)
}

fn is_ignored_command(name: &str, filters: &FilterConfig) -> bool {
    filters.ignored_commands.contains(name)
}

fn has_ignored_prefix(name: &str, filters: &FilterConfig) -> bool {
    filters
        .ignored_prefixes
        .iter()
        .any(|prefix| name.starts_with(prefix.as_str()))
}

fn has_ignored_suffix(name: &str, filters: &FilterConfig) -> bool {
    filters
        .ignored_suffixes
        .iter()
        .any(|suffix| name.ends_with(suffix.as_str()))
}

/// Returns the rule that filters `name` out, if any.
pub fn rejection_for(name: &str, filters: &FilterConfig) -> Option<&'static str> {
    let lowered = name.to_lowercase();
    REJECTION_RULES
        .iter()
        .find(|(_, rule)| rule(&lowered, filters))
        .map(|(label, _)| *label)
}

/// Basename of `argv[0]` with one login-shell dash removed.
pub fn command_name(argv0: &str) -> &str {
    let base = argv0.rsplit('/').next().unwrap_or(argv0);
    base.strip_prefix('-').unwrap_or(base)
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn script_extensions(interpreter: &str) -> Option<&'static [&'static str]> {
    let lowered = interpreter.to_lowercase();
    INTERPRETERS
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(_, extensions)| *extensions)
}

/// Finds the script an interpreter is running.
///
/// Flags are skipped without considering whether they consume the following
/// token, so `python -m http.server` yields `http.server`.
fn unwrap_interpreter<'a>(args: &'a [String], extensions: &[&str]) -> Option<&'a str> {
    for arg in args {
        if arg.starts_with('-') || BARE_PATH_ARGS.contains(&arg.as_str()) {
            continue;
        }

        let mut script = basename(arg);
        for extension in extensions {
            if let Some(stem) = script
                .strip_suffix(extension)
                .and_then(|rest| rest.strip_suffix('.'))
            {
                script = stem;
                break;
            }
        }

        if GENERIC_SCRIPT_NAMES.contains(&script.to_lowercase().as_str()) {
            continue;
        }
        if !script.is_empty() {
            return Some(script);
        }
    }
    None
}

/// Classifies one command line into a display label.
pub fn classify(cmdline: &[String], filters: &FilterConfig) -> Option<String> {
    let argv0 = cmdline.first()?;
    let name = command_name(argv0);
    if name.is_empty() {
        return None;
    }

    if rejection_for(name, filters).is_some() {
        return None;
    }

    let label = match script_extensions(name) {
        Some(extensions) => unwrap_interpreter(&cmdline[1..], extensions).unwrap_or(name),
        None => name,
    };

    Some(truncate_with_ellipsis(label, filters.max_cmd_length))
}

/// Picks the command to show for a tab.
///
/// Only the first window's foreground processes are considered. A label in
/// the priority set wins over earlier non-priority labels; otherwise the first
/// surviving label is used.
pub fn select_running_command(tab: &Tab, filters: &FilterConfig) -> Option<String> {
    let window = tab.windows.first()?;
    let candidates: Vec<String> = window
        .foreground_processes
        .iter()
        .filter_map(|process| classify(&process.cmdline, filters))
        .collect();

    candidates
        .iter()
        .find(|label| filters.priority_commands.contains(&label.to_lowercase()))
        .or_else(|| candidates.first())
        .cloned()
}
