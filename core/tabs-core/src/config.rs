//! Configuration loading for smart-tabs.
//!
//! The config file is INI with unquoted values:
//!
//! ```ini
//! [colors]
//! palette = #ff0000,#00ff00,#0000ff
//!
//! [behavior]
//! show_commands = yes
//! show_tab_index = false
//! poll_interval = 1
//!
//! [filters]
//! ignored_shells = zsh,bash
//! ```
//!
//! The same sections written as TOML are accepted too, in which case list
//! values may also be arrays. Every key is read independently: a missing file,
//! an unparseable file, or a single bad value falls back to the built-in
//! default for what could not be read. Loading never fails.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_PALETTE: [&str; 16] = [
    "#2b8eff", "#a9dc76", "#ab9df2", "#ffd866", "#78dce8", "#f48771", "#ff6188", "#fc9867",
    "#79dac8", "#5ad4e6", "#9ecd6f", "#e0af68", "#bb9af7", "#7dcfff", "#ff9e64", "#7aa2f7",
];

const DEFAULT_SHELLS: &str = "zsh,bash,sh,fish,ksh,tcsh,csh";
const DEFAULT_IGNORED_COMMANDS: &str = "npm,yarn,sleep,cat,grep,sed,awk,pip,gem";
const DEFAULT_IGNORED_PREFIXES: &str = "mcp_server_,helper-,worker-,node_modules,ts-node";
const DEFAULT_IGNORED_SUFFIXES: &str = "-helper,-worker,-daemon,-service,-server";
const DEFAULT_PRIORITY_COMMANDS: &str = "nvim,vim,vi,emacs,code,nano,claude,git,docker,kubectl";
const DEFAULT_ARROWS: &str = "▶▶▶▶";

/// Shortest length that still leaves room for a character plus "...".
const MIN_TRUNCATE_LENGTH: usize = 4;

const MAX_POLL_INTERVAL_SECS: f64 = 3600.0;
const MAX_INTERVAL_MULTIPLIER: f64 = 100.0;
const MAX_BACKOFF_FACTOR: f64 = 10.0;

static RE_HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap());

/// Filter rules for the process classifier. Names are stored lowercased.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub ignored_shells: HashSet<String>,
    pub ignored_commands: HashSet<String>,
    pub ignored_prefixes: Vec<String>,
    pub ignored_suffixes: Vec<String>,
    pub priority_commands: HashSet<String>,
    pub max_cmd_length: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            ignored_shells: lowercase_set(split_csv(DEFAULT_SHELLS)),
            ignored_commands: lowercase_set(split_csv(DEFAULT_IGNORED_COMMANDS)),
            ignored_prefixes: lowercase_list(split_csv(DEFAULT_IGNORED_PREFIXES)),
            ignored_suffixes: lowercase_list(split_csv(DEFAULT_IGNORED_SUFFIXES)),
            priority_commands: lowercase_set(split_csv(DEFAULT_PRIORITY_COMMANDS)),
            max_cmd_length: 30,
        }
    }
}

/// Tuning for the adaptive poll loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PollTuning {
    pub base_interval: Duration,
    /// Consecutive idle cycles before the interval starts growing.
    pub idle_threshold: u32,
    /// Ceiling expressed as a multiple of `base_interval`.
    pub max_interval_multiplier: f64,
    pub backoff_factor: f64,
}

impl Default for PollTuning {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(2),
            idle_threshold: 3,
            max_interval_multiplier: 4.0,
            backoff_factor: 1.5,
        }
    }
}

impl PollTuning {
    /// Falls back to `base_interval` when the product is not a representable
    /// duration.
    pub fn max_interval(&self) -> Duration {
        let secs = self.base_interval.as_secs_f64() * self.max_interval_multiplier;
        Duration::try_from_secs_f64(secs).unwrap_or(self.base_interval)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub palette: Vec<String>,
    pub show_commands: bool,
    pub show_tab_index: bool,
    pub max_dir_length: usize,
    pub max_title_length: usize,
    /// Active-tab marker for the tab bar. Carried for the tab-bar renderer;
    /// the reconciliation engine does not use it.
    pub arrows: String,
    pub filters: FilterConfig,
    pub poll: PollTuning,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            show_commands: true,
            show_tab_index: true,
            max_dir_length: 30,
            max_title_length: 256,
            arrows: DEFAULT_ARROWS.to_string(),
            filters: FilterConfig::default(),
            poll: PollTuning::default(),
        }
    }
}

/// A list written either as `"a,b,c"` or `["a", "b", "c"]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListValue {
    Csv(String),
    Items(Vec<String>),
}

impl ListValue {
    fn into_items(self) -> Vec<String> {
        match self {
            ListValue::Csv(raw) => split_csv(&raw),
            ListValue::Items(items) => items
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        }
    }
}

/// Booleans may be native or INI-style strings ("yes", "off", "1").
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FlexBool {
    Native(bool),
    Text(String),
}

impl FlexBool {
    fn as_bool(&self) -> Option<bool> {
        match self {
            FlexBool::Native(value) => Some(*value),
            FlexBool::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "1" | "yes" | "true" | "on" => Some(true),
                "0" | "no" | "false" | "off" => Some(false),
                _ => None,
            },
        }
    }
}

impl Config {
    /// Loads configuration from `path`, falling back to defaults for anything
    /// missing or malformed.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs_err::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(err) => {
                warn!(error = %err, "Failed to read config; using defaults");
                Self::default()
            }
        }
    }

    /// Parses config text written as INI or TOML.
    pub fn parse(content: &str) -> Self {
        let table = match content.parse::<toml::Table>() {
            Ok(table) => table,
            Err(toml_err) => match ini_table(content) {
                Ok(table) => table,
                Err(ini_err) => {
                    warn!(
                        toml_error = %toml_err,
                        ini_error = %ini_err,
                        "Config is neither INI nor TOML; using defaults"
                    );
                    return Self::default();
                }
            },
        };

        let mut config = Self::default();
        let colors = section(&table, "colors");
        let behavior = section(&table, "behavior");
        let active_tab = section(&table, "active_tab");
        let filters = section(&table, "filters");
        let daemon = section(&table, "daemon");
        let title = section(&table, "title");

        if let Some(list) = read_key::<ListValue>(colors, "colors", "palette") {
            let palette = parse_palette(list.into_items());
            if palette.is_empty() {
                warn!("Config palette has no valid colors; using default palette");
            } else {
                config.palette = palette;
            }
        }

        if let Some(value) = read_bool(behavior, "behavior", "show_commands") {
            config.show_commands = value;
        }
        if let Some(value) = read_bool(behavior, "behavior", "show_tab_index") {
            config.show_tab_index = value;
        }
        if let Some(secs) =
            read_bounded(behavior, "behavior", "poll_interval", MAX_POLL_INTERVAL_SECS)
        {
            config.poll.base_interval = Duration::from_secs_f64(secs.max(1.0));
        }
        if let Some(len) = read_length(behavior, "behavior", "max_dir_length") {
            config.max_dir_length = len;
        }
        if let Some(len) = read_length(behavior, "behavior", "max_cmd_length") {
            config.filters.max_cmd_length = len;
        }

        if let Some(arrows) = read_key::<String>(active_tab, "active_tab", "arrows") {
            config.arrows = arrows;
        }

        if let Some(list) = read_key::<ListValue>(filters, "filters", "ignored_shells") {
            config.filters.ignored_shells = lowercase_set(list.into_items());
        }
        if let Some(list) = read_key::<ListValue>(filters, "filters", "ignored_commands") {
            config.filters.ignored_commands = lowercase_set(list.into_items());
        }
        if let Some(list) = read_key::<ListValue>(filters, "filters", "ignored_prefixes") {
            config.filters.ignored_prefixes = lowercase_list(list.into_items());
        }
        if let Some(list) = read_key::<ListValue>(filters, "filters", "ignored_suffixes") {
            config.filters.ignored_suffixes = lowercase_list(list.into_items());
        }
        if let Some(list) = read_key::<ListValue>(filters, "filters", "priority_commands") {
            config.filters.priority_commands = lowercase_set(list.into_items());
        }

        if let Some(value) = read_bounded(daemon, "daemon", "idle_threshold", u32::MAX as f64) {
            config.poll.idle_threshold = (value as u32).max(1);
        }
        if let Some(value) = read_bounded(
            daemon,
            "daemon",
            "max_interval_multiplier",
            MAX_INTERVAL_MULTIPLIER,
        ) {
            config.poll.max_interval_multiplier = value.max(1.0);
        }
        if let Some(value) = read_bounded(daemon, "daemon", "backoff_factor", MAX_BACKOFF_FACTOR) {
            config.poll.backoff_factor = value.max(1.0);
        }

        if let Some(len) = read_length(title, "title", "max_length") {
            config.max_title_length = len;
        }

        config
    }
}

/// Reads INI text into a table of string values. Section and key names are
/// lowercased; keys outside any section are ignored.
fn ini_table(content: &str) -> Result<toml::Table, ini::ParseError> {
    let ini = ini::Ini::load_from_str(content)?;
    let mut table = toml::Table::new();
    for (name, properties) in ini.iter() {
        let Some(name) = name else {
            continue;
        };
        let entry = table
            .entry(name.trim().to_lowercase())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if let toml::Value::Table(section) = entry {
            for (key, value) in properties.iter() {
                section.insert(
                    key.trim().to_lowercase(),
                    toml::Value::String(value.trim().to_string()),
                );
            }
        }
    }
    Ok(table)
}

fn section<'a>(table: &'a toml::Table, name: &str) -> Option<&'a toml::Table> {
    match table.get(name) {
        Some(toml::Value::Table(inner)) => Some(inner),
        Some(_) => {
            warn!(section = name, "Config section is not a table; using defaults");
            None
        }
        None => None,
    }
}

fn read_key<T: DeserializeOwned>(
    table: Option<&toml::Table>,
    section: &str,
    key: &str,
) -> Option<T> {
    let value = table?.get(key)?.clone();
    match value.try_into::<T>() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(section, key, error = %err, "Malformed config value; using default");
            None
        }
    }
}

fn read_bool(table: Option<&toml::Table>, section: &str, key: &str) -> Option<bool> {
    let parsed = read_key::<FlexBool>(table, section, key)?;
    let value = parsed.as_bool();
    if value.is_none() {
        warn!(section, key, "Config value is not a boolean; using default");
    }
    value
}

fn read_number(table: Option<&toml::Table>, section: &str, key: &str) -> Option<f64> {
    match table?.get(key)? {
        toml::Value::Integer(value) => Some(*value as f64),
        toml::Value::Float(value) if value.is_finite() => Some(*value),
        toml::Value::String(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => {
            warn!(section, key, "Config value is not a number; using default");
            None
        }
    }
}

/// Like `read_number`, but a value above `max` is rejected.
fn read_bounded(table: Option<&toml::Table>, section: &str, key: &str, max: f64) -> Option<f64> {
    let value = read_number(table, section, key)?;
    if value > max {
        warn!(section, key, value, max, "Config value out of range; using default");
        return None;
    }
    Some(value)
}

fn read_length(table: Option<&toml::Table>, section: &str, key: &str) -> Option<usize> {
    let value = read_number(table, section, key)?;
    if value < 0.0 {
        warn!(section, key, "Config length is negative; using default");
        return None;
    }
    Some((value as usize).max(MIN_TRUNCATE_LENGTH))
}

fn parse_palette(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .filter(|color| {
            let valid = RE_HEX_COLOR.is_match(color);
            if !valid {
                warn!(color = %color, "Dropping invalid palette color");
            }
            valid
        })
        .collect()
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn lowercase_set(items: Vec<String>) -> HashSet<String> {
    items.into_iter().map(|item| item.to_lowercase()).collect()
}

fn lowercase_list(items: Vec<String>) -> Vec<String> {
    items.into_iter().map(|item| item.to_lowercase()).collect()
}
