// src/config/model.rs

use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::types::TaskRef;

/// Opaque option object handed to execution units.
pub type Options = serde_json::Map<String, serde_json::Value>;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// debounce = "250ms"
///
/// [task.jshint]
/// unit = "process"
/// command = "jshint"
///
/// [task.jshint.targets.node]
/// src = ["lib/**/*.js", "app.js"]
///
/// [alias]
/// validate = ["jshint", "jsbeautifier:verify"]
///
/// [watch.node]
/// files = ["lib/**/*.js"]
/// tasks = ["jshint:node"]
/// spawn = false
/// ```
///
/// Maps are ordered: declaration order is registration order.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Global behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: IndexMap<String, TaskConfig>,

    /// Aliases from `[alias]`: `name = ["ref", ...]` or `name = "ref"`.
    #[serde(default)]
    pub alias: IndexMap<String, AliasSpec>,

    /// Watch rules from `[watch.<rule>]`.
    #[serde(default)]
    pub watch: IndexMap<String, WatchConfig>,
}

/// Validated configuration.
///
/// Constructed only through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// every reference inside is known to resolve and the alias graph is acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    settings: Settings,
    tasks: IndexMap<String, TaskConfig>,
    aliases: IndexMap<String, Vec<TaskRef>>,
    watch: IndexMap<String, WatchConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        settings: Settings,
        tasks: IndexMap<String, TaskConfig>,
        aliases: IndexMap<String, Vec<TaskRef>>,
        watch: IndexMap<String, WatchConfig>,
    ) -> Self {
        Self {
            settings,
            tasks,
            aliases,
            watch,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tasks(&self) -> &IndexMap<String, TaskConfig> {
        &self.tasks
    }

    pub fn aliases(&self) -> &IndexMap<String, Vec<TaskRef>> {
        &self.aliases
    }

    pub fn watch_rules(&self) -> &IndexMap<String, WatchConfig> {
        &self.watch
    }
}

/// Effective global settings derived from `[config]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub debounce: Duration,
    pub continue_on_failure: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(250),
            continue_on_failure: false,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Quiescence window used to coalesce bursts of file changes.
    #[serde(default = "default_debounce")]
    pub debounce: String,

    /// Keep running the remaining steps of a pipeline after a failure.
    #[serde(default)]
    pub continue_on_failure: bool,
}

fn default_debounce() -> String {
    "250ms".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            debounce: default_debounce(),
            continue_on_failure: false,
        }
    }
}

/// `[task.<name>]` section.
///
/// Everything a target can declare may also be declared at task level, where
/// it acts as the default for every target. A task without a `targets` table
/// gets a single implicit target named `default` built from these fields.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Execution unit: `"process"` or the name of an in-process unit.
    #[serde(default = "default_unit")]
    pub unit: String,

    /// JSON file whose top-level object is the option baseline for every
    /// target (e.g. a shared `.jshintrc`).
    #[serde(default)]
    pub options_file: Option<String>,

    #[serde(flatten)]
    pub defaults: TargetConfig,

    #[serde(default)]
    pub targets: IndexMap<String, TargetConfig>,
}

pub const PROCESS_UNIT: &str = "process";

fn default_unit() -> String {
    PROCESS_UNIT.to_string()
}

impl TaskConfig {
    pub fn is_process(&self) -> bool {
        self.unit == PROCESS_UNIT
    }
}

/// `[task.<name>.targets.<target>]` section (also flattened into the task).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TargetConfig {
    /// Ordered input patterns; `!pattern` removes earlier matches.
    #[serde(default)]
    pub src: Vec<String>,

    /// Output location for `src`.
    #[serde(default)]
    pub dest: Option<String>,

    /// Destination mapping: `{ "out.js" = ["a/**/*.js"] }`.
    #[serde(default)]
    pub files: IndexMap<String, Vec<String>>,

    /// Directory (relative to the project root) patterns are evaluated in.
    #[serde(default)]
    pub cwd: Option<String>,

    /// Fail with a no-match error when the patterns resolve to nothing.
    #[serde(default)]
    pub require_matches: Option<bool>,

    #[serde(default)]
    pub options: Options,

    /// Per-OS option overlays keyed by `std::env::consts::OS`
    /// (`"linux"`, `"macos"`, `"windows"`).
    #[serde(default)]
    pub options_os: IndexMap<String, Options>,

    /// Command line for `unit = "process"`, run through the platform shell.
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Option<Vec<String>>,

    #[serde(default)]
    pub env: IndexMap<String, String>,

    /// Append the resolved files to the argument list.
    #[serde(default)]
    pub append_files: Option<bool>,

    /// When false, a failing process is logged but does not fail the step.
    #[serde(default)]
    pub fail_on_error: Option<bool>,

    /// Regex; an output line matching it marks the run as failed.
    #[serde(default)]
    pub error_pattern: Option<String>,

    /// Keep the process running after the step completes (dev servers).
    #[serde(default)]
    pub background: Option<bool>,

    /// Regex; a background process is ready once a line matches.
    #[serde(default)]
    pub ready_pattern: Option<String>,

    /// Maximum time to wait for `ready_pattern`, e.g. `"5s"`.
    #[serde(default)]
    pub ready_timeout: Option<String>,
}

/// Alias value: either a single reference or an ordered list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AliasSpec {
    One(String),
    Many(Vec<String>),
}

impl AliasSpec {
    pub fn entries(&self) -> Vec<&str> {
        match self {
            AliasSpec::One(entry) => vec![entry.as_str()],
            AliasSpec::Many(entries) => entries.iter().map(String::as_str).collect(),
        }
    }
}

/// `[watch.<rule>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Patterns (relative to the project root); `!pattern` excludes.
    pub files: Vec<String>,

    /// References run, in order, when a matching file changes.
    pub tasks: Vec<String>,

    /// Run each re-run in a freshly started process.
    #[serde(default = "default_spawn")]
    pub spawn: bool,
}

fn default_spawn() -> bool {
    true
}
