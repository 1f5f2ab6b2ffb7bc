#![allow(dead_code)]

use indexmap::IndexMap;
use serde_json::Value;
use taskdeck::config::{
    AliasSpec, ConfigFile, ConfigSection, RawConfigFile, TargetConfig, TaskConfig, WatchConfig,
    PROCESS_UNIT,
};
use taskdeck::errors::Result;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                task: IndexMap::new(),
                alias: IndexMap::new(),
                watch: IndexMap::new(),
            },
        }
    }

    pub fn debounce(mut self, value: &str) -> Self {
        self.config.config.debounce = value.to_string();
        self
    }

    pub fn continue_on_failure(mut self) -> Self {
        self.config.config.continue_on_failure = true;
        self
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_alias(mut self, name: &str, members: &[&str]) -> Self {
        self.config
            .alias
            .insert(name.to_string(), AliasSpec::Many(strings(members)));
        self
    }

    pub fn with_watch(mut self, name: &str, files: &[&str], tasks: &[&str], spawn: bool) -> Self {
        self.config.watch.insert(
            name.to_string(),
            WatchConfig {
                files: strings(files),
                tasks: strings(tasks),
                spawn,
            },
        );
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`. Settings given here are task-level defaults
/// shared by every target.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// A process task running `command`.
    pub fn process(command: &str) -> Self {
        let mut builder = Self::unit(PROCESS_UNIT);
        builder.task.defaults.command = Some(command.to_string());
        builder
    }

    /// A task run by the named in-process unit.
    pub fn unit(unit: &str) -> Self {
        Self {
            task: TaskConfig {
                unit: unit.to_string(),
                options_file: None,
                defaults: TargetConfig::default(),
                targets: IndexMap::new(),
            },
        }
    }

    pub fn src(mut self, patterns: &[&str]) -> Self {
        self.task.defaults.src = strings(patterns);
        self
    }

    pub fn option(mut self, key: &str, value: Value) -> Self {
        self.task.defaults.options.insert(key.to_string(), value);
        self
    }

    pub fn options_file(mut self, path: &str) -> Self {
        self.task.options_file = Some(path.to_string());
        self
    }

    pub fn fail_on_error(mut self, value: bool) -> Self {
        self.task.defaults.fail_on_error = Some(value);
        self
    }

    pub fn target(mut self, name: &str, target: TargetConfig) -> Self {
        self.task.targets.insert(name.to_string(), target);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Builder for `TargetConfig`.
#[derive(Default)]
pub struct TargetConfigBuilder {
    target: TargetConfig,
}

impl TargetConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn src(mut self, patterns: &[&str]) -> Self {
        self.target.src = strings(patterns);
        self
    }

    pub fn dest(mut self, dest: &str) -> Self {
        self.target.dest = Some(dest.to_string());
        self
    }

    pub fn files(mut self, dest: &str, patterns: &[&str]) -> Self {
        self.target.files.insert(dest.to_string(), strings(patterns));
        self
    }

    pub fn cwd(mut self, cwd: &str) -> Self {
        self.target.cwd = Some(cwd.to_string());
        self
    }

    pub fn require_matches(mut self) -> Self {
        self.target.require_matches = Some(true);
        self
    }

    pub fn option(mut self, key: &str, value: Value) -> Self {
        self.target.options.insert(key.to_string(), value);
        self
    }

    pub fn option_os(mut self, os: &str, key: &str, value: Value) -> Self {
        self.target
            .options_os
            .entry(os.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self
    }

    pub fn command(mut self, command: &str) -> Self {
        self.target.command = Some(command.to_string());
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.target.args = Some(strings(args));
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.target.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn append_files(mut self) -> Self {
        self.target.append_files = Some(true);
        self
    }

    pub fn fail_on_error(mut self, value: bool) -> Self {
        self.target.fail_on_error = Some(value);
        self
    }

    pub fn error_pattern(mut self, pattern: &str) -> Self {
        self.target.error_pattern = Some(pattern.to_string());
        self
    }

    pub fn background(mut self, ready_pattern: Option<&str>, ready_timeout: &str) -> Self {
        self.target.background = Some(true);
        self.target.ready_pattern = ready_pattern.map(str::to_string);
        self.target.ready_timeout = Some(ready_timeout.to_string());
        self
    }

    pub fn build(self) -> TargetConfig {
        self.target
    }
}
