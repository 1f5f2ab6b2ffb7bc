// src/registry/builder.rs

//! Build a [`TaskRegistry`] from a validated [`ConfigFile`].
//!
//! Execution units are resolved here, once, so nothing is looked up by
//! string at run time.

use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::config::{effective_target, ConfigFile, EffectiveTarget, Options, TaskConfig};
use crate::errors::{Result, TaskdeckError};
use crate::exec::process::{BackgroundSpec, ProcessSpec};
use crate::exec::unit::{ExecutionUnit, UnitCatalog};
use crate::fs::FileSystem;
use crate::registry::target::{FileMapping, Target};
use crate::registry::TaskRegistry;
use crate::types::{parse_duration, DEFAULT_TARGET};

const DEFAULT_READY_TIMEOUT: &str = "10s";

pub fn build_registry(
    cfg: &ConfigFile,
    catalog: &UnitCatalog,
    fs: &dyn FileSystem,
    root: &Path,
) -> Result<TaskRegistry> {
    let os = std::env::consts::OS;
    let mut registry = TaskRegistry::new();

    for (name, task) in cfg.tasks().iter() {
        let baseline = load_baseline(fs, root, name, task)?;

        let layered: Vec<(String, EffectiveTarget)> = if task.targets.is_empty() {
            vec![(
                DEFAULT_TARGET.to_string(),
                effective_target(task, None, &baseline, os),
            )]
        } else {
            task.targets
                .iter()
                .map(|(target, tcfg)| {
                    (target.clone(), effective_target(task, Some(tcfg), &baseline, os))
                })
                .collect()
        };

        let targets = layered
            .into_iter()
            .map(|(target, eff)| build_target(catalog, name, task, &target, eff))
            .collect::<Result<Vec<_>>>()?;

        registry.register(name.clone(), targets)?;
    }

    debug!(tasks = registry.len(), "task registry built");
    Ok(registry)
}

fn load_baseline(
    fs: &dyn FileSystem,
    root: &Path,
    task_name: &str,
    task: &TaskConfig,
) -> Result<Options> {
    let Some(rel) = &task.options_file else {
        return Ok(Options::new());
    };

    let path = root.join(rel);
    let text = fs.read_to_string(&path)?;
    match serde_json::from_str::<serde_json::Value>(&text)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(TaskdeckError::ConfigError(format!(
            "options_file '{rel}' of task '{task_name}' must contain a JSON object"
        ))),
    }
}

fn build_target(
    catalog: &UnitCatalog,
    task_name: &str,
    task: &TaskConfig,
    target_name: &str,
    eff: EffectiveTarget,
) -> Result<Target> {
    let unit = if task.is_process() {
        ExecutionUnit::Process(process_spec(task_name, target_name, &eff)?)
    } else {
        let unit = catalog.get(&task.unit).ok_or_else(|| {
            TaskdeckError::ConfigError(format!(
                "task '{task_name}' uses unknown execution unit '{}' (known: process, {})",
                task.unit,
                catalog.names().collect::<Vec<_>>().join(", ")
            ))
        })?;
        ExecutionUnit::InProcess {
            name: task.unit.clone(),
            unit,
        }
    };

    let settings = eff.settings;
    let mappings = if settings.files.is_empty() {
        if settings.src.is_empty() && settings.dest.is_none() {
            Vec::new()
        } else {
            vec![FileMapping {
                dest: settings.dest,
                patterns: settings.src,
            }]
        }
    } else {
        settings
            .files
            .into_iter()
            .map(|(dest, patterns)| FileMapping {
                dest: Some(dest),
                patterns,
            })
            .collect()
    };

    Ok(Target {
        task: task_name.to_string(),
        name: target_name.to_string(),
        mappings,
        cwd: settings.cwd,
        require_matches: settings.require_matches.unwrap_or(false),
        options: eff.options,
        unit,
    })
}

fn process_spec(task: &str, target: &str, eff: &EffectiveTarget) -> Result<ProcessSpec> {
    let s = &eff.settings;
    let command = s.command.clone().ok_or_else(|| {
        TaskdeckError::ConfigError(format!("process target '{task}:{target}' has no `command`"))
    })?;

    let background = if s.background.unwrap_or(false) {
        let timeout_str = s.ready_timeout.as_deref().unwrap_or(DEFAULT_READY_TIMEOUT);
        let ready_timeout = parse_duration(timeout_str).map_err(|e| {
            TaskdeckError::ConfigError(format!("invalid ready_timeout for '{task}:{target}': {e}"))
        })?;
        Some(BackgroundSpec {
            ready_pattern: compile_regex(task, target, "ready_pattern", s.ready_pattern.as_deref())?,
            ready_timeout,
        })
    } else {
        None
    };

    Ok(ProcessSpec {
        command,
        args: s.args.clone().unwrap_or_default(),
        env: s.env.clone(),
        append_files: s.append_files.unwrap_or(false),
        fail_on_error: s.fail_on_error.unwrap_or(true),
        error_pattern: compile_regex(task, target, "error_pattern", s.error_pattern.as_deref())?,
        background,
    })
}

fn compile_regex(task: &str, target: &str, field: &str, pattern: Option<&str>) -> Result<Option<Regex>> {
    pattern
        .map(|p| {
            Regex::new(p).map_err(|e| {
                TaskdeckError::ConfigError(format!("invalid {field} for '{task}:{target}': {e}"))
            })
        })
        .transpose()
}
