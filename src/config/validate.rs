// src/config/validate.rs

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, Settings, TaskConfig};
use crate::errors::{Result, TaskdeckError};
use crate::types::{parse_duration, TaskRef};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = TaskdeckError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        let settings = validate_global_config(&raw)?;
        validate_task_names(&raw)?;
        validate_process_tasks(&raw)?;

        let aliases = parse_aliases(&raw)?;
        for (name, refs) in aliases.iter() {
            for r in refs {
                check_reference(&raw.task, &aliases, r)
                    .map_err(|e| annotate(e, &format!("alias '{name}'")))?;
            }
        }
        validate_alias_graph(&aliases)?;
        validate_watch_rules(&raw, &aliases)?;

        Ok(ConfigFile::new_unchecked(settings, raw.task, aliases, raw.watch))
    }
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(TaskdeckError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<Settings> {
    let debounce = parse_duration(&cfg.config.debounce).map_err(|e| {
        TaskdeckError::ConfigError(format!("invalid [config].debounce: {e}"))
    })?;

    Ok(Settings {
        debounce,
        continue_on_failure: cfg.config.continue_on_failure,
    })
}

fn validate_task_names(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if name.is_empty() || name.contains(':') {
            return Err(TaskdeckError::ConfigError(format!(
                "invalid task name '{name}' (must be non-empty and must not contain ':')"
            )));
        }
        for target in task.targets.keys() {
            if target.is_empty() || target.contains(':') {
                return Err(TaskdeckError::ConfigError(format!(
                    "invalid target name '{target}' in task '{name}'"
                )));
            }
        }
    }

    for alias in cfg.alias.keys() {
        if cfg.task.contains_key(alias) {
            return Err(TaskdeckError::DuplicateTask(format!(
                "'{alias}' is declared both as a task and as an alias"
            )));
        }
    }
    Ok(())
}

fn validate_process_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter().filter(|(_, t)| t.is_process()) {
        let task_level = task.defaults.command.is_some();
        if task.targets.is_empty() {
            if !task_level {
                return Err(TaskdeckError::ConfigError(format!(
                    "process task '{name}' has no `command`"
                )));
            }
            continue;
        }
        for (target, cfg) in task.targets.iter() {
            if !task_level && cfg.command.is_none() {
                return Err(TaskdeckError::ConfigError(format!(
                    "process target '{name}:{target}' has no `command`"
                )));
            }
        }
    }
    Ok(())
}

fn parse_aliases(cfg: &RawConfigFile) -> Result<IndexMap<String, Vec<TaskRef>>> {
    let mut aliases = IndexMap::with_capacity(cfg.alias.len());
    for (name, spec) in cfg.alias.iter() {
        let refs = spec
            .entries()
            .into_iter()
            .map(|raw| {
                TaskRef::parse(raw).map_err(|e| {
                    TaskdeckError::ConfigError(format!("alias '{name}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        aliases.insert(name.clone(), refs);
    }
    Ok(aliases)
}

/// Check that a reference names an existing task, task target or alias.
fn check_reference(
    tasks: &IndexMap<String, TaskConfig>,
    aliases: &IndexMap<String, Vec<TaskRef>>,
    r: &TaskRef,
) -> Result<()> {
    match (&r.target, tasks.get(&r.name)) {
        (None, Some(_)) => Ok(()),
        (None, None) if aliases.contains_key(&r.name) => Ok(()),
        (Some(target), Some(task)) => {
            let known = if task.targets.is_empty() {
                target == crate::types::DEFAULT_TARGET
            } else {
                task.targets.contains_key(target)
            };
            if known {
                Ok(())
            } else {
                Err(TaskdeckError::UnknownTask(r.to_string()))
            }
        }
        _ => Err(TaskdeckError::UnknownTask(r.to_string())),
    }
}

fn annotate(err: TaskdeckError, context: &str) -> TaskdeckError {
    match err {
        TaskdeckError::UnknownTask(name) => {
            TaskdeckError::UnknownTask(format!("{name} (referenced by {context})"))
        }
        other => other,
    }
}

fn validate_alias_graph(aliases: &IndexMap<String, Vec<TaskRef>>) -> Result<()> {
    // Edge direction: alias -> alias it references. Task references are
    // leaves and cannot take part in a cycle.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in aliases.keys() {
        graph.add_node(name.as_str());
    }
    for (name, refs) in aliases.iter() {
        for r in refs.iter().filter(|r| aliases.contains_key(&r.name)) {
            graph.add_edge(name.as_str(), r.name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let start = cycle.node_id();
            let path = find_cycle_path(aliases, start)
                .unwrap_or_else(|| vec![start.to_string(), start.to_string()]);
            Err(TaskdeckError::CyclicAlias(path.join(" -> ")))
        }
    }
}

/// Depth-first walk from `start` returning the first cycle found, written
/// as the chain of alias names from the repeated name back to itself.
fn find_cycle_path(aliases: &IndexMap<String, Vec<TaskRef>>, start: &str) -> Option<Vec<String>> {
    fn visit(
        aliases: &IndexMap<String, Vec<TaskRef>>,
        name: &str,
        stack: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        if let Some(pos) = stack.iter().position(|n| n == name) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(name.to_string());
            return Some(cycle);
        }
        let refs = aliases.get(name)?;
        stack.push(name.to_string());
        for r in refs {
            if let Some(cycle) = visit(aliases, &r.name, stack) {
                return Some(cycle);
            }
        }
        stack.pop();
        None
    }

    visit(aliases, start, &mut Vec::new())
}

fn validate_watch_rules(
    cfg: &RawConfigFile,
    aliases: &IndexMap<String, Vec<TaskRef>>,
) -> Result<()> {
    for (name, rule) in cfg.watch.iter() {
        if rule.files.iter().all(|p| p.starts_with('!')) {
            return Err(TaskdeckError::ConfigError(format!(
                "watch rule '{name}' needs at least one non-negated pattern in `files`"
            )));
        }
        if rule.tasks.is_empty() {
            return Err(TaskdeckError::ConfigError(format!(
                "watch rule '{name}' has no `tasks`"
            )));
        }
        for raw in rule.tasks.iter() {
            let r = TaskRef::parse(raw).map_err(|e| {
                TaskdeckError::ConfigError(format!("watch rule '{name}': {e}"))
            })?;
            check_reference(&cfg.task, aliases, &r)
                .map_err(|e| annotate(e, &format!("watch rule '{name}'")))?;
        }
    }
    Ok(())
}
