// src/registry/mod.rs

//! Task registry and target resolution.
//!
//! - [`target`] holds the static `Target` / `TaskDefinition` types.
//! - [`resolve`] turns a target's glob patterns into a concrete file list.
//! - [`builder`] derives a registry from a validated `ConfigFile`.

pub mod builder;
pub mod resolve;
pub mod target;

use indexmap::IndexMap;
use tracing::debug;

use crate::errors::{Result, TaskdeckError};
use crate::types::{Invocation, TaskName};

pub use builder::build_registry;
pub use resolve::{resolve_files, resolve_mappings, resolve_patterns, ResolvedMapping};
pub use target::{FileMapping, TaskDefinition, Target};

/// Owns every task definition for one engine run.
///
/// Registration order is preserved and is the order targets are expanded in.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: IndexMap<TaskName, TaskDefinition>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task with its targets.
    ///
    /// Fails with `DuplicateTask` if the name (or a target name within it)
    /// is already taken.
    pub fn register(&mut self, name: impl Into<TaskName>, targets: Vec<Target>) -> Result<()> {
        let name = name.into();
        if self.tasks.contains_key(&name) {
            return Err(TaskdeckError::DuplicateTask(name));
        }

        let mut by_name = IndexMap::with_capacity(targets.len());
        for target in targets {
            if target.task != name {
                return Err(TaskdeckError::ConfigError(format!(
                    "target '{}' belongs to task '{}', not '{}'",
                    target.name, target.task, name
                )));
            }
            let key = target.name.clone();
            if by_name.insert(key.clone(), target).is_some() {
                return Err(TaskdeckError::DuplicateTask(format!("{name}:{key}")));
            }
        }

        debug!(task = %name, targets = by_name.len(), "registered task");
        self.tasks
            .insert(name.clone(), TaskDefinition::new(name, by_name));
        Ok(())
    }

    /// Look up a task by name.
    pub fn lookup(&self, name: &str) -> Result<&TaskDefinition> {
        self.tasks
            .get(name)
            .ok_or_else(|| TaskdeckError::UnknownTask(name.to_string()))
    }

    /// Look up the target an invocation refers to.
    pub fn target(&self, invocation: &Invocation) -> Result<&Target> {
        self.lookup(&invocation.task)?
            .target(&invocation.target)
            .ok_or_else(|| TaskdeckError::UnknownTask(invocation.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskDefinition> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
