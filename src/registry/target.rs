// src/registry/target.rs

//! Static task/target definitions held by the registry.

use indexmap::IndexMap;

use crate::config::Options;
use crate::exec::unit::ExecutionUnit;
use crate::types::{Invocation, TargetName, TaskName};

/// One group of input patterns with an optional destination.
///
/// `src`/`dest` targets produce a single mapping; a `files` table produces
/// one mapping per destination, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMapping {
    /// Destination path relative to the project root.
    pub dest: Option<String>,
    pub patterns: Vec<String>,
}

/// A concrete, independently runnable configuration of a task.
#[derive(Debug, Clone)]
pub struct Target {
    pub task: TaskName,
    pub name: TargetName,
    pub mappings: Vec<FileMapping>,
    /// Directory (relative to the project root) patterns are evaluated in.
    pub cwd: Option<String>,
    pub require_matches: bool,
    /// Effective options after layering.
    pub options: Options,
    pub unit: ExecutionUnit,
}

impl Target {
    pub fn new(task: impl Into<TaskName>, name: impl Into<TargetName>, unit: ExecutionUnit) -> Self {
        Self {
            task: task.into(),
            name: name.into(),
            mappings: Vec::new(),
            cwd: None,
            require_matches: false,
            options: Options::new(),
            unit,
        }
    }

    /// Add a mapping without a destination.
    pub fn with_src<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mappings.push(FileMapping {
            dest: None,
            patterns: patterns.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Add a mapping writing to `dest`.
    pub fn with_files<I, S>(mut self, dest: impl Into<String>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mappings.push(FileMapping {
            dest: Some(dest.into()),
            patterns: patterns.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn requiring_matches(mut self) -> Self {
        self.require_matches = true;
        self
    }

    pub fn invocation(&self) -> Invocation {
        Invocation::new(self.task.clone(), self.name.clone())
    }

    /// All input patterns across every mapping, in declaration order.
    pub fn patterns(&self) -> Vec<String> {
        self.mappings
            .iter()
            .flat_map(|m| m.patterns.iter().cloned())
            .collect()
    }
}

/// A registered task and its targets, in registration order.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    name: TaskName,
    targets: IndexMap<TargetName, Target>,
}

impl TaskDefinition {
    pub(crate) fn new(name: TaskName, targets: IndexMap<TargetName, Target>) -> Self {
        Self { name, targets }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
