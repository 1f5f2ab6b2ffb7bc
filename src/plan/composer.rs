// src/plan/composer.rs

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::config::ConfigFile;
use crate::errors::{Result, TaskdeckError};
use crate::registry::{Target, TaskRegistry};
use crate::types::{Invocation, TaskRef};

/// Expands requested names into an ordered list of invocations.
#[derive(Debug, Clone)]
pub struct Composer {
    registry: Arc<TaskRegistry>,
    aliases: IndexMap<String, Vec<TaskRef>>,
}

impl Composer {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self {
            registry,
            aliases: IndexMap::new(),
        }
    }

    pub fn from_config(registry: Arc<TaskRegistry>, cfg: &ConfigFile) -> Self {
        Self {
            registry,
            aliases: cfg.aliases().clone(),
        }
    }

    /// Add an alias. Its members are only checked when it is expanded.
    pub fn define_alias(&mut self, name: impl Into<String>, members: Vec<TaskRef>) -> Result<()> {
        let name = name.into();
        if self.registry.contains(&name) || self.aliases.contains_key(&name) {
            return Err(TaskdeckError::DuplicateTask(name));
        }
        self.aliases.insert(name, members);
        Ok(())
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    pub fn aliases(&self) -> &IndexMap<String, Vec<TaskRef>> {
        &self.aliases
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Expand one requested name (`task`, `task:target` or alias).
    pub fn expand(&self, requested: &str) -> Result<Vec<Invocation>> {
        let reference = TaskRef::parse(requested).map_err(TaskdeckError::ConfigError)?;
        self.expand_ref(&reference)
    }

    pub fn expand_ref(&self, reference: &TaskRef) -> Result<Vec<Invocation>> {
        let mut plan = Vec::new();
        let mut stack = Vec::new();
        self.visit(reference, &mut stack, &mut plan)?;
        debug!(requested = %reference, steps = plan.len(), "expanded");
        Ok(plan)
    }

    /// Expand several names and concatenate the results.
    pub fn expand_all<I, S>(&self, names: I) -> Result<Vec<Invocation>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut plan = Vec::new();
        for name in names {
            plan.extend(self.expand(name.as_ref())?);
        }
        Ok(plan)
    }

    // Depth-first; `stack` holds the aliases currently being expanded.
    fn visit(
        &self,
        reference: &TaskRef,
        stack: &mut Vec<String>,
        plan: &mut Vec<Invocation>,
    ) -> Result<()> {
        if let Some(target) = &reference.target {
            let task = self.registry.lookup(&reference.name)?;
            let target = task
                .target(target)
                .ok_or_else(|| TaskdeckError::UnknownTask(reference.to_string()))?;
            plan.push(target.invocation());
            return Ok(());
        }

        if let Some(members) = self.aliases.get(&reference.name) {
            if let Some(pos) = stack.iter().position(|n| *n == reference.name) {
                let mut cycle = stack[pos..].to_vec();
                cycle.push(reference.name.clone());
                return Err(TaskdeckError::CyclicAlias(cycle.join(" -> ")));
            }

            stack.push(reference.name.clone());
            for member in members {
                self.visit(member, stack, plan)?;
            }
            stack.pop();
            return Ok(());
        }

        let task = self.registry.lookup(&reference.name)?;
        plan.extend(task.targets().map(Target::invocation));
        Ok(())
    }
}
