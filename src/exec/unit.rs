// src/exec/unit.rs

//! Execution units: the closed set of things a target can run.
//!
//! A target is either run by an in-process unit (a plain function over the
//! resolved files and options) or by an external process. In-process units
//! are looked up by name in a [`UnitCatalog`] once, when the registry is
//! built.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::{Options, PROCESS_UNIT};
use crate::errors::{Result, TaskdeckError};
use crate::exec::builtin::{ConcatUnit, FilesUnit};
use crate::exec::process::ProcessSpec;
use crate::fs::FileSystem;
use crate::registry::ResolvedMapping;
use crate::types::Invocation;

/// Logic that runs inside the engine process.
///
/// Units may be invoked repeatedly (watch mode with `spawn = false`), so
/// they must not rely on state left over from an earlier call. An `Err` or a
/// panic is turned into a failed step by the executor.
pub trait InProcessUnit: Send + Sync + fmt::Debug {
    /// Run the unit and return its captured output.
    fn run(&self, ctx: &UnitContext) -> anyhow::Result<String>;
}

/// Everything an in-process unit receives for one invocation.
#[derive(Debug, Clone)]
pub struct UnitContext {
    pub invocation: Invocation,
    /// Project root; destinations are relative to it.
    pub root: PathBuf,
    /// Directory the resolved files are relative to.
    pub cwd: PathBuf,
    pub options: Options,
    pub mappings: Vec<ResolvedMapping>,
    pub fs: Arc<dyn FileSystem>,
}

impl UnitContext {
    /// All resolved files across mappings, in order.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.mappings
            .iter()
            .flat_map(|m| m.files.iter().map(String::as_str))
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }
}

/// How a target is executed.
#[derive(Debug, Clone)]
pub enum ExecutionUnit {
    InProcess {
        name: String,
        unit: Arc<dyn InProcessUnit>,
    },
    Process(ProcessSpec),
}

impl ExecutionUnit {
    pub fn kind(&self) -> &str {
        match self {
            ExecutionUnit::InProcess { name, .. } => name,
            ExecutionUnit::Process(_) => PROCESS_UNIT,
        }
    }
}

/// Named in-process units available to configurations.
#[derive(Debug, Clone, Default)]
pub struct UnitCatalog {
    units: IndexMap<String, Arc<dyn InProcessUnit>>,
}

impl UnitCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog with the built-in `concat` and `files` units.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.units.insert("concat".to_string(), Arc::new(ConcatUnit));
        catalog.units.insert("files".to_string(), Arc::new(FilesUnit));
        catalog
    }

    pub fn register(&mut self, name: impl Into<String>, unit: Arc<dyn InProcessUnit>) -> Result<()> {
        let name = name.into();
        if name == PROCESS_UNIT || self.units.contains_key(&name) {
            return Err(TaskdeckError::ConfigError(format!(
                "execution unit '{name}' is already defined"
            )));
        }
        self.units.insert(name, unit);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn InProcessUnit>> {
        self.units.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }
}
