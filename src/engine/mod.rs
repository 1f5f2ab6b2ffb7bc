// src/engine/mod.rs

//! Orchestration engine for taskdeck.
//!
//! An [`Engine`] is built once per invocation from a validated
//! configuration. It ties together:
//! - the task registry (tasks, targets and their resolved execution units)
//! - the alias composer
//! - the compiled watch rules
//! - the shared executor (which also owns background processes)
//!
//! Text output for the CLI (plans, listings, time summaries) lives in
//! [`render`].

pub mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{ConfigFile, Settings};
use crate::errors::Result;
use crate::exec::{Executor, PipelineReport, UnitCatalog};
use crate::fs::FileSystem;
use crate::plan::Composer;
use crate::registry::{build_registry, resolve_files, TaskRegistry};
use crate::types::{FailurePolicy, Invocation};
use crate::watch::{build_watch_rules, WatchCore, WatchRule};

/// One step of a plan as shown by `--dry-run`.
#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub invocation: Invocation,
    /// Execution unit name (`process`, `concat`, ...).
    pub unit: String,
    /// Resolved input files, or why resolution failed.
    pub files: std::result::Result<Vec<String>, String>,
}

#[derive(Debug)]
pub struct Engine {
    settings: Settings,
    root: PathBuf,
    registry: Arc<TaskRegistry>,
    composer: Composer,
    rules: Vec<WatchRule>,
    executor: Arc<Executor>,
    fs: Arc<dyn FileSystem>,
}

impl Engine {
    /// Register every task, compile aliases and watch rules.
    ///
    /// Fails with a configuration error before anything runs.
    pub fn build(
        cfg: &ConfigFile,
        catalog: &UnitCatalog,
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
    ) -> Result<Self> {
        let root = root.into();
        let registry = Arc::new(build_registry(cfg, catalog, fs.as_ref(), &root)?);
        let composer = Composer::from_config(Arc::clone(&registry), cfg);
        let rules = build_watch_rules(cfg, &composer)?;
        let executor = Arc::new(Executor::new(
            Arc::clone(&registry),
            Arc::clone(&fs),
            root.clone(),
        ));

        debug!(
            tasks = registry.len(),
            aliases = composer.aliases().len(),
            watch_rules = rules.len(),
            "engine built"
        );

        Ok(Self {
            settings: *cfg.settings(),
            root,
            registry,
            composer,
            rules,
            executor,
            fs,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn watch_rules(&self) -> &[WatchRule] {
        &self.rules
    }

    pub fn executor(&self) -> Arc<Executor> {
        Arc::clone(&self.executor)
    }

    /// Failure policy from `[config] continue_on_failure`.
    pub fn default_policy(&self) -> FailurePolicy {
        FailurePolicy::from_continue_flag(self.settings.continue_on_failure)
    }

    /// Expand requested names into one concatenated pipeline.
    pub fn plan<I, S>(&self, names: I) -> Result<Vec<Invocation>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.composer.expand_all(names)
    }

    /// Resolve what each step of `plan` would run on, without running it.
    pub fn describe(&self, plan: &[Invocation]) -> Vec<PlannedStep> {
        plan.iter()
            .map(|invocation| {
                let (unit, files) = match self.registry.target(invocation) {
                    Ok(target) => (
                        target.unit.kind().to_string(),
                        resolve_files(self.fs.as_ref(), &self.root, target)
                            .map_err(|e| e.to_string()),
                    ),
                    Err(e) => ("?".to_string(), Err(e.to_string())),
                };
                PlannedStep {
                    invocation: invocation.clone(),
                    unit,
                    files,
                }
            })
            .collect()
    }

    /// Expand `names` and run the pipeline.
    ///
    /// `Err` is returned only for configuration errors (unknown names);
    /// step failures are reported inside the [`PipelineReport`].
    pub async fn run_pipeline<I, S>(&self, names: I, policy: FailurePolicy) -> Result<PipelineReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let plan = self.plan(names)?;
        info!(steps = plan.len(), ?policy, "running pipeline");
        Ok(self.executor.run_sequence(&plan, policy).await)
    }

    /// A fresh watch state machine over this engine's rules.
    pub fn watch_core(&self) -> WatchCore {
        WatchCore::new(self.rules.clone(), self.settings.debounce)
    }

    /// Stop every background process.
    pub async fn shutdown(&self) {
        self.executor.shutdown().await;
    }
}
