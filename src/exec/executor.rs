// src/exec/executor.rs

//! Runs invocations one at a time against the registry.
//!
//! Every failure mode of a single step (unknown target, `NoMatch`, a unit
//! returning `Err` or panicking, a process exiting non-zero) is folded into
//! an [`ExecutionResult`]; nothing here returns `Err` for a failed step.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::errors::Result;
use crate::exec::background::BackgroundProcesses;
use crate::exec::process::{run_process, ProcessRequest};
use crate::exec::report::{ExecutionResult, ExecutionStatus, PipelineReport};
use crate::exec::unit::{ExecutionUnit, UnitContext};
use crate::fs::FileSystem;
use crate::registry::{resolve_mappings, TaskRegistry};
use crate::types::{FailurePolicy, Invocation};

#[derive(Debug)]
pub struct Executor {
    registry: Arc<TaskRegistry>,
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    background: BackgroundProcesses,
}

impl Executor {
    pub fn new(registry: Arc<TaskRegistry>, fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            fs,
            root: root.into(),
            background: BackgroundProcesses::new(),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn background(&self) -> &BackgroundProcesses {
        &self.background
    }

    /// Run one (task, target) pair.
    pub async fn run(&self, invocation: &Invocation) -> ExecutionResult {
        info!(task = %invocation.task, target = %invocation.target, "running");
        let started = Instant::now();

        let (status, output) = match self.dispatch(invocation).await {
            Ok(outcome) => outcome,
            Err(e) => (ExecutionStatus::Failed(e.to_string()), String::new()),
        };
        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;

        match &status {
            ExecutionStatus::Success => {
                info!(task = %invocation.task, target = %invocation.target, elapsed_ms, "finished")
            }
            ExecutionStatus::Tolerated(msg) => warn!(
                task = %invocation.task,
                target = %invocation.target,
                elapsed_ms,
                "failure tolerated: {msg}"
            ),
            ExecutionStatus::Failed(msg) => error!(
                task = %invocation.task,
                target = %invocation.target,
                elapsed_ms,
                "failed: {msg}"
            ),
        }

        ExecutionResult {
            invocation: invocation.clone(),
            status,
            output,
            elapsed,
        }
    }

    async fn dispatch(&self, invocation: &Invocation) -> Result<(ExecutionStatus, String)> {
        let target = self.registry.target(invocation)?;
        let mappings = resolve_mappings(self.fs.as_ref(), &self.root, target)?;
        let cwd = match &target.cwd {
            Some(cwd) => self.root.join(cwd),
            None => self.root.clone(),
        };

        match &target.unit {
            ExecutionUnit::InProcess { unit, .. } => {
                let ctx = UnitContext {
                    invocation: invocation.clone(),
                    root: self.root.clone(),
                    cwd,
                    options: target.options.clone(),
                    mappings,
                    fs: Arc::clone(&self.fs),
                };
                let unit = Arc::clone(unit);

                let joined = tokio::task::spawn_blocking(move || unit.run(&ctx)).await;
                Ok(match joined {
                    Ok(Ok(output)) => (ExecutionStatus::Success, output),
                    Ok(Err(e)) => (ExecutionStatus::Failed(format!("{e:#}")), String::new()),
                    Err(join) if join.is_panic() => (
                        ExecutionStatus::Failed(format!(
                            "unit panicked: {}",
                            panic_message(join.into_panic())
                        )),
                        String::new(),
                    ),
                    Err(_) => (
                        ExecutionStatus::Failed("unit was cancelled".to_string()),
                        String::new(),
                    ),
                })
            }
            ExecutionUnit::Process(spec) => {
                let files: Vec<String> = mappings.into_iter().flat_map(|m| m.files).collect();
                let req = ProcessRequest {
                    invocation,
                    spec,
                    cwd: &cwd,
                    files: &files,
                    options: &target.options,
                };
                let outcome = match &spec.background {
                    Some(background) => self.background.start(req, background).await?,
                    None => run_process(req).await?,
                };
                Ok(outcome)
            }
        }
    }

    /// Run `plan` strictly in order.
    ///
    /// Under [`FailurePolicy::Abort`] the first failure stops the pipeline
    /// and the remaining steps are recorded as skipped. Under
    /// [`FailurePolicy::Continue`] every step runs.
    pub async fn run_sequence(&self, plan: &[Invocation], policy: FailurePolicy) -> PipelineReport {
        let mut report = PipelineReport {
            policy,
            ..PipelineReport::default()
        };

        for (idx, invocation) in plan.iter().enumerate() {
            let result = self.run(invocation).await;
            let failed = result.is_failure();
            report.results.push(result);

            if failed && policy == FailurePolicy::Abort {
                report.skipped = plan[idx + 1..].to_vec();
                if !report.skipped.is_empty() {
                    warn!(
                        failed = %invocation,
                        skipped = report.skipped.len(),
                        "aborting pipeline"
                    );
                }
                break;
            }
        }

        report
    }

    /// Kill every background process started by this executor.
    pub async fn shutdown(&self) {
        self.background.shutdown_all().await;
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
