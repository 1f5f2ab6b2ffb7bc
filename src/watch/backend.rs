// src/watch/backend.rs

//! How a fired watch rule is executed.
//!
//! The runtime talks to a `WatchBackend` instead of the executor directly,
//! so tests can substitute a fake that records which rules ran.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, info};

use crate::exec::Executor;
use crate::types::FailurePolicy;
use crate::watch::rules::WatchRule;

/// What happened when one rule ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub rule: String,
    /// `None` on success; otherwise the error to log.
    pub failure: Option<String>,
    pub elapsed: Duration,
}

impl RuleOutcome {
    pub fn success(rule: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            rule: rule.into(),
            failure: None,
            elapsed,
        }
    }

    pub fn failed(rule: impl Into<String>, failure: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            rule: rule.into(),
            failure: Some(failure.into()),
            elapsed,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Runs the plan of a fired rule.
///
/// The returned future must not borrow `self` or `rule`: the runtime spawns
/// it so it can keep receiving events meanwhile.
pub trait WatchBackend: Send + Sync + 'static {
    fn run_rule(&self, rule: &WatchRule) -> Pin<Box<dyn Future<Output = RuleOutcome> + Send>>;
}

/// Re-runs a rule in a fresh `taskdeck run` child process.
#[derive(Debug, Clone)]
pub struct SpawnLauncher {
    program: PathBuf,
    config: PathBuf,
    policy: FailurePolicy,
}

impl SpawnLauncher {
    /// Launch children with the currently running executable.
    pub fn current_exe(config: impl Into<PathBuf>, policy: FailurePolicy) -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, config, policy))
    }

    pub fn new(program: impl Into<PathBuf>, config: impl Into<PathBuf>, policy: FailurePolicy) -> Self {
        Self {
            program: program.into(),
            config: config.into(),
            policy,
        }
    }

    /// The child command for `rule`:
    /// `<program> --config <file> run --no-hold <refs...>`.
    pub fn command(&self, rule: &WatchRule) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--config").arg(&self.config).arg("run").arg("--no-hold");
        if self.policy == FailurePolicy::Continue {
            cmd.arg("--continue-on-failure");
        }
        cmd.args(rule.refs().iter().map(ToString::to_string))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    fn launch(&self, rule: &WatchRule) -> Pin<Box<dyn Future<Output = RuleOutcome> + Send>> {
        let name = rule.name().to_string();
        let mut cmd = self.command(rule);
        debug!(rule = %name, program = ?self.program, "spawning child run");

        Box::pin(async move {
            let started = Instant::now();
            match cmd.status().await {
                Ok(status) if status.success() => RuleOutcome::success(name, started.elapsed()),
                Ok(status) => RuleOutcome::failed(
                    name,
                    format!("child run exited with code {}", status.code().unwrap_or(-1)),
                    started.elapsed(),
                ),
                Err(e) => RuleOutcome::failed(name, format!("failed to spawn child run: {e}"), started.elapsed()),
            }
        })
    }
}

/// Production backend: `spawn = false` rules go through the shared
/// executor, `spawn = true` rules through a child process.
#[derive(Debug, Clone)]
pub struct EngineBackend {
    executor: Arc<Executor>,
    launcher: SpawnLauncher,
    policy: FailurePolicy,
}

impl EngineBackend {
    pub fn new(executor: Arc<Executor>, launcher: SpawnLauncher, policy: FailurePolicy) -> Self {
        Self {
            executor,
            launcher,
            policy,
        }
    }
}

impl WatchBackend for EngineBackend {
    fn run_rule(&self, rule: &WatchRule) -> Pin<Box<dyn Future<Output = RuleOutcome> + Send>> {
        if rule.spawn() {
            return self.launcher.launch(rule);
        }

        let executor = Arc::clone(&self.executor);
        let plan = rule.plan().to_vec();
        let name = rule.name().to_string();
        let policy = self.policy;

        Box::pin(async move {
            info!(rule = %name, steps = plan.len(), "re-running in process");
            let report = executor.run_sequence(&plan, policy).await;
            let elapsed = report.total_elapsed();
            match report.first_error() {
                None => RuleOutcome::success(name, elapsed),
                Some(err) => {
                    let failed = report.failures().count();
                    let failure = if failed > 1 {
                        format!("{err} (and {} more)", failed - 1)
                    } else {
                        err.to_string()
                    };
                    RuleOutcome::failed(name, failure, elapsed)
                }
            }
        })
    }
}
