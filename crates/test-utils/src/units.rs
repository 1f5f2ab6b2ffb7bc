//! In-process units for exercising the executor without real work.

use std::sync::{Arc, Mutex};

use anyhow::bail;
use taskdeck::exec::{InProcessUnit, UnitContext};
use taskdeck::types::Invocation;

/// Shared, ordered log of invocations seen by test units.
pub type CallLog = Arc<Mutex<Vec<Invocation>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Snapshot of a call log as `task:target` strings.
pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().iter().map(ToString::to_string).collect()
}

/// Records every invocation and succeeds, echoing the resolved files.
#[derive(Debug, Clone)]
pub struct RecordingUnit {
    log: CallLog,
}

impl RecordingUnit {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl InProcessUnit for RecordingUnit {
    fn run(&self, ctx: &UnitContext) -> anyhow::Result<String> {
        self.log.lock().unwrap().push(ctx.invocation.clone());
        Ok(ctx.files().collect::<Vec<_>>().join("\n"))
    }
}

/// Records the invocation, then fails for the listed targets.
#[derive(Debug, Clone)]
pub struct FailingUnit {
    log: CallLog,
    failing_targets: Vec<String>,
}

impl FailingUnit {
    /// Fails for every target.
    pub fn always(log: CallLog) -> Self {
        Self {
            log,
            failing_targets: Vec::new(),
        }
    }

    pub fn for_targets(log: CallLog, targets: &[&str]) -> Self {
        Self {
            log,
            failing_targets: targets.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl InProcessUnit for FailingUnit {
    fn run(&self, ctx: &UnitContext) -> anyhow::Result<String> {
        self.log.lock().unwrap().push(ctx.invocation.clone());
        let target = &ctx.invocation.target;
        if self.failing_targets.is_empty() || self.failing_targets.contains(target) {
            bail!("{} reported errors", ctx.invocation);
        }
        Ok(String::new())
    }
}

/// Panics on every call.
#[derive(Debug, Clone, Default)]
pub struct PanickingUnit;

impl InProcessUnit for PanickingUnit {
    fn run(&self, ctx: &UnitContext) -> anyhow::Result<String> {
        panic!("unit blew up on {}", ctx.invocation);
    }
}
