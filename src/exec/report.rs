// src/exec/report.rs

use std::time::Duration;

use crate::errors::TaskdeckError;
use crate::types::{FailurePolicy, Invocation};

/// Outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    /// The step failed but was configured not to fail the pipeline
    /// (`fail_on_error = false`). Logged, never propagated.
    Tolerated(String),
    Failed(String),
}

impl ExecutionStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, ExecutionStatus::Failed(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ExecutionStatus::Success => None,
            ExecutionStatus::Tolerated(msg) | ExecutionStatus::Failed(msg) => Some(msg),
        }
    }
}

/// Result of running one (task, target) pair. Consumed immediately by the
/// caller; never persisted.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub invocation: Invocation,
    pub status: ExecutionStatus,
    pub output: String,
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// The failure as an error value carrying task, target and message.
    pub fn to_error(&self) -> Option<TaskdeckError> {
        match &self.status {
            ExecutionStatus::Failed(message) => Some(TaskdeckError::ExecutionFailure {
                task: self.invocation.task.clone(),
                target: self.invocation.target.clone(),
                message: message.clone(),
            }),
            _ => None,
        }
    }
}

/// Results of a sequential pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub policy: FailurePolicy,
    /// Every step that ran, in order. Under `Abort`, the last entry is the
    /// failing one if the pipeline stopped early.
    pub results: Vec<ExecutionResult>,
    /// Steps never started because an earlier step failed.
    pub skipped: Vec<Invocation>,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        !self.results.iter().any(ExecutionResult::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    pub fn first_failure(&self) -> Option<&ExecutionResult> {
        self.failures().next()
    }

    pub fn first_error(&self) -> Option<TaskdeckError> {
        self.first_failure().and_then(ExecutionResult::to_error)
    }

    pub fn total_elapsed(&self) -> Duration {
        self.results.iter().map(|r| r.elapsed).sum()
    }

    pub fn executed(&self) -> impl Iterator<Item = &Invocation> {
        self.results.iter().map(|r| &r.invocation)
    }
}
