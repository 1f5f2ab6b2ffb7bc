// src/exec/process.rs

//! External process units.
//!
//! Commands run through the platform shell (`sh -c` / `cmd /C`). Output is
//! streamed line by line to the log and captured for the step result.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::Options;
use crate::exec::report::ExecutionStatus;
use crate::types::Invocation;

/// Settings for an external-process target, resolved at registration.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub command: String,
    pub args: Vec<String>,
    pub env: IndexMap<String, String>,
    /// Append resolved files to `args`.
    pub append_files: bool,
    /// When false, failures are reported as tolerated instead of failing.
    pub fail_on_error: bool,
    /// A matching output line marks the run as failed.
    pub error_pattern: Option<Regex>,
    /// Present for long-running processes that outlive their step.
    pub background: Option<BackgroundSpec>,
}

impl ProcessSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: IndexMap::new(),
            append_files: false,
            fail_on_error: true,
            error_pattern: None,
            background: None,
        }
    }

    /// Turn a problem into the step status this spec calls for.
    pub(crate) fn classify(&self, problem: Option<String>) -> ExecutionStatus {
        match problem {
            None => ExecutionStatus::Success,
            Some(msg) if self.fail_on_error => ExecutionStatus::Failed(msg),
            Some(msg) => ExecutionStatus::Tolerated(msg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackgroundSpec {
    /// The process counts as started once a line matches.
    pub ready_pattern: Option<Regex>,
    pub ready_timeout: Duration,
}

/// Everything needed to launch one process invocation.
#[derive(Debug, Clone, Copy)]
pub struct ProcessRequest<'a> {
    pub invocation: &'a Invocation,
    pub spec: &'a ProcessSpec,
    pub cwd: &'a Path,
    pub files: &'a [String],
    pub options: &'a Options,
}

/// Build the platform shell command for a request.
///
/// The target's identity, resolved files and effective options are exported
/// as `TASKDECK_TASK`, `TASKDECK_TARGET`, `TASKDECK_FILES` (newline
/// separated) and `TASKDECK_OPTIONS` (JSON).
pub(crate) fn build_command(req: &ProcessRequest<'_>) -> Result<Command> {
    let mut positional = req.spec.args.clone();
    if req.spec.append_files {
        positional.extend(req.files.iter().cloned());
    }

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&req.spec.command).args(&positional);
        c
    } else {
        let mut c = Command::new("sh");
        if positional.is_empty() {
            c.arg("-c").arg(&req.spec.command);
        } else {
            // Positional arguments land in "$@"; "taskdeck" fills $0.
            c.arg("-c")
                .arg(format!("{} \"$@\"", req.spec.command))
                .arg("taskdeck")
                .args(&positional);
        }
        c
    };

    cmd.current_dir(req.cwd)
        .envs(&req.spec.env)
        .env("TASKDECK_TASK", &req.invocation.task)
        .env("TASKDECK_TARGET", &req.invocation.target)
        .env("TASKDECK_FILES", req.files.join("\n"))
        .env("TASKDECK_OPTIONS", serde_json::to_string(req.options)?)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    Ok(cmd)
}

/// Run a process to completion and classify its outcome.
///
/// - non-zero exit → problem
/// - any output line matching `error_pattern` → problem
///
/// A problem fails the step unless `fail_on_error = false`, in which case it
/// is tolerated.
pub async fn run_process(req: ProcessRequest<'_>) -> Result<(ExecutionStatus, String)> {
    debug!(
        task = %req.invocation.task,
        target = %req.invocation.target,
        cmd = %req.spec.command,
        "starting process"
    );

    let mut child = build_command(&req)?
        .spawn()
        .with_context(|| format!("spawning process for {}", req.invocation))?;

    let captured = Arc::new(Mutex::new(Vec::new()));
    let pumps: Vec<_> = [
        child.stdout.take().map(|out| {
            tokio::spawn(pump_lines(
                out,
                "stdout",
                req.invocation.clone(),
                req.spec.error_pattern.clone(),
                Arc::clone(&captured),
            ))
        }),
        child.stderr.take().map(|err| {
            tokio::spawn(pump_lines(
                err,
                "stderr",
                req.invocation.clone(),
                req.spec.error_pattern.clone(),
                Arc::clone(&captured),
            ))
        }),
    ]
    .into_iter()
    .flatten()
    .collect();

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of {}", req.invocation))?;

    let mut pattern_hit = false;
    for pump in pumps {
        pattern_hit |= pump.await.unwrap_or(false);
    }

    let output = captured
        .lock()
        .map(|lines| lines.join("\n"))
        .unwrap_or_default();

    let problem = if !status.success() {
        Some(match status.code() {
            Some(code) => format!("process exited with code {code}"),
            None => "process terminated by signal".to_string(),
        })
    } else if pattern_hit {
        req.spec
            .error_pattern
            .as_ref()
            .map(|re| format!("output matched error pattern `{}`", re.as_str()))
    } else {
        None
    };

    info!(
        task = %req.invocation.task,
        target = %req.invocation.target,
        exit_code = status.code().unwrap_or(-1),
        pattern_hit,
        "process exited"
    );

    Ok((req.spec.classify(problem), output))
}

/// Forward every line to the log and the capture buffer; report whether any
/// line matched `error_pattern`.
async fn pump_lines<R>(
    reader: R,
    stream: &'static str,
    invocation: Invocation,
    error_pattern: Option<Regex>,
    sink: Arc<Mutex<Vec<String>>>,
) -> bool
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut matched = false;

    while let Ok(Some(line)) = lines.next_line().await {
        info!(task = %invocation.task, target = %invocation.target, stream, "{}", line);
        if error_pattern.as_ref().is_some_and(|re| re.is_match(&line)) {
            matched = true;
        }
        if let Ok(mut out) = sink.lock() {
            out.push(line);
        }
    }

    matched
}
