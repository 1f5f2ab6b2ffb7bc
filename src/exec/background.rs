// src/exec/background.rs

//! Long-running processes started by `background = true` targets.
//!
//! At most one process runs per (task, target): starting a target again
//! kills the previous instance first. Everything still running is killed on
//! [`BackgroundProcesses::shutdown_all`], so no process outlives the engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::exec::process::{build_command, BackgroundSpec, ProcessRequest};
use crate::exec::report::ExecutionStatus;
use crate::types::Invocation;

type ReadySignal = Arc<Mutex<Option<oneshot::Sender<()>>>>;

/// Without a ready pattern, a process that survives this long counts as started.
const START_GRACE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Default)]
pub struct BackgroundProcesses {
    running: Arc<tokio::sync::Mutex<HashMap<Invocation, Child>>>,
}

impl BackgroundProcesses {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)start the background process for `req.invocation`.
    pub async fn start(
        &self,
        req: ProcessRequest<'_>,
        background: &BackgroundSpec,
    ) -> Result<(ExecutionStatus, String)> {
        let invocation = req.invocation.clone();
        self.stop(&invocation).await;

        let mut child = build_command(&req)?
            .spawn()
            .with_context(|| format!("spawning background process for {invocation}"))?;
        let pid = child.id();

        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let ready: ReadySignal = Arc::new(Mutex::new(Some(ready_tx)));
        if let Some(out) = child.stdout.take() {
            tokio::spawn(follow_output(
                out,
                "stdout",
                invocation.clone(),
                background.ready_pattern.clone(),
                Arc::clone(&ready),
            ));
        }
        if let Some(err) = child.stderr.take() {
            tokio::spawn(follow_output(
                err,
                "stderr",
                invocation.clone(),
                background.ready_pattern.clone(),
                Arc::clone(&ready),
            ));
        }
        drop(ready);

        let problem = if background.ready_pattern.is_some() {
            match tokio::time::timeout(background.ready_timeout, ready_rx).await {
                Ok(Ok(())) => None,
                Ok(Err(_)) => Some("background process closed its output before it was ready".to_string()),
                Err(_) => Some(format!(
                    "background process not ready within {:?}",
                    background.ready_timeout
                )),
            }
        } else {
            tokio::time::sleep(START_GRACE).await;
            match child.try_wait()? {
                Some(status) if !status.success() => Some(format!(
                    "background process exited immediately with code {}",
                    status.code().unwrap_or(-1)
                )),
                _ => None,
            }
        };

        if let Some(problem) = problem {
            if let Err(e) = child.kill().await {
                debug!(task = %invocation.task, error = %e, "kill after failed start");
            }
            return Ok((req.spec.classify(Some(problem)), String::new()));
        }

        info!(
            task = %invocation.task,
            target = %invocation.target,
            pid = pid.unwrap_or_default(),
            "background process running"
        );
        self.running.lock().await.insert(invocation, child);

        Ok((
            ExecutionStatus::Success,
            format!("started background process (pid {})", pid.unwrap_or_default()),
        ))
    }

    /// Kill the running instance for `invocation`, if any.
    pub async fn stop(&self, invocation: &Invocation) {
        let previous = self.running.lock().await.remove(invocation);
        if let Some(mut child) = previous {
            info!(task = %invocation.task, target = %invocation.target, "stopping previous background instance");
            if let Err(e) = child.kill().await {
                debug!(task = %invocation.task, error = %e, "previous instance already gone");
            }
        }
    }

    /// Kill every background process.
    pub async fn shutdown_all(&self) {
        let drained: Vec<(Invocation, Child)> = self.running.lock().await.drain().collect();
        for (invocation, mut child) in drained {
            info!(task = %invocation.task, target = %invocation.target, "stopping background process");
            if let Err(e) = child.kill().await {
                warn!(task = %invocation.task, error = %e, "failed to kill background process");
            }
        }
    }

    /// Invocations with a live entry, sorted.
    pub async fn running(&self) -> Vec<Invocation> {
        let mut names: Vec<_> = self.running.lock().await.keys().cloned().collect();
        names.sort();
        names
    }
}

async fn follow_output<R>(
    reader: R,
    stream: &'static str,
    invocation: Invocation,
    ready_pattern: Option<Regex>,
    ready: ReadySignal,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        info!(task = %invocation.task, target = %invocation.target, stream, "{}", line);
        if ready_pattern.as_ref().is_some_and(|re| re.is_match(&line)) {
            let sender = ready.lock().ok().and_then(|mut slot| slot.take());
            if let Some(sender) = sender {
                let _ = sender.send(());
            }
        }
    }
    debug!(task = %invocation.task, stream, "background output closed");
}
