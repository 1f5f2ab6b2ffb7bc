// src/watch/runtime.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::errors::Result;
use crate::watch::backend::{RuleOutcome, WatchBackend};
use crate::watch::core::WatchCore;
use crate::watch::rules::{relative_path, WatchRule};

/// Input to the watch runtime loop.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A filesystem path changed (absolute, or relative to the root).
    PathChanged(PathBuf),
    /// The batch dispatched for the last debounce cycle finished.
    ExecutionFinished(Vec<RuleOutcome>),
    ShutdownRequested,
}

/// Counters reported when the runtime stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    /// Executing phases entered.
    pub cycles: usize,
    pub rules_run: usize,
    pub failures: usize,
}

/// Async shell around [`WatchCore`]: receives events, sleeps until the
/// debounce deadline, and dispatches fired rules to a [`WatchBackend`].
pub struct WatchRuntime<B: WatchBackend> {
    core: WatchCore,
    root: PathBuf,
    backend: Arc<B>,
    event_tx: mpsc::UnboundedSender<WatchEvent>,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    stats: WatchStats,
}

impl<B: WatchBackend> fmt::Debug for WatchRuntime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRuntime")
            .field("core", &self.core)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl<B: WatchBackend> WatchRuntime<B> {
    pub fn new(core: WatchCore, root: impl Into<PathBuf>, backend: B) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            core,
            root: root.into(),
            backend: Arc::new(backend),
            event_tx,
            event_rx,
            stats: WatchStats::default(),
        }
    }

    /// Sender for feeding events (filesystem changes, shutdown) into the loop.
    pub fn sender(&self) -> mpsc::UnboundedSender<WatchEvent> {
        self.event_tx.clone()
    }

    /// Run until a shutdown request is processed.
    ///
    /// Rule failures are logged and never end the loop.
    pub async fn run(mut self) -> Result<WatchStats> {
        self.core.start();
        info!(
            rules = self.core.rules().len(),
            debounce_ms = self.core.debounce().as_millis() as u64,
            "watching for changes"
        );

        loop {
            let deadline = self.core.deadline().map(Instant::from_std);
            // The sleep future is built even when its branch is disabled.
            let wake_at = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                event = self.event_rx.recv() => {
                    let Some(event) = event else {
                        info!("watch event channel closed; stopping");
                        break;
                    };
                    if self.handle_event(event) {
                        break;
                    }
                }
                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => {
                    if let Some(batch) = self.core.on_tick(Instant::now().into_std()) {
                        self.dispatch(batch);
                    }
                }
            }
        }

        info!(
            cycles = self.stats.cycles,
            failures = self.stats.failures,
            "watch runtime stopped"
        );
        Ok(self.stats)
    }

    /// Returns true when the loop should exit.
    fn handle_event(&mut self, event: WatchEvent) -> bool {
        match event {
            WatchEvent::PathChanged(path) => {
                let rel = if path.is_absolute() {
                    relative_path(&self.root, &path)
                } else {
                    Some(path.to_string_lossy().replace('\\', "/"))
                };
                match rel {
                    Some(rel) => {
                        self.core.on_change(&rel, Instant::now().into_std());
                    }
                    None => debug!(?path, "change outside project root ignored"),
                }
                false
            }
            WatchEvent::ExecutionFinished(outcomes) => {
                for outcome in outcomes.iter() {
                    self.stats.rules_run += 1;
                    match &outcome.failure {
                        Some(failure) => {
                            self.stats.failures += 1;
                            error!(rule = %outcome.rule, "watch run failed: {failure}");
                        }
                        None => info!(
                            rule = %outcome.rule,
                            elapsed_ms = outcome.elapsed.as_millis() as u64,
                            "watch run finished"
                        ),
                    }
                }
                self.core.on_execution_finished(Instant::now().into_std());
                self.core.is_stopped()
            }
            WatchEvent::ShutdownRequested => {
                if self.core.request_stop() {
                    true
                } else {
                    info!("shutdown requested; waiting for the running rules to finish");
                    false
                }
            }
        }
    }

    fn dispatch(&mut self, batch: Vec<usize>) {
        let rules: Vec<WatchRule> = batch
            .iter()
            .filter_map(|&idx| self.core.rules().get(idx).cloned())
            .collect();
        self.stats.cycles += 1;
        info!(
            rules = ?rules.iter().map(WatchRule::name).collect::<Vec<_>>(),
            "changes settled; running"
        );

        let backend = Arc::clone(&self.backend);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let mut outcomes = Vec::with_capacity(rules.len());
            for rule in rules.iter() {
                outcomes.push(backend.run_rule(rule).await);
            }
            if tx.send(WatchEvent::ExecutionFinished(outcomes)).is_err() {
                debug!("watch runtime gone before execution finished");
            }
        });
    }
}
