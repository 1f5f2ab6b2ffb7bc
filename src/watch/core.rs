// src/watch/core.rs

//! Pure watch state machine.
//!
//! `WatchCore` decides *when* rules run; it never touches channels, timers,
//! the filesystem or processes. The async shell in
//! [`runtime`](crate::watch::runtime) feeds it relative paths and the current
//! time, sleeps until [`WatchCore::deadline`], and dispatches whatever
//! [`WatchCore::on_tick`] hands back.
//!
//! ```text
//! Idle -> Watching -> Debouncing -> Executing -> Watching
//!            |                          |
//!            +-------> Stopped <--------+ (after the in-flight phase)
//! ```

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::watch::rules::WatchRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Watching,
    Debouncing,
    Executing,
    Stopped,
}

#[derive(Debug)]
pub struct WatchCore {
    rules: Vec<WatchRule>,
    debounce: Duration,
    state: WatchState,
    /// Indices into `rules`; iteration order is declaration order.
    pending: BTreeSet<usize>,
    deadline: Option<Instant>,
    stop_requested: bool,
}

impl WatchCore {
    pub fn new(rules: Vec<WatchRule>, debounce: Duration) -> Self {
        Self {
            rules,
            debounce,
            state: WatchState::Idle,
            pending: BTreeSet::new(),
            deadline: None,
            stop_requested: false,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn rules(&self) -> &[WatchRule] {
        &self.rules
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn pending(&self) -> Vec<usize> {
        self.pending.iter().copied().collect()
    }

    pub fn is_executing(&self) -> bool {
        self.state == WatchState::Executing
    }

    pub fn is_stopped(&self) -> bool {
        self.state == WatchState::Stopped
    }

    /// Subscriptions are open; start reacting to changes.
    pub fn start(&mut self) {
        if self.state == WatchState::Idle {
            self.state = WatchState::Watching;
        }
    }

    /// Record a change to `rel_path` observed at `now`.
    ///
    /// Returns true if at least one rule matched. While debouncing, every
    /// matching change restarts the quiescence window. While executing, the
    /// matched rules are queued for the next cycle.
    pub fn on_change(&mut self, rel_path: &str, now: Instant) -> bool {
        if matches!(self.state, WatchState::Idle | WatchState::Stopped) {
            return false;
        }

        let before = self.pending.len();
        let mut matched = false;
        for (idx, rule) in self.rules.iter().enumerate() {
            if rule.matches(rel_path) {
                matched = true;
                self.pending.insert(idx);
            }
        }
        if !matched {
            trace!(path = rel_path, "no watch rule matches");
            return false;
        }
        debug!(
            path = rel_path,
            newly_pending = self.pending.len() - before,
            state = ?self.state,
            "change matched"
        );

        if self.state != WatchState::Executing {
            self.state = WatchState::Debouncing;
            self.deadline = Some(now + self.debounce);
        }
        true
    }

    /// When the current debounce window closes, if one is open.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            WatchState::Debouncing => self.deadline,
            _ => None,
        }
    }

    /// Close the debounce window if it has expired and hand back the rules to
    /// run, in declaration order.
    pub fn on_tick(&mut self, now: Instant) -> Option<Vec<usize>> {
        if self.state != WatchState::Debouncing {
            return None;
        }
        match self.deadline {
            Some(deadline) if deadline <= now => {}
            _ => return None,
        }

        self.state = WatchState::Executing;
        self.deadline = None;
        let batch: Vec<usize> = std::mem::take(&mut self.pending).into_iter().collect();
        Some(batch)
    }

    /// The dispatched batch finished (successfully or not).
    pub fn on_execution_finished(&mut self, now: Instant) {
        if self.state != WatchState::Executing {
            return;
        }
        if self.stop_requested {
            self.state = WatchState::Stopped;
            self.pending.clear();
            return;
        }
        if self.pending.is_empty() {
            self.state = WatchState::Watching;
        } else {
            self.state = WatchState::Debouncing;
            self.deadline = Some(now + self.debounce);
        }
    }

    /// Ask the watcher to stop. Returns true if it stopped right away; false
    /// if an execution is in flight and the stop takes effect once it ends.
    pub fn request_stop(&mut self) -> bool {
        if self.state == WatchState::Executing {
            self.stop_requested = true;
            return false;
        }
        self.state = WatchState::Stopped;
        self.pending.clear();
        self.deadline = None;
        true
    }
}
