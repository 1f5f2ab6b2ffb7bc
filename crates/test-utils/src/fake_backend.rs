use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskdeck::watch::{RuleOutcome, WatchBackend, WatchRule};

/// A fake watch backend that:
/// - records which rules were "run", in order
/// - fails the rules named in `failing`
/// - optionally takes `delay` per rule, so events can arrive mid-execution.
#[derive(Debug, Clone, Default)]
pub struct FakeWatchBackend {
    executed: Arc<Mutex<Vec<String>>>,
    failing: Vec<String>,
    delay: Duration,
}

impl FakeWatchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, rule: &str) -> Self {
        self.failing.push(rule.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared handle on the execution log; clone it before handing the
    /// backend to the runtime.
    pub fn executed(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.executed)
    }
}

impl WatchBackend for FakeWatchBackend {
    fn run_rule(&self, rule: &WatchRule) -> Pin<Box<dyn Future<Output = RuleOutcome> + Send>> {
        let executed = Arc::clone(&self.executed);
        let name = rule.name().to_string();
        let fail = self.failing.contains(&name);
        let delay = self.delay;

        Box::pin(async move {
            executed.lock().unwrap().push(name.clone());
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if fail {
                RuleOutcome::failed(name, "simulated failure", delay)
            } else {
                RuleOutcome::success(name, delay)
            }
        })
    }
}
