// src/watch/watcher.rs

use std::path::PathBuf;

use notify::event::EventKind;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{info, trace, warn};

use crate::errors::Result;
use crate::watch::runtime::WatchEvent;

/// Keeps the underlying `RecommendedWatcher` alive. Dropping the handle
/// releases the subscriptions.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    root: PathBuf,
}

impl WatcherHandle {
    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// Watch `root` recursively and forward every changed path to `events`.
///
/// Access-only notifications are dropped; matching against rules happens in
/// the runtime.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    events: mpsc::UnboundedSender<WatchEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    // Called synchronously on notify's thread.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                trace!(?event, "notify event");
                for path in event.paths {
                    if events.send(WatchEvent::PathChanged(path)).is_err() {
                        return;
                    }
                }
            }
            Err(err) => warn!("file watch error: {err}"),
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!("file watcher started on {:?}", root);

    Ok(WatcherHandle {
        _inner: watcher,
        root,
    })
}
