// src/watch/mod.rs

//! Watch mode: re-running rules when files change.
//!
//! - [`rules`] compiles `[watch.<name>]` sections into matchers and plans.
//! - [`core`] is the pure debounce state machine.
//! - [`runtime`] is the async loop around the core.
//! - [`backend`] runs a fired rule, in process or in a child process.
//! - [`watcher`] wires `notify` into the runtime's event channel.

pub mod backend;
pub mod core;
pub mod rules;
pub mod runtime;
pub mod watcher;

pub use backend::{EngineBackend, RuleOutcome, SpawnLauncher, WatchBackend};
pub use self::core::{WatchCore, WatchState};
pub use rules::{build_watch_rules, relative_path, PatternMatcher, WatchRule};
pub use runtime::{WatchEvent, WatchRuntime, WatchStats};
pub use watcher::{spawn_watcher, WatcherHandle};
