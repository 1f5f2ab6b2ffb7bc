// src/plan/mod.rs

//! Alias composition: turning requested names into pipelines.
//!
//! A plain task name expands to all of its targets in registration order,
//! `task:target` to a single target, and an alias to the depth-first
//! expansion of its members. Results are concatenated without
//! deduplication: a pair reachable twice runs twice.

pub mod composer;

pub use composer::Composer;
