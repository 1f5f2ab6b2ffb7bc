// src/errors.rs

//! Crate-wide error type.
//!
//! Configuration errors (`DuplicateTask`, `UnknownTask`, `CyclicAlias`,
//! `ConfigError`) are raised before anything executes. `NoMatch` and
//! `ExecutionFailure` are per-step and normally end up inside an
//! [`ExecutionResult`](crate::exec::ExecutionResult) rather than being
//! returned as `Err`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskdeckError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Task already registered: {0}")]
    DuplicateTask(String),

    #[error("Task not found: {0}")]
    UnknownTask(String),

    #[error("Cyclic alias: {0}")]
    CyclicAlias(String),

    #[error("No files matched for {task}:{target} (patterns: {patterns:?})")]
    NoMatch {
        task: String,
        target: String,
        patterns: Vec<String>,
    },

    #[error("Task {task}:{target} failed: {message}")]
    ExecutionFailure {
        task: String,
        target: String,
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid glob pattern: {0}")]
    GlobError(#[from] globset::Error),

    #[error("File watch error: {0}")]
    NotifyError(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskdeckError {
    /// True for errors that stem from the configuration itself and are
    /// reported before any step runs.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            TaskdeckError::ConfigError(_)
                | TaskdeckError::DuplicateTask(_)
                | TaskdeckError::UnknownTask(_)
                | TaskdeckError::CyclicAlias(_)
                | TaskdeckError::TomlError(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskdeckError>;
