// src/config/mod.rs

//! Configuration loading and validation for taskdeck.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate references and the alias graph (`validate.rs`).
//! - Derive per-target effective settings without mutating the raw config
//!   (`layering.rs`).

pub mod layering;
pub mod loader;
pub mod model;
pub mod validate;

pub use layering::{effective_target, merge_options, EffectiveTarget};
pub use loader::{load_and_validate, load_from_path, load_from_str, DEFAULT_CONFIG_FILE};
pub use model::{
    AliasSpec, ConfigFile, ConfigSection, Options, RawConfigFile, Settings, TargetConfig,
    TaskConfig, WatchConfig, PROCESS_UNIT,
};
