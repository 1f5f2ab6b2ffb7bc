// src/exec/mod.rs

//! Execution layer.
//!
//! - [`unit`] defines the two kinds of execution unit and the catalog of
//!   named in-process units.
//! - [`builtin`] holds the in-process units shipped with the engine.
//! - [`process`] runs external commands through the platform shell.
//! - [`background`] keeps track of long-running processes.
//! - [`executor`] runs single invocations and sequential pipelines.
//! - [`report`] holds per-step and per-pipeline results.

pub mod background;
pub mod builtin;
pub mod executor;
pub mod process;
pub mod report;
pub mod unit;

pub use background::BackgroundProcesses;
pub use executor::Executor;
pub use process::{BackgroundSpec, ProcessSpec};
pub use report::{ExecutionResult, ExecutionStatus, PipelineReport};
pub use unit::{ExecutionUnit, InProcessUnit, UnitCatalog, UnitContext};
