// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod plan;
pub mod registry;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::load_and_validate;
use crate::engine::render::{render_listing, render_plan, render_summary};
use crate::engine::Engine;
use crate::errors::{Result, TaskdeckError};
use crate::exec::UnitCatalog;
use crate::fs::RealFileSystem;
use crate::types::FailurePolicy;
use crate::watch::{spawn_watcher, EngineBackend, SpawnLauncher, WatchEvent, WatchRuntime};

/// A step failed.
pub const EXIT_FAILURE: u8 = 1;
/// The configuration (or a requested name) is invalid; nothing ran.
pub const EXIT_CONFIG: u8 = 2;

/// How a CLI invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    StepFailed,
    ConfigError,
}

impl RunOutcome {
    pub fn exit_code(self) -> u8 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::StepFailed => EXIT_FAILURE,
            RunOutcome::ConfigError => EXIT_CONFIG,
        }
    }
}

/// High-level entry point used by `main.rs`, with the built-in units.
pub async fn run(args: CliArgs) -> Result<RunOutcome> {
    run_with_catalog(args, &UnitCatalog::with_builtins()).await
}

/// Entry point for host programs that register their own in-process units.
pub async fn run_with_catalog(args: CliArgs, catalog: &UnitCatalog) -> Result<RunOutcome> {
    let config_path = PathBuf::from(&args.config);
    let root = config_root_dir(&config_path);

    let engine = match load_engine(&config_path, &root, catalog) {
        Ok(engine) => engine,
        Err(e) => {
            error!("{e}");
            return Ok(RunOutcome::ConfigError);
        }
    };

    match args.command {
        Command::Run {
            names,
            continue_on_failure,
            dry_run,
            no_hold,
        } => {
            let policy = if continue_on_failure {
                FailurePolicy::Continue
            } else {
                engine.default_policy()
            };
            run_command(&engine, &names, policy, dry_run, no_hold).await
        }
        Command::Watch { name } => watch_command(&engine, &config_path, name.as_deref()).await,
        Command::List => {
            print!("{}", render_listing(&engine));
            Ok(RunOutcome::Success)
        }
    }
}

/// Load, validate and build an engine rooted at `root`.
pub fn load_engine(config_path: &Path, root: &Path, catalog: &UnitCatalog) -> Result<Engine> {
    let cfg = load_and_validate(config_path)?;
    Engine::build(&cfg, catalog, Arc::new(RealFileSystem), root)
}

/// Classify an error escaping [`run`].
pub fn outcome_for(err: &TaskdeckError) -> RunOutcome {
    if err.is_config_error() {
        RunOutcome::ConfigError
    } else {
        RunOutcome::StepFailed
    }
}

async fn run_command(
    engine: &Engine,
    names: &[String],
    policy: FailurePolicy,
    dry_run: bool,
    no_hold: bool,
) -> Result<RunOutcome> {
    let plan = match engine.plan(names) {
        Ok(plan) => plan,
        Err(e) => {
            error!("{e}");
            return Ok(outcome_for(&e));
        }
    };

    if dry_run {
        print!("{}", render_plan(&engine.describe(&plan)));
        debug!("dry-run complete (no execution)");
        return Ok(RunOutcome::Success);
    }

    let report = engine.executor().run_sequence(&plan, policy).await;
    print!("{}", render_summary(&report));

    if report.is_success()
        && !no_hold
        && !engine.executor().background().running().await.is_empty()
    {
        info!("background processes running; press Ctrl-C to stop");
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
        }
    }
    engine.shutdown().await;

    if report.is_success() {
        Ok(RunOutcome::Success)
    } else {
        for failure in report.failures() {
            if let Some(err) = failure.to_error() {
                error!("{err}");
            }
        }
        Ok(RunOutcome::StepFailed)
    }
}

async fn watch_command(engine: &Engine, config_path: &Path, initial: Option<&str>) -> Result<RunOutcome> {
    let policy = engine.default_policy();

    if let Some(name) = initial {
        match engine.run_pipeline([name], policy).await {
            Ok(report) => {
                print!("{}", render_summary(&report));
                if !report.is_success() {
                    warn!("initial run of '{name}' failed; watching anyway");
                }
            }
            Err(e) if e.is_config_error() => {
                error!("{e}");
                return Ok(RunOutcome::ConfigError);
            }
            Err(e) => return Err(e),
        }
    }

    if engine.watch_rules().is_empty() {
        warn!("no [watch] rules configured; waiting for Ctrl-C");
    }

    let config_abs = config_path
        .canonicalize()
        .unwrap_or_else(|_| config_path.to_path_buf());
    let launcher = SpawnLauncher::current_exe(config_abs, policy)?;
    let backend = EngineBackend::new(engine.executor(), launcher, policy);
    let runtime = WatchRuntime::new(engine.watch_core(), engine.root(), backend);

    let _watcher = spawn_watcher(engine.root().to_path_buf(), runtime.sender())?;

    // Ctrl-C → graceful shutdown.
    {
        let tx = runtime.sender();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(WatchEvent::ShutdownRequested);
        });
    }

    let stats = runtime.run().await?;
    debug!(?stats, "watch finished");
    engine.shutdown().await;
    Ok(RunOutcome::Success)
}

/// Figure out the project root.
///
/// - If the config path has a non-empty parent (e.g. "ci/Taskdeck.toml"),
///   that directory is the root.
/// - For a bare filename the current working directory is used.
///
/// The result is canonicalized when possible so watcher paths line up.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    let dir = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    dir.canonicalize().unwrap_or(dir)
}
