// tests/process_units.rs

#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tempfile::{tempdir, TempDir};
use taskdeck::cli::CliArgs;
use taskdeck::config::load_from_str;
use taskdeck::engine::Engine;
use taskdeck::exec::{ExecutionResult, ExecutionStatus, UnitCatalog};
use taskdeck::fs::RealFileSystem;
use taskdeck::types::Invocation;
use taskdeck::{run, RunOutcome};
use taskdeck_test_utils::{init_tracing, with_timeout};

fn engine(dir: &Path, config: &str) -> Engine {
    let cfg = load_from_str(config).unwrap();
    Engine::build(&cfg, &UnitCatalog::with_builtins(), Arc::new(RealFileSystem), dir).unwrap()
}

async fn run_one(engine: &Engine, task: &str, target: &str) -> ExecutionResult {
    with_timeout(engine.executor().run(&Invocation::new(task, target))).await
}

fn project(files: &[&str]) -> TempDir {
    let dir = tempdir().unwrap();
    for file in files {
        let path = dir.path().join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }
    dir
}

#[tokio::test]
async fn output_is_captured_and_exit_zero_succeeds() {
    init_tracing();
    let dir = project(&[]);
    let engine = engine(
        dir.path(),
        r#"
[task.hello]
command = "echo hello; echo oops >&2"
"#,
    );

    let result = run_one(&engine, "hello", "default").await;
    assert_eq!(result.status, ExecutionStatus::Success);
    assert!(result.output.contains("hello"));
    assert!(result.output.contains("oops"));
}

#[tokio::test]
async fn non_zero_exit_fails_unless_tolerated() {
    init_tracing();
    let dir = project(&[]);
    let engine = engine(
        dir.path(),
        r#"
[task.check]
command = "exit 3"

[task.check.targets.strict]

[task.check.targets.lenient]
fail_on_error = false
"#,
    );

    let strict = run_one(&engine, "check", "strict").await;
    assert_eq!(
        strict.status,
        ExecutionStatus::Failed("process exited with code 3".to_string())
    );

    let lenient = run_one(&engine, "check", "lenient").await;
    assert!(matches!(lenient.status, ExecutionStatus::Tolerated(_)));
    assert!(!lenient.is_failure());
}

#[tokio::test]
async fn error_pattern_fails_a_clean_exit() {
    init_tracing();
    let dir = project(&[]);
    let engine = engine(
        dir.path(),
        r#"
[task.i18n]
command = "echo 'scanned 3 files'; echo 'ERROR: missing key greeting'"
error_pattern = "^ERROR:"
"#,
    );

    let result = run_one(&engine, "i18n", "default").await;
    match result.status {
        ExecutionStatus::Failed(msg) => assert!(msg.contains("^ERROR:")),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn resolved_files_reach_the_process() {
    init_tracing();
    let dir = project(&["lib/a.js", "lib/b.js", "lib/vendor/c.js"]);
    let engine = engine(
        dir.path(),
        r#"
[task.lint]
command = "echo"
append_files = true
args = ["--verbose"]
src = ["lib/**/*.js", "!lib/vendor/**"]

[task.env]
command = 'printf "%s|" "$TASKDECK_TASK" "$TASKDECK_TARGET"; echo "$TASKDECK_FILES" | wc -l'
src = ["lib/*.js"]
"#,
    );

    let lint = run_one(&engine, "lint", "default").await;
    assert_eq!(lint.status, ExecutionStatus::Success);
    assert_eq!(lint.output.trim(), "--verbose lib/a.js lib/b.js");

    let env = run_one(&engine, "env", "default").await;
    assert_eq!(env.status, ExecutionStatus::Success);
    let out = env.output.replace(' ', "");
    assert_eq!(out.trim(), "env|default|2");
}

#[tokio::test]
async fn options_are_exported_as_json_and_cwd_is_honoured() {
    init_tracing();
    let dir = project(&["public/img/logo.png"]);
    let engine = engine(
        dir.path(),
        r#"
[task.imagemin]
command = 'echo "$TASKDECK_OPTIONS"; ls'
cwd = "public/img"
options = { optimizationLevel = 3 }
"#,
    );

    let result = run_one(&engine, "imagemin", "default").await;
    assert_eq!(result.status, ExecutionStatus::Success);
    let mut lines = result.output.lines();
    let options: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
    assert_eq!(options["optimizationLevel"], 3);
    assert_eq!(lines.next(), Some("logo.png"));
}

#[tokio::test]
async fn background_process_restarts_and_stops_on_shutdown() {
    init_tracing();
    let dir = project(&[]);
    let engine = engine(
        dir.path(),
        r#"
[task.server]
command = "echo listening; sleep 30"
background = true
ready_pattern = "listening"
ready_timeout = "5s"
"#,
    );
    let executor = engine.executor();
    let server = Invocation::new("server", "default");

    let first = run_one(&engine, "server", "default").await;
    assert_eq!(first.status, ExecutionStatus::Success);
    assert_eq!(executor.background().running().await, vec![server.clone()]);

    let second = run_one(&engine, "server", "default").await;
    assert_eq!(second.status, ExecutionStatus::Success);
    assert_eq!(executor.background().running().await, vec![server]);

    engine.shutdown().await;
    assert!(executor.background().running().await.is_empty());
}

#[tokio::test]
async fn background_process_not_ready_in_time_fails() {
    init_tracing();
    let dir = project(&[]);
    let engine = engine(
        dir.path(),
        r#"
[task.server]
command = "sleep 30"
background = true
ready_pattern = "listening"
ready_timeout = "200ms"
"#,
    );

    let result = run_one(&engine, "server", "default").await;
    match result.status {
        ExecutionStatus::Failed(msg) => assert!(msg.contains("not ready")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(engine.executor().background().running().await.is_empty());
}

#[tokio::test]
async fn background_process_that_exits_at_once_fails() {
    init_tracing();
    let dir = project(&[]);
    let engine = engine(
        dir.path(),
        r#"
[task.server]
command = "exit 4"
background = true
"#,
    );

    let result = run_one(&engine, "server", "default").await;
    assert_eq!(
        result.status,
        ExecutionStatus::Failed("background process exited immediately with code 4".to_string())
    );
    assert!(engine.executor().background().running().await.is_empty());
}

#[tokio::test]
async fn failed_run_with_live_background_process_exits_without_holding() {
    init_tracing();
    let dir = project(&[]);
    let config = dir.path().join("Taskdeck.toml");
    std::fs::write(
        &config,
        r#"
[task.server]
command = "echo listening; sleep 30"
background = true
ready_pattern = "listening"

[task.smoke]
command = "exit 1"

[alias]
dev = ["server", "smoke"]
"#,
    )
    .unwrap();

    let args = CliArgs::try_parse_from([
        "taskdeck",
        "--config",
        config.to_str().unwrap(),
        "run",
        "dev",
    ])
    .unwrap();

    let outcome = with_timeout(run(args)).await.unwrap();
    assert_eq!(outcome, RunOutcome::StepFailed);
    assert_eq!(outcome.exit_code(), 1);
}
