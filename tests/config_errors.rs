// tests/config_errors.rs

use std::io::Write;

use clap::Parser;
use tempfile::{tempdir, NamedTempFile};
use taskdeck::cli::CliArgs;
use taskdeck::config::load_and_validate;
use taskdeck::errors::TaskdeckError;
use taskdeck::{run, RunOutcome};
use taskdeck_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn cyclic_aliases_are_rejected_at_load() {
    let file = config_file(
        r#"
[task.lint]
command = "true"

[alias]
a = ["lint", "b"]
b = ["c"]
c = ["a"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(TaskdeckError::CyclicAlias(path)) => {
            assert!(path.contains("a -> b -> c -> a"), "got {path}");
        }
        other => panic!("expected CyclicAlias, got {other:?}"),
    }
}

#[test]
fn alias_referencing_unknown_task_names_the_alias() {
    let file = config_file(
        r#"
[task.lint]
command = "true"

[alias]
build = ["lint", "minify"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(TaskdeckError::UnknownTask(msg)) => {
            assert!(msg.contains("minify"));
            assert!(msg.contains("build"));
        }
        other => panic!("expected UnknownTask, got {other:?}"),
    }
}

#[test]
fn unknown_target_reference_is_rejected() {
    let file = config_file(
        r#"
[task.lint]
command = "true"
[task.lint.targets.node]
src = ["lib/**/*.js"]

[watch.lib]
files = ["lib/**/*.js"]
tasks = ["lint:browser"]
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(TaskdeckError::UnknownTask(msg)) if msg.contains("lint:browser")
    ));
}

#[test]
fn alias_and_task_may_not_share_a_name() {
    let err = ConfigFileBuilder::new()
        .with_task("build", TaskConfigBuilder::process("true").build())
        .with_alias("build", &["build"])
        .try_build()
        .unwrap_err();
    assert!(matches!(err, TaskdeckError::DuplicateTask(_)));
    assert!(err.is_config_error());
}

#[test]
fn process_task_without_command_is_a_config_error() {
    let err = ConfigFileBuilder::new()
        .with_task("lint", TaskConfigBuilder::unit("process").build())
        .try_build()
        .unwrap_err();
    assert!(matches!(err, TaskdeckError::ConfigError(msg) if msg.contains("lint")));
}

#[test]
fn invalid_debounce_is_a_config_error() {
    let err = ConfigFileBuilder::new()
        .debounce("soon")
        .with_task("lint", TaskConfigBuilder::process("true").build())
        .try_build()
        .unwrap_err();
    assert!(matches!(err, TaskdeckError::ConfigError(_)));
}

#[test]
fn overflowing_debounce_is_a_config_error() {
    let err = ConfigFileBuilder::new()
        .debounce("999999999999999999h")
        .with_task("lint", TaskConfigBuilder::process("true").build())
        .try_build()
        .unwrap_err();
    assert!(matches!(err, TaskdeckError::ConfigError(msg) if msg.contains("too large")));
}

#[tokio::test]
async fn run_unknown_name_fails_without_executing() {
    let dir = tempdir().unwrap();
    let marker = dir.path().join("ran.txt");
    let config = dir.path().join("Taskdeck.toml");
    std::fs::write(
        &config,
        r#"
[task.touch]
command = "touch ran.txt"
"#,
    )
    .unwrap();

    let args = CliArgs::try_parse_from([
        "taskdeck",
        "--config",
        config.to_str().unwrap(),
        "run",
        "touch",
        "nope",
    ])
    .unwrap();

    let outcome = run(args).await.unwrap();
    assert_eq!(outcome, RunOutcome::ConfigError);
    assert_eq!(outcome.exit_code(), 2);
    assert!(!marker.exists());
}

#[tokio::test]
async fn missing_config_file_is_a_config_error() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("Missing.toml");
    let args = CliArgs::try_parse_from([
        "taskdeck",
        "--config",
        config.to_str().unwrap(),
        "list",
    ])
    .unwrap();

    assert_eq!(run(args).await.unwrap(), RunOutcome::ConfigError);
}
