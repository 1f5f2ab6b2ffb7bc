// tests/watch_runtime.rs

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use taskdeck::engine::Engine;
use taskdeck::errors::Result;
use taskdeck::exec::UnitCatalog;
use taskdeck::fs::mock::MockFileSystem;
use taskdeck::types::{FailurePolicy, Invocation, TaskRef};
use taskdeck::watch::{
    EngineBackend, SpawnLauncher, WatchBackend, WatchCore, WatchEvent, WatchRule, WatchRuntime,
    WatchStats,
};
use taskdeck_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use taskdeck_test_utils::fake_backend::FakeWatchBackend;
use taskdeck_test_utils::units::{call_log, calls, CallLog, FailingUnit, RecordingUnit};
use taskdeck_test_utils::{init_tracing, with_timeout};

const ROOT: &str = "/project";
const DEBOUNCE: Duration = Duration::from_millis(250);

fn rule(name: &str, patterns: &[&str]) -> WatchRule {
    WatchRule::new(
        name,
        patterns.iter().map(|s| s.to_string()).collect(),
        vec![TaskRef::parse(name).unwrap()],
        vec![Invocation::new(name, "default")],
        false,
    )
    .unwrap()
}

fn start(
    rules: Vec<WatchRule>,
    backend: FakeWatchBackend,
) -> (UnboundedSender<WatchEvent>, JoinHandle<Result<WatchStats>>) {
    let runtime = WatchRuntime::new(WatchCore::new(rules, DEBOUNCE), ROOT, backend);
    let tx = runtime.sender();
    (tx, tokio::spawn(runtime.run()))
}

fn change(tx: &UnboundedSender<WatchEvent>, rel: &str) {
    tx.send(WatchEvent::PathChanged(format!("{ROOT}/{rel}").into()))
        .unwrap();
}

async fn stop(tx: &UnboundedSender<WatchEvent>, handle: JoinHandle<Result<WatchStats>>) -> WatchStats {
    tx.send(WatchEvent::ShutdownRequested).unwrap();
    handle.await.unwrap().unwrap()
}

#[tokio::test(start_paused = true)]
async fn burst_within_window_runs_rule_once() {
    init_tracing();
    let backend = FakeWatchBackend::new();
    let executed = backend.executed();
    let (tx, handle) = start(vec![rule("scripts", &["js/**/*.js"])], backend);

    for _ in 0..20 {
        change(&tx, "js/app.js");
        sleep(Duration::from_millis(50)).await;
    }
    assert!(executed.lock().unwrap().is_empty(), "window still open");

    sleep(Duration::from_secs(1)).await;
    assert_eq!(*executed.lock().unwrap(), vec!["scripts"]);

    let stats = stop(&tx, handle).await;
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.rules_run, 1);
}

#[tokio::test(start_paused = true)]
async fn unrelated_and_excluded_paths_are_ignored() {
    init_tracing();
    let backend = FakeWatchBackend::new();
    let executed = backend.executed();
    let (tx, handle) = start(
        vec![rule("scripts", &["js/**/*.js", "!js/lib/**"])],
        backend,
    );

    change(&tx, "README.md");
    change(&tx, "js/lib/jquery.js");
    tx.send(WatchEvent::PathChanged("/elsewhere/js/app.js".into()))
        .unwrap();
    sleep(Duration::from_secs(1)).await;

    assert!(executed.lock().unwrap().is_empty());
    assert_eq!(stop(&tx, handle).await.cycles, 0);
}

#[tokio::test(start_paused = true)]
async fn matched_rules_run_in_declaration_order() {
    init_tracing();
    let backend = FakeWatchBackend::new();
    let executed = backend.executed();
    let (tx, handle) = start(
        vec![
            rule("styles", &["css/**/*.css"]),
            rule("scripts", &["js/**/*.js"]),
            rule("everything", &["**/*"]),
        ],
        backend,
    );

    change(&tx, "js/app.js");
    change(&tx, "css/site.css");
    sleep(Duration::from_secs(1)).await;

    assert_eq!(
        *executed.lock().unwrap(),
        vec!["styles", "scripts", "everything"]
    );
    assert_eq!(stop(&tx, handle).await.cycles, 1);
}

#[tokio::test(start_paused = true)]
async fn failure_is_logged_and_watching_continues() {
    init_tracing();
    let backend = FakeWatchBackend::new().failing("scripts");
    let executed = backend.executed();
    let (tx, handle) = start(vec![rule("scripts", &["js/**/*.js"])], backend);

    change(&tx, "js/app.js");
    sleep(Duration::from_secs(1)).await;
    assert_eq!(executed.lock().unwrap().len(), 1);

    change(&tx, "js/app.js");
    sleep(Duration::from_secs(1)).await;
    assert_eq!(executed.lock().unwrap().len(), 2);

    let stats = stop(&tx, handle).await;
    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.failures, 2);
}

#[tokio::test(start_paused = true)]
async fn changes_during_execution_trigger_one_more_cycle() {
    init_tracing();
    let backend = FakeWatchBackend::new().with_delay(Duration::from_millis(500));
    let executed = backend.executed();
    let (tx, handle) = start(vec![rule("scripts", &["js/**/*.js"])], backend);

    change(&tx, "js/app.js");
    // Window closes at 250ms; the rule runs until 750ms.
    sleep(Duration::from_millis(300)).await;
    assert_eq!(executed.lock().unwrap().len(), 1);

    for _ in 0..5 {
        change(&tx, "js/app.js");
    }
    sleep(Duration::from_secs(3)).await;

    assert_eq!(executed.lock().unwrap().len(), 2);
    assert_eq!(stop(&tx, handle).await.cycles, 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_lets_in_flight_execution_finish() {
    init_tracing();
    let backend = FakeWatchBackend::new().with_delay(Duration::from_secs(1));
    let (tx, handle) = start(vec![rule("scripts", &["js/**/*.js"])], backend);

    change(&tx, "js/app.js");
    sleep(Duration::from_millis(400)).await;

    let stats = stop(&tx, handle).await;
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.rules_run, 1);
}

#[tokio::test]
async fn in_process_rules_reuse_the_engine_executor() {
    init_tracing();
    let log = call_log();
    let mut catalog = UnitCatalog::new();
    catalog
        .register("record", Arc::new(RecordingUnit::new(log.clone())))
        .unwrap();
    catalog
        .register("fail", Arc::new(FailingUnit::always(log.clone())))
        .unwrap();

    let cfg = ConfigFileBuilder::new()
        .debounce("20ms")
        .with_task("lint", TaskConfigBuilder::unit("fail").build())
        .with_task("uglify", TaskConfigBuilder::unit("record").build())
        .with_watch("angular", &["js/**/*.js"], &["lint", "uglify"], false)
        .build();
    let engine = Engine::build(&cfg, &catalog, Arc::new(MockFileSystem::new()), ROOT).unwrap();

    let backend = EngineBackend::new(
        engine.executor(),
        SpawnLauncher::new("/nonexistent/taskdeck", "/project/Taskdeck.toml", FailurePolicy::Abort),
        FailurePolicy::Continue,
    );
    let runtime = WatchRuntime::new(engine.watch_core(), ROOT, backend);
    let tx = runtime.sender();
    let handle = tokio::spawn(runtime.run());

    change(&tx, "js/app.js");
    with_timeout(async {
        while calls(&log).len() < 2 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert_eq!(calls(&log), vec!["lint:default", "uglify:default"]);

    // Still watching after the failed step.
    change(&tx, "js/other.js");
    with_timeout(async {
        while calls(&log).len() < 4 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    let stats = with_timeout(stop(&tx, handle)).await;
    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.failures, 2);
}

#[test]
fn spawn_launcher_builds_a_child_run_command() {
    let launcher = SpawnLauncher::new("/usr/bin/taskdeck", "/p/Taskdeck.toml", FailurePolicy::Continue);
    let spawn_rule = WatchRule::new(
        "scripts",
        vec!["js/**/*.js".to_string()],
        vec![TaskRef::parse("jshint:node").unwrap(), TaskRef::parse("build").unwrap()],
        vec![Invocation::new("jshint", "node"), Invocation::new("build", "default")],
        true,
    )
    .unwrap();

    let cmd = launcher.command(&spawn_rule);
    let std_cmd = cmd.as_std();
    let args: Vec<String> = std_cmd
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    assert_eq!(std_cmd.get_program(), OsStr::new("/usr/bin/taskdeck"));
    assert_eq!(
        args,
        vec![
            "--config",
            "/p/Taskdeck.toml",
            "run",
            "--no-hold",
            "--continue-on-failure",
            "jshint:node",
            "build"
        ]
    );
}

/// Engine whose only watch rule re-runs `lint` through `program` as a child run.
fn spawning_runtime(program: &str) -> (WatchRuntime<EngineBackend>, CallLog) {
    let log = call_log();
    let mut catalog = UnitCatalog::new();
    catalog
        .register("record", Arc::new(RecordingUnit::new(log.clone())))
        .unwrap();

    let cfg = ConfigFileBuilder::new()
        .debounce("20ms")
        .with_task("lint", TaskConfigBuilder::unit("record").build())
        .with_watch("scripts", &["js/**/*.js"], &["lint"], true)
        .build();
    let engine = Engine::build(&cfg, &catalog, Arc::new(MockFileSystem::new()), ROOT).unwrap();

    let backend = EngineBackend::new(
        engine.executor(),
        SpawnLauncher::new(program, "/project/Taskdeck.toml", FailurePolicy::Abort),
        FailurePolicy::Abort,
    );
    (WatchRuntime::new(engine.watch_core(), ROOT, backend), log)
}

/// Two separate change cycles against a spawning runtime.
async fn two_spawned_cycles(program: &str) -> (WatchStats, Vec<String>) {
    let (runtime, log) = spawning_runtime(program);
    let tx = runtime.sender();
    let handle = tokio::spawn(runtime.run());

    change(&tx, "js/app.js");
    sleep(Duration::from_millis(500)).await;
    change(&tx, "js/app.js");
    sleep(Duration::from_millis(500)).await;

    let stats = with_timeout(stop(&tx, handle)).await;
    (stats, calls(&log))
}

#[cfg(unix)]
#[tokio::test]
async fn failing_child_run_is_reported_and_watching_continues() {
    init_tracing();
    let (stats, calls) = two_spawned_cycles("false").await;

    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.rules_run, 2);
    assert_eq!(stats.failures, 2);
    assert!(calls.is_empty(), "spawned rules must not run in process");
}

#[cfg(unix)]
#[tokio::test]
async fn successful_child_run_counts_as_success() {
    init_tracing();
    let (stats, calls) = two_spawned_cycles("true").await;

    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.failures, 0);
    assert!(calls.is_empty());
}

#[tokio::test]
async fn child_run_that_cannot_start_is_a_failure() {
    init_tracing();
    let (stats, _) = two_spawned_cycles("/nonexistent/taskdeck").await;

    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.failures, 2);
}

#[cfg(unix)]
#[tokio::test]
async fn spawned_rule_outcome_carries_the_child_exit_code() {
    let backend = EngineBackend::new(
        Engine::build(
            &ConfigFileBuilder::new()
                .with_task("lint", TaskConfigBuilder::process("true").build())
                .build(),
            &UnitCatalog::new(),
            Arc::new(MockFileSystem::new()),
            ROOT,
        )
        .unwrap()
        .executor(),
        SpawnLauncher::new("false", "/project/Taskdeck.toml", FailurePolicy::Abort),
        FailurePolicy::Abort,
    );
    let spawn_rule = WatchRule::new(
        "scripts",
        vec!["js/**/*.js".to_string()],
        vec![TaskRef::parse("lint").unwrap()],
        vec![Invocation::new("lint", "default")],
        true,
    )
    .unwrap();

    let outcome = with_timeout(backend.run_rule(&spawn_rule)).await;
    assert_eq!(outcome.rule, "scripts");
    assert_eq!(outcome.failure.as_deref(), Some("child run exited with code 1"));
}
