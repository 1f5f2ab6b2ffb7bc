// src/engine/render.rs

use std::fmt::Write as _;
use std::time::Duration;

use crate::engine::{Engine, PlannedStep};
use crate::exec::{ExecutionStatus, PipelineReport};

/// Per-step elapsed times plus the total, aligned in columns.
pub fn render_summary(report: &PipelineReport) -> String {
    let width = report
        .results
        .iter()
        .map(|r| r.invocation.to_string().len())
        .chain(report.skipped.iter().map(|i| i.to_string().len()))
        .chain(std::iter::once("Total".len()))
        .max()
        .unwrap_or(5);

    let mut out = String::from("Execution time\n");
    for result in report.results.iter() {
        let mark = match &result.status {
            ExecutionStatus::Success => "ok",
            ExecutionStatus::Tolerated(_) => "tolerated",
            ExecutionStatus::Failed(_) => "FAILED",
        };
        let _ = writeln!(
            out,
            "  {:<width$}  {:>8}  {}",
            result.invocation.to_string(),
            format_duration(result.elapsed),
            mark,
        );
    }
    for skipped in report.skipped.iter() {
        let _ = writeln!(out, "  {:<width$}  {:>8}  skipped", skipped.to_string(), "-");
    }
    let _ = writeln!(
        out,
        "  {:<width$}  {:>8}",
        "Total",
        format_duration(report.total_elapsed())
    );
    out
}

/// `--dry-run` output: each step with its unit and resolved files.
pub fn render_plan(steps: &[PlannedStep]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Plan ({} steps):", steps.len());
    for (idx, step) in steps.iter().enumerate() {
        let _ = writeln!(out, "  {}. {} [{}]", idx + 1, step.invocation, step.unit);
        match &step.files {
            Ok(files) if files.is_empty() => {}
            Ok(files) => {
                for file in files {
                    let _ = writeln!(out, "       {file}");
                }
            }
            Err(e) => {
                let _ = writeln!(out, "       ! {e}");
            }
        }
    }
    out
}

/// `list` output: tasks with targets, aliases, watch rules.
pub fn render_listing(engine: &Engine) -> String {
    let mut out = String::from("Tasks:\n");
    for task in engine.registry().tasks() {
        let targets: Vec<&str> = task.targets().map(|t| t.name.as_str()).collect();
        let unit = task.targets().next().map(|t| t.unit.kind()).unwrap_or("-");
        let _ = writeln!(out, "  {} ({unit}): {}", task.name(), targets.join(", "));
    }

    let aliases = engine.composer().aliases();
    if !aliases.is_empty() {
        out.push_str("Aliases:\n");
        for (name, members) in aliases.iter() {
            let members: Vec<String> = members.iter().map(ToString::to_string).collect();
            let _ = writeln!(out, "  {name}: {}", members.join(", "));
        }
    }

    let rules = engine.watch_rules();
    if !rules.is_empty() {
        out.push_str("Watch rules:\n");
        for rule in rules {
            let refs: Vec<String> = rule.refs().iter().map(ToString::to_string).collect();
            let _ = writeln!(
                out,
                "  {}{}: [{}] -> {}",
                rule.name(),
                if rule.spawn() { "" } else { " (in-process)" },
                rule.patterns().join(", "),
                refs.join(", ")
            );
        }
    }
    out
}

pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        format!("{}m{:02}s", ms / 60_000, (ms % 60_000) / 1000)
    }
}
