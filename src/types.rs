// src/types.rs

//! Small shared vocabulary types.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Name of a target inside a task (e.g. `"dev"`, `"app"`).
pub type TargetName = String;

/// Target name given to tasks declared without a `targets` table.
pub const DEFAULT_TARGET: &str = "default";

/// A reference as written in aliases, watch rules and on the command line.
///
/// - `"jshint"` refers to a task (all of its targets) or to an alias.
/// - `"jshint:node"` refers to a single target of a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskRef {
    pub name: String,
    pub target: Option<TargetName>,
}

impl TaskRef {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let (name, target) = match raw.split_once(':') {
            Some((name, target)) => (name, Some(target)),
            None => (raw, None),
        };

        if name.is_empty() {
            return Err(format!("empty task name in reference '{raw}'"));
        }
        if let Some(target) = target {
            if target.is_empty() || target.contains(':') {
                return Err(format!("invalid target in reference '{raw}'"));
            }
        }

        Ok(Self {
            name: name.to_string(),
            target: target.map(str::to_string),
        })
    }
}

impl FromStr for TaskRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskRef::parse(s)
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{}:{}", self.name, target),
            None => f.write_str(&self.name),
        }
    }
}

/// One concrete step of a pipeline: a single target of a single task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Invocation {
    pub task: TaskName,
    pub target: TargetName,
}

impl Invocation {
    pub fn new(task: impl Into<TaskName>, target: impl Into<TargetName>) -> Self {
        Self {
            task: task.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.task, self.target)
    }
}

/// What a sequential pipeline does when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failing step (default).
    #[default]
    Abort,
    /// Run every step and report all failures at the end.
    Continue,
}

impl FailurePolicy {
    pub fn from_continue_flag(continue_on_failure: bool) -> Self {
        if continue_on_failure {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Abort
        }
    }
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;

    match unit_part.trim().to_lowercase().as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => scaled_secs(value, 60, s),
        "h" => scaled_secs(value, 60 * 60, s),
        other => Err(format!(
            "unsupported duration unit '{other}'; expected ms, s, m, or h"
        )),
    }
}

fn scaled_secs(value: u64, factor: u64, raw: &str) -> Result<Duration, String> {
    value
        .checked_mul(factor)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{raw}' is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_task_and_target_refs() {
        let plain = TaskRef::parse("jshint").unwrap();
        assert_eq!(plain.name, "jshint");
        assert_eq!(plain.target, None);

        let targeted: TaskRef = "shell:smokeTest".parse().unwrap();
        assert_eq!(targeted.name, "shell");
        assert_eq!(targeted.target.as_deref(), Some("smokeTest"));
        assert_eq!(targeted.to_string(), "shell:smokeTest");
    }

    #[test]
    fn rejects_malformed_refs() {
        assert!(TaskRef::parse("").is_err());
        assert!(TaskRef::parse(":app").is_err());
        assert!(TaskRef::parse("uglify:").is_err());
        assert!(TaskRef::parse("a:b:c").is_err());
    }

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("5 parsecs").is_err());
    }

    #[test]
    fn oversized_durations_are_rejected() {
        let err = parse_duration("999999999999999999h").unwrap_err();
        assert!(err.contains("too large"), "{err}");
        assert!(parse_duration("999999999999999999m").is_err());
        assert_eq!(
            parse_duration("999999999999999999s").unwrap(),
            Duration::from_secs(999_999_999_999_999_999)
        );
    }
}
