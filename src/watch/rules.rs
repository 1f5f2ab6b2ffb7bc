// src/watch/rules.rs

use std::fmt;
use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::config::ConfigFile;
use crate::errors::{Result, TaskdeckError};
use crate::plan::Composer;
use crate::types::{Invocation, TaskRef};

/// Include / exclude glob sets compiled from one pattern list.
///
/// `!pattern` entries go to the exclude set; a path matches when it hits the
/// include set and misses the exclude set.
#[derive(Clone)]
pub struct PatternMatcher {
    include: GlobSet,
    exclude: Option<GlobSet>,
}

impl fmt::Debug for PatternMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternMatcher")
            .field("include", &self.include.len())
            .field("exclude", &self.exclude.as_ref().map(GlobSet::len))
            .finish()
    }
}

impl PatternMatcher {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let (excludes, includes): (Vec<&str>, Vec<&str>) = patterns
            .iter()
            .map(|p| p.trim())
            .partition(|p| p.starts_with('!'));
        let excludes: Vec<&str> = excludes.into_iter().map(|p| &p[1..]).collect();

        if includes.is_empty() {
            return Err(TaskdeckError::ConfigError(
                "watch patterns need at least one non-negated pattern".to_string(),
            ));
        }

        Ok(Self {
            include: build_set(&includes)?,
            exclude: if excludes.is_empty() {
                None
            } else {
                Some(build_set(&excludes)?)
            },
        })
    }

    /// `rel_path` is relative to the project root, `/`-separated.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        !self
            .exclude
            .as_ref()
            .is_some_and(|exclude| exclude.is_match(rel_path))
    }
}

fn build_set(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.replace('\\', "/");
        let pattern = pattern.strip_prefix("./").unwrap_or(&pattern);
        builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}

/// A compiled `[watch.<name>]` rule.
///
/// The rule's references are expanded once, up front, so a change only has
/// to look up `plan`.
#[derive(Debug, Clone)]
pub struct WatchRule {
    name: String,
    patterns: Vec<String>,
    refs: Vec<TaskRef>,
    plan: Vec<Invocation>,
    spawn: bool,
    matcher: PatternMatcher,
}

impl WatchRule {
    pub fn new(
        name: impl Into<String>,
        patterns: Vec<String>,
        refs: Vec<TaskRef>,
        plan: Vec<Invocation>,
        spawn: bool,
    ) -> Result<Self> {
        let name = name.into();
        let matcher = PatternMatcher::new(&patterns).map_err(|e| match e {
            TaskdeckError::ConfigError(msg) => {
                TaskdeckError::ConfigError(format!("watch rule '{name}': {msg}"))
            }
            other => other,
        })?;
        Ok(Self {
            name,
            patterns,
            refs,
            plan,
            spawn,
            matcher,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn refs(&self) -> &[TaskRef] {
        &self.refs
    }

    /// Ordered invocations run when the rule fires.
    pub fn plan(&self) -> &[Invocation] {
        &self.plan
    }

    pub fn spawn(&self) -> bool {
        self.spawn
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.matcher.matches(rel_path)
    }
}

/// Compile every watch rule of `cfg`, in declaration order.
pub fn build_watch_rules(cfg: &ConfigFile, composer: &Composer) -> Result<Vec<WatchRule>> {
    cfg.watch_rules()
        .iter()
        .map(|(name, rule)| {
            let refs = rule
                .tasks
                .iter()
                .map(|raw| TaskRef::parse(raw).map_err(TaskdeckError::ConfigError))
                .collect::<Result<Vec<_>>>()?;
            let mut plan = Vec::new();
            for r in refs.iter() {
                plan.extend(composer.expand_ref(r)?);
            }
            WatchRule::new(name.clone(), rule.files.clone(), refs, plan, rule.spawn)
        })
        .collect()
}

/// Convert `path` into a `/`-separated string relative to `root`.
///
/// Falls back to canonicalizing both sides when a plain prefix strip fails
/// (symlinked temp dirs on macOS). Returns `None` for paths outside `root`.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) else {
        return None;
    };
    path_canon
        .strip_prefix(&root_canon)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}
