// src/registry/resolve.rs

use std::collections::HashSet;
use std::path::Path;

use globset::{GlobBuilder, GlobMatcher};

use crate::errors::{Result, TaskdeckError};
use crate::fs::{list_files, FileSystem};
use crate::registry::target::Target;

/// Resolved files for one mapping of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMapping {
    pub dest: Option<String>,
    /// Paths relative to the target's working directory, `/`-separated.
    pub files: Vec<String>,
}

/// Compile a single glob the way task patterns are written: `*` stays within
/// one path segment, `**` crosses segments.
pub(crate) fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(&normalize_pattern(pattern))
        .literal_separator(true)
        .build()?;
    Ok(glob.compile_matcher())
}

fn normalize_pattern(pattern: &str) -> String {
    let pattern = pattern.replace('\\', "/");
    if let Some(rest) = pattern.strip_prefix("./") {
        return rest.to_string();
    }
    pattern
}

/// Apply `patterns` in order against `candidates`.
///
/// - A plain pattern appends every matching candidate not already selected,
///   in candidate order.
/// - A `!pattern` removes every already selected path it matches.
///
/// `candidates` should be sorted for the result to be deterministic.
pub fn resolve_patterns(candidates: &[String], patterns: &[String]) -> Result<Vec<String>> {
    let mut selected: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for pattern in patterns {
        if let Some(negated) = pattern.strip_prefix('!') {
            let matcher = compile_glob(negated)?;
            selected.retain(|path| {
                let keep = !matcher.is_match(path);
                if !keep {
                    seen.remove(path);
                }
                keep
            });
            continue;
        }

        let matcher = compile_glob(pattern)?;
        for candidate in candidates {
            if matcher.is_match(candidate) && seen.insert(candidate.clone()) {
                selected.push(candidate.clone());
            }
        }
    }

    Ok(selected)
}

/// Resolve every mapping of `target` against the files under
/// `root`/`target.cwd`.
///
/// Fails with `NoMatch` only when the target requires matches and nothing
/// matched at all.
pub fn resolve_mappings(
    fs: &dyn FileSystem,
    root: &Path,
    target: &Target,
) -> Result<Vec<ResolvedMapping>> {
    if target.mappings.is_empty() {
        if target.require_matches {
            return Err(no_match(target));
        }
        return Ok(Vec::new());
    }

    let base = match &target.cwd {
        Some(cwd) => root.join(cwd),
        None => root.to_path_buf(),
    };
    let candidates = list_files(fs, &base)?;

    let resolved = target
        .mappings
        .iter()
        .map(|mapping| {
            Ok(ResolvedMapping {
                dest: mapping.dest.clone(),
                files: resolve_patterns(&candidates, &mapping.patterns)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if target.require_matches && resolved.iter().all(|m| m.files.is_empty()) {
        return Err(no_match(target));
    }
    Ok(resolved)
}

/// Resolve `target` to one flat, ordered file list.
pub fn resolve_files(fs: &dyn FileSystem, root: &Path, target: &Target) -> Result<Vec<String>> {
    Ok(resolve_mappings(fs, root, target)?
        .into_iter()
        .flat_map(|m| m.files)
        .collect())
}

fn no_match(target: &Target) -> TaskdeckError {
    TaskdeckError::NoMatch {
        task: target.task.clone(),
        target: target.name.clone(),
        patterns: target.patterns(),
    }
}
