// src/config/layering.rs

//! Derivation of per-target effective settings.
//!
//! The raw config is never patched in place. Each target's effective view is
//! computed from immutable inputs, layer by layer:
//!
//! 1. the `options_file` baseline (if any),
//! 2. task-level `options`,
//! 3. target-level `options`,
//! 4. task-level `options_os.<os>`,
//! 5. target-level `options_os.<os>`.
//!
//! Later layers override keys from earlier ones (shallow merge). Non-option
//! settings (`cwd`, `command`, `fail_on_error`, ...) fall back from the target
//! to the task.

use crate::config::model::{Options, TargetConfig, TaskConfig};

/// Fully layered settings for one target.
#[derive(Debug, Clone)]
pub struct EffectiveTarget {
    pub settings: TargetConfig,
    pub options: Options,
}

/// Shallow-merge `overlay` on top of `base`, returning a new map.
pub fn merge_options(base: &Options, overlay: &Options) -> Options {
    let mut merged = base.clone();
    for (key, value) in overlay.iter() {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Compute the effective settings for `target` of `task`.
///
/// `target = None` means the task's implicit `default` target, in which case
/// the task-level fields *are* the target.
pub fn effective_target(
    task: &TaskConfig,
    target: Option<&TargetConfig>,
    baseline: &Options,
    os: &str,
) -> EffectiveTarget {
    let base = &task.defaults;
    let empty = Options::new();
    let task_os = base.options_os.get(os).unwrap_or(&empty);

    let Some(target) = target else {
        let options = [&base.options, task_os]
            .into_iter()
            .fold(baseline.clone(), |acc, layer| merge_options(&acc, layer));
        return EffectiveTarget {
            settings: base.clone(),
            options,
        };
    };

    let target_os = target.options_os.get(os).unwrap_or(&empty);
    let options = [&base.options, &target.options, task_os, target_os]
        .into_iter()
        .fold(baseline.clone(), |acc, layer| merge_options(&acc, layer));

    let mut env = base.env.clone();
    env.extend(target.env.iter().map(|(k, v)| (k.clone(), v.clone())));

    let settings = TargetConfig {
        src: target.src.clone(),
        dest: target.dest.clone(),
        files: target.files.clone(),
        cwd: target.cwd.clone().or_else(|| base.cwd.clone()),
        require_matches: target.require_matches.or(base.require_matches),
        options: options.clone(),
        options_os: Default::default(),
        command: target.command.clone().or_else(|| base.command.clone()),
        args: target.args.clone().or_else(|| base.args.clone()),
        env,
        append_files: target.append_files.or(base.append_files),
        fail_on_error: target.fail_on_error.or(base.fail_on_error),
        error_pattern: target
            .error_pattern
            .clone()
            .or_else(|| base.error_pattern.clone()),
        background: target.background.or(base.background),
        ready_pattern: target
            .ready_pattern
            .clone()
            .or_else(|| base.ready_pattern.clone()),
        ready_timeout: target
            .ready_timeout
            .clone()
            .or_else(|| base.ready_timeout.clone()),
    };

    EffectiveTarget { settings, options }
}
