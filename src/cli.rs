// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::DEFAULT_CONFIG_FILE;

/// Command-line arguments for `taskdeck`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskdeck",
    version,
    about = "Run declared build tasks as pipelines, and re-run them when files change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). Its directory is the project root.
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "TASKDECK_CONFIG",
        default_value = DEFAULT_CONFIG_FILE
    )]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKDECK_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run tasks, `task:target` pairs or aliases as one pipeline.
    Run {
        #[arg(required = true, value_name = "NAME")]
        names: Vec<String>,

        /// Keep going after a failed step and report every failure.
        #[arg(long)]
        continue_on_failure: bool,

        /// Print the expanded plan with resolved files; run nothing.
        #[arg(long)]
        dry_run: bool,

        /// Exit right after the pipeline even if background processes are
        /// running (they are stopped).
        #[arg(long)]
        no_hold: bool,
    },

    /// Optionally run NAME once, then re-run watch rules on file changes.
    Watch {
        #[arg(value_name = "NAME")]
        name: Option<String>,
    },

    /// Print tasks, aliases and watch rules.
    List,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
