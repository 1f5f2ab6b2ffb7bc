// src/exec/builtin.rs

//! Built-in in-process units.

use anyhow::{bail, Context};

use crate::exec::unit::{InProcessUnit, UnitContext};

/// Concatenate each mapping's sources into its destination.
///
/// Options:
/// - `separator` (string, default `"\n"`) placed between files.
/// - `banner` (string) written before the first file.
#[derive(Debug, Default)]
pub struct ConcatUnit;

impl InProcessUnit for ConcatUnit {
    fn run(&self, ctx: &UnitContext) -> anyhow::Result<String> {
        let separator = ctx.option_str("separator").unwrap_or("\n");
        let mut report = Vec::new();

        for mapping in ctx.mappings.iter() {
            let Some(dest) = &mapping.dest else {
                bail!("concat needs a destination (`dest` or `files`) for {}", ctx.invocation);
            };

            let mut parts = Vec::with_capacity(mapping.files.len() + 1);
            if let Some(banner) = ctx.option_str("banner") {
                parts.push(banner.to_string());
            }
            for file in mapping.files.iter() {
                let path = ctx.cwd.join(file);
                let text = ctx
                    .fs
                    .read_to_string(&path)
                    .with_context(|| format!("concat source {file}"))?;
                parts.push(text);
            }

            let dest_path = ctx.root.join(dest);
            ctx.fs
                .write(&dest_path, parts.join(separator).as_bytes())
                .with_context(|| format!("writing {dest}"))?;
            report.push(format!("wrote {dest} ({} files)", mapping.files.len()));
        }

        Ok(report.join("\n"))
    }
}

/// Report the resolved file list, one path per line.
#[derive(Debug, Default)]
pub struct FilesUnit;

impl InProcessUnit for FilesUnit {
    fn run(&self, ctx: &UnitContext) -> anyhow::Result<String> {
        Ok(ctx.files().collect::<Vec<_>>().join("\n"))
    }
}
