//! `watch` command: an initial build, then one rebuild per change batch.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;

use crate::config::Config;
use crate::core::Context;
use crate::logger::{status_error, status_success};
use crate::utils::plural_count;
use crate::watch::{watch, watch_paths};

pub fn run(ctx: &Context, config: &Config) -> Result<()> {
    rebuild(ctx, config, &[]);
    let paths = watch_paths(config);
    watch(ctx, &paths, |changed| rebuild(ctx, config, changed))?;
    Ok(())
}

/// Failed builds are reported and watching goes on.
fn rebuild(ctx: &Context, config: &Config, changed: &[PathBuf]) {
    if ctx.is_done() {
        return;
    }
    let started = Instant::now();
    match super::build::build(ctx, config) {
        Ok(()) => {
            let cause = if changed.is_empty() {
                String::new()
            } else {
                format!(" after {}", plural_count(changed.len(), "change"))
            };
            status_success(&format!("built in {:.2}s{cause}", started.elapsed().as_secs_f64()));
        }
        Err(e) => status_error("build failed", &format!("{e:#}")),
    }
}
