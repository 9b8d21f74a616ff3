//! Watch mode: rebuild when local inputs change.
//!
//! Only local inputs are watched: a manifest given as a file path and the
//! directories of `[github.resource_mappings]`. Events are batched by
//! [`Debouncer`]; each batch runs one full rebuild.

pub mod debouncer;

pub use debouncer::Debouncer;

use std::path::PathBuf;

use crossbeam::channel;
use notify::{RecursiveMode, Watcher};
use thiserror::Error;

use crate::config::Config;
use crate::core::Context;
use crate::core::link::is_absolute_link;
use crate::{debug, log};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("file watcher failed")]
    Notify(#[from] notify::Error),

    #[error("nothing to watch: the manifest is remote and no resource mappings are configured")]
    NothingToWatch,
}

/// Local files and directories a build of `config` reads.
pub fn watch_paths(config: &Config) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let manifest = config.build.manifest.strip_prefix("file://").unwrap_or(&config.build.manifest);
    if !manifest.is_empty() && !is_absolute_link(manifest) {
        paths.push(PathBuf::from(manifest));
    }
    paths.extend(config.github.resource_mappings.values().cloned());
    paths.retain(|p| p.exists());
    paths.sort();
    paths.dedup();
    paths
}

/// Call `rebuild` with every batch of changes below `paths` until `ctx`
/// is done.
pub fn watch<F>(ctx: &Context, paths: &[PathBuf], mut rebuild: F) -> Result<(), WatchError>
where
    F: FnMut(&[PathBuf]),
{
    if paths.is_empty() {
        return Err(WatchError::NothingToWatch);
    }

    let (tx, rx) = channel::unbounded();
    let mut watcher = notify::recommended_watcher(move |res| {
        tx.send(res).ok();
    })?;
    for path in paths {
        let mode = if path.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(path, mode)?;
        debug!("watch"; "watching {}", path.display());
    }
    log!("watch"; "watching {} for changes, press Ctrl+C to stop",
        crate::utils::plural_count(paths.len(), "path"));

    let mut debouncer = Debouncer::new();
    loop {
        channel::select! {
            recv(ctx.done()) -> _ => break,
            recv(rx) -> msg => match msg {
                Ok(Ok(event)) => debouncer.add_event(&event),
                Ok(Err(e)) => log!("watch"; "notify error: {e}"),
                Err(_) => break,
            },
            default(debouncer.sleep_duration()) => {
                if let Some(changed) = debouncer.take_if_ready() {
                    rebuild(&changed);
                }
            }
        }
    }
    Ok(())
}
