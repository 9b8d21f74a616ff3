//! Git history export.
//!
//! For every written document the handler's commit summary is stored as
//! `<git_info_destination>/<node path>/<name>.json`.

use std::sync::Arc;

use crate::core::Context;
use crate::jobs::{Controller, WorkQueue, Worker, WorkerError};
use crate::resource::Registry;
use crate::writer::Writer;
use crate::{debug, log};

use super::ReactorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitInfoTask {
    pub source: String,
    /// Output directory of the document, relative to the writer root.
    pub path: String,
    /// Document file name.
    pub name: String,
}

/// Accepts git-info tasks while documents are processed.
pub trait GitInfoScheduler: Send + Sync {
    fn schedule(&self, ctx: &Context, task: GitInfoTask) -> Result<(), ReactorError>;
}

pub struct GitInfoWorker {
    registry: Registry,
    writer: Arc<dyn Writer>,
}

impl GitInfoWorker {
    pub fn new(registry: Registry, writer: Arc<dyn Writer>) -> Self {
        Self { registry, writer }
    }

    fn export(&self, ctx: &Context, task: &GitInfoTask) -> Result<(), ReactorError> {
        let handler = self.registry.require(&task.source)?;
        let Some(info) = handler.read_git_info(ctx, &task.source)? else {
            debug!("gitinfo"; "no git info for {}", task.source);
            return Ok(());
        };
        self.writer.write(&format!("{}.json", task.name), &task.path, &info)?;
        Ok(())
    }
}

impl Worker for GitInfoWorker {
    type Task = GitInfoTask;

    fn work(&self, ctx: &Context, task: GitInfoTask, _: &WorkQueue<GitInfoTask>) -> Result<(), WorkerError> {
        match self.export(ctx, &task) {
            Err(ReactorError::Resource(err)) if err.is_not_found() => {
                log!("warning"; "git info of {}: {err}", task.source);
                Ok(())
            }
            Err(err) => Err(WorkerError::new(err, 0)),
            Ok(()) => Ok(()),
        }
    }
}

impl GitInfoScheduler for Controller<GitInfoWorker> {
    fn schedule(&self, ctx: &Context, task: GitInfoTask) -> Result<(), ReactorError> {
        let source = task.source.clone();
        if self.enqueue(ctx, task) {
            Ok(())
        } else {
            Err(ReactorError::Schedule {
                reference: source.clone(),
                referer: source,
            })
        }
    }
}
