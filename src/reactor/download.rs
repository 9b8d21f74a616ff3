//! Resource downloads.
//!
//! Documents schedule the resources they embed while their links are
//! resolved; a [`Controller`] drains the schedule in parallel with the
//! document job. Each source is fetched once, whatever the number of
//! referers.

use std::sync::Arc;

use dashmap::DashSet;

use crate::core::Context;
use crate::jobs::{Controller, WorkQueue, Worker, WorkerError};
use crate::logger::ProgressLine;
use crate::resource::{Registry, ResourceError};
use crate::writer::Writer;
use crate::{debug, log};

use super::ReactorError;

/// Queue capacity of the download job.
pub const DOWNLOAD_QUEUE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Absolute link of the resource.
    pub source: String,
    /// File name under the resources root.
    pub target: String,
    /// Source of the document referencing the resource.
    pub referer: String,
    /// Destination as written in the referer.
    pub reference: String,
}

/// Accepts download tasks while documents are processed.
pub trait DownloadScheduler: Send + Sync {
    fn schedule(&self, ctx: &Context, task: DownloadTask) -> Result<(), ReactorError>;
}

pub struct Downloader {
    registry: Registry,
    writer: Arc<dyn Writer>,
    downloaded: DashSet<String>,
    progress: Option<Arc<ProgressLine>>,
}

impl Downloader {
    pub fn new(registry: Registry, writer: Arc<dyn Writer>) -> Self {
        Self {
            registry,
            writer,
            downloaded: DashSet::new(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<ProgressLine>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn download(&self, ctx: &Context, task: &DownloadTask) -> Result<(), ReactorError> {
        debug!("download"; "{} as {}", task.source, task.target);
        let handler = self.registry.require(&task.source)?;
        let blob = handler.read(ctx, &task.source)?;
        self.writer.write(&task.target, "", &blob)?;
        Ok(())
    }
}

impl Worker for Downloader {
    type Task = DownloadTask;

    fn work(&self, ctx: &Context, task: DownloadTask, _: &WorkQueue<DownloadTask>) -> Result<(), WorkerError> {
        if let Some(progress) = &self.progress {
            progress.inc("downloads");
        }
        if !self.downloaded.insert(task.source.clone()) {
            return Ok(());
        }
        match self.download(ctx, &task) {
            Ok(()) => Ok(()),
            Err(ReactorError::Resource(ResourceError::NotFound(_))) => {
                log!("warning"; "reference {} from referer {}: resource not found", task.reference, task.referer);
                Ok(())
            }
            Err(err) => {
                log!("warning"; "reference {} from referer {}: {err}", task.reference, task.referer);
                Err(WorkerError::new(
                    ReactorError::Download {
                        reference: task.reference,
                        referer: task.referer,
                        source: Box::new(err),
                    },
                    0,
                ))
            }
        }
    }
}

impl DownloadScheduler for Controller<Downloader> {
    fn schedule(&self, ctx: &Context, task: DownloadTask) -> Result<(), ReactorError> {
        debug!("download"; "[{}] {} scheduled as {}", task.referer, task.reference, task.target);
        let (reference, referer) = (task.reference.clone(), task.referer.clone());
        if let Some(progress) = &self.job().worker().progress {
            progress.add_total("downloads", 1);
        }
        if self.enqueue(ctx, task) {
            Ok(())
        } else {
            Err(ReactorError::Schedule { reference, referer })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::Job;
    use crate::resource::testing::MemoryHandler;
    use crate::writer::DryRunWriter;
    use crossbeam::channel;
    use std::thread;

    fn task(source: &str, target: &str) -> DownloadTask {
        DownloadTask {
            source: source.to_string(),
            target: target.to_string(),
            referer: "mem://doc.md".to_string(),
            reference: "./img.png".to_string(),
        }
    }

    fn downloader(dry: &DryRunWriter) -> Downloader {
        let handler = MemoryHandler::with_files(&[("img.png", "PNG"), ("b.png", "BB")]);
        Downloader::new(
            Registry::new(vec![Arc::new(handler)]),
            Arc::new(dry.target("__resources")),
        )
    }

    #[test]
    fn test_downloads_once_per_source() {
        let dry = DryRunWriter::new();
        let worker = downloader(&dry);
        let queue = WorkQueue::unbounded();
        let ctx = Context::background();
        worker.work(&ctx, task("mem://img.png", "img_1.png"), &queue).unwrap();
        worker.work(&ctx, task("mem://img.png", "img_2.png"), &queue).unwrap();
        assert_eq!(dry.files(), vec![("__resources/img_1.png".to_string(), 3)]);
    }

    #[test]
    fn test_missing_resource_is_a_warning() {
        let dry = DryRunWriter::new();
        let worker = downloader(&dry);
        let queue = WorkQueue::unbounded();
        worker
            .work(&Context::background(), task("mem://gone.png", "gone.png"), &queue)
            .unwrap();
        assert!(dry.files().is_empty());
    }

    #[test]
    fn test_other_failures_are_errors() {
        let dry = DryRunWriter::new();
        let worker = downloader(&dry);
        let queue = WorkQueue::unbounded();
        let err = worker
            .work(&Context::background(), task("https://x/a.png", "a.png"), &queue)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "reference ./img.png from referer mem://doc.md: no suitable handler registered for https://x/a.png"
        );
    }

    #[test]
    fn test_controller_schedule() {
        let dry = DryRunWriter::new();
        let job = Job::new("Download", downloader(&dry), WorkQueue::bounded(DOWNLOAD_QUEUE_SIZE))
            .with_workers(2, 2);
        let controller = Controller::new(job);
        let ctx = Context::background();
        let (err_tx, err_rx) = channel::unbounded();

        thread::scope(|s| {
            s.spawn(|| controller.start(&ctx, &err_tx, None));
            controller.schedule(&ctx, task("mem://img.png", "img.png")).unwrap();
            controller.schedule(&ctx, task("mem://b.png", "b.png")).unwrap();
            controller.stop(None);
        });
        assert!(err_rx.try_recv().is_err());
        assert_eq!(dry.files().len(), 2);

        controller.shutdown();
        assert!(matches!(
            controller.schedule(&ctx, task("mem://img.png", "x.png")),
            Err(ReactorError::Schedule { .. })
        ));
    }
}
