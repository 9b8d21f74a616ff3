//! Long-lived job fed with tasks while it runs.

use crossbeam::channel::Sender;
use parking_lot::Mutex;

use crate::core::Context;

use super::pool::{Job, Worker, WorkerError};

/// Keeps a job's workers waiting for tasks until stopped.
///
/// [`Controller::start`] blocks for the controller's lifetime, so it runs
/// on its own thread while others call [`Controller::enqueue`].
pub struct Controller<W: Worker> {
    job: Job<W>,
    shutdown: Mutex<Vec<Sender<()>>>,
}

impl<W: Worker> Controller<W> {
    pub fn new(job: Job<W>) -> Self {
        job.set_exit_on_empty_queue(false);
        Self {
            job,
            shutdown: Mutex::new(Vec::new()),
        }
    }

    pub fn job(&self) -> &Job<W> {
        &self.job
    }

    /// Run until stopped. The batch error, if any, goes to `errors`; every
    /// registered shutdown channel is signaled once afterwards.
    pub fn start(&self, ctx: &Context, errors: &Sender<WorkerError>, shutdown: Option<Sender<()>>) {
        self.register(shutdown);
        if let Err(err) = self.job.dispatch(ctx, Vec::new()) {
            errors.send(err).ok();
        }
        let channels = std::mem::take(&mut *self.shutdown.lock());
        for ch in channels {
            ch.try_send(()).ok();
        }
    }

    /// Queue `task` unless `ctx` is done. Returns the queue's verdict.
    pub fn enqueue(&self, ctx: &Context, task: W::Task) -> bool {
        if ctx.is_done() {
            return false;
        }
        self.job.queue().add(task)
    }

    /// Let workers finish the queued tasks, then leave.
    pub fn stop(&self, shutdown: Option<Sender<()>>) {
        self.register(shutdown);
        self.job.set_exit_on_empty_queue(true);
        self.job.queue().drain();
    }

    /// Stop now. Workers finish the task in hand and leave.
    pub fn shutdown(&self) {
        self.job.queue().stop();
    }

    fn register(&self, shutdown: Option<Sender<()>>) {
        if let Some(ch) = shutdown {
            self.shutdown.lock().push(ch);
        }
    }
}
