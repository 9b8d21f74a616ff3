//! Worker pool dispatching one batch of tasks.
//!
//! ```text
//!   dispatch ──► queue ──► worker 1..N ──► Worker::work
//!      ▲                       │
//!      └── select { ctx done | worker quit | worker error }
//! ```
//!
//! The first worker to quit stops the queue so blocked peers return; the
//! batch ends when every worker has quit.

use std::error::Error as StdError;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Barrier;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use thiserror::Error;

use crate::core::Context;
use crate::debug;

use super::queue::WorkQueue;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// ============================================================================
// Errors
// ============================================================================

/// A failed task, or a failed batch.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct WorkerError {
    #[source]
    source: BoxError,
    code: i32,
}

impl WorkerError {
    pub fn new(err: impl Into<BoxError>, code: i32) -> Self {
        Self {
            source: err.into(),
            code,
        }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.downcast_ref::<E>()
    }

    /// Batch failures collected in fault-tolerant mode.
    pub fn multi(&self) -> Option<&MultiError> {
        self.downcast_ref::<MultiError>()
    }

    /// Every task failure carried by this error.
    pub fn flatten(&self) -> Vec<&WorkerError> {
        match self.multi() {
            Some(multi) => multi.errors.iter().flat_map(WorkerError::flatten).collect(),
            None => vec![self],
        }
    }
}

/// Errors of one batch.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<WorkerError>,
}

impl MultiError {
    pub fn push(&mut self, err: WorkerError) {
        self.errors.push(err);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[WorkerError] {
        &self.errors
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for err in &self.errors {
            writeln!(f, "  * {err}")?;
        }
        write!(
            f,
            "found {} error{}",
            self.errors.len(),
            crate::utils::plural_s(self.errors.len())
        )
    }
}

impl StdError for MultiError {}

// ============================================================================
// Worker
// ============================================================================

pub trait Worker: Send + Sync {
    type Task: Send;

    /// Process `task`. Workers may push follow-up tasks onto `queue` and
    /// must return promptly once `ctx` is done.
    fn work(&self, ctx: &Context, task: Self::Task, queue: &WorkQueue<Self::Task>) -> Result<(), WorkerError>;
}

/// [`Worker`] from a closure.
pub struct WorkerFn<T, F> {
    f: F,
    _task: PhantomData<fn(T)>,
}

impl<T, F> WorkerFn<T, F>
where
    F: Fn(&Context, T, &WorkQueue<T>) -> Result<(), WorkerError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _task: PhantomData,
        }
    }
}

impl<T: Send, F> Worker for WorkerFn<T, F>
where
    F: Fn(&Context, T, &WorkQueue<T>) -> Result<(), WorkerError> + Send + Sync,
{
    type Task = T;

    fn work(&self, ctx: &Context, task: T, queue: &WorkQueue<T>) -> Result<(), WorkerError> {
        (self.f)(ctx, task, queue)
    }
}

// ============================================================================
// Job
// ============================================================================

pub struct Job<W: Worker> {
    /// Used in log messages.
    pub id: String,
    pub max_workers: usize,
    pub min_workers: usize,
    /// Stop at the first error instead of collecting all of them.
    pub fail_fast: bool,
    worker: W,
    queue: WorkQueue<W::Task>,
    /// Whether a worker leaves once its task is done and the queue is empty.
    exit_on_empty_queue: AtomicBool,
}

/// Sends the quit signal even when `work` panics.
struct QuitGuard<'a>(&'a Sender<usize>, usize);

impl Drop for QuitGuard<'_> {
    fn drop(&mut self) {
        self.0.send(self.1).ok();
    }
}

impl<W: Worker> Job<W> {
    pub fn new(id: impl Into<String>, worker: W, queue: WorkQueue<W::Task>) -> Self {
        Self {
            id: id.into(),
            max_workers: 1,
            min_workers: 0,
            fail_fast: false,
            worker,
            queue,
            exit_on_empty_queue: AtomicBool::new(true),
        }
    }

    pub fn with_workers(mut self, min: usize, max: usize) -> Self {
        self.min_workers = min;
        self.max_workers = max;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn queue(&self) -> &WorkQueue<W::Task> {
        &self.queue
    }

    pub fn worker(&self) -> &W {
        &self.worker
    }

    pub fn set_exit_on_empty_queue(&self, exit: bool) {
        self.exit_on_empty_queue.store(exit, Ordering::SeqCst);
    }

    /// Run `tasks` (and whatever workers enqueue) to completion.
    ///
    /// # Panics
    ///
    /// When `max_workers < min_workers`.
    pub fn dispatch(&self, ctx: &Context, tasks: Vec<W::Task>) -> Result<(), WorkerError> {
        assert!(
            self.max_workers >= self.min_workers,
            "Job {} maxWorkers < minWorkers: {} < {}",
            self.id,
            self.max_workers,
            self.min_workers
        );
        if self.max_workers == 0 {
            return Ok(());
        }
        let workers = tasks.len().clamp(self.min_workers, self.max_workers);
        if workers == 0 {
            return Ok(());
        }

        for task in tasks {
            self.queue.add(task);
        }

        let (quit_tx, quit_rx) = channel::bounded::<usize>(workers);
        let (err_tx, err_rx) = channel::unbounded::<WorkerError>();
        let started = Barrier::new(workers + 1);

        let errors = thread::scope(|scope| {
            for id in 0..workers {
                let quit_tx = quit_tx.clone();
                let err_tx = err_tx.clone();
                let started = &started;
                scope.spawn(move || {
                    let _quit = QuitGuard(&quit_tx, id);
                    started.wait();
                    self.run_worker(ctx, id, &err_tx);
                });
            }
            drop(err_tx);
            started.wait();
            debug!("jobs"; "{}: {} workers started", self.id, workers);
            self.coordinate(ctx, workers, &quit_rx, &err_rx)
        });

        self.finish(errors)
    }

    fn run_worker(&self, ctx: &Context, id: usize, errors: &Sender<WorkerError>) {
        while let Some(task) = self.queue.get() {
            if let Err(err) = self.worker.work(ctx, task, &self.queue) {
                errors.send(err).ok();
            }
            if self.exit_on_empty_queue.load(Ordering::SeqCst) && self.queue.count() == 0 {
                break;
            }
        }
        debug!("jobs"; "{} worker {id} stopped", self.id);
    }

    fn coordinate(
        &self,
        ctx: &Context,
        workers: usize,
        quit: &Receiver<usize>,
        errors: &Receiver<WorkerError>,
    ) -> Vec<WorkerError> {
        let never_done = channel::never::<()>();
        let never_err = channel::never::<WorkerError>();
        let deadline = ctx.deadline_tick();
        let mut ctx_seen = false;
        let mut errors_open = true;
        let mut stopped = 0;
        let mut collected = Vec::new();

        let on_ctx_done = |collected: &mut Vec<WorkerError>| {
            if let Some(err) = ctx.err() {
                collected.push(WorkerError::new(err, 0));
            }
            self.queue.stop();
        };

        while stopped < workers {
            let done = if ctx_seen { &never_done } else { ctx.done() };
            let err_rx = if errors_open { errors } else { &never_err };
            crossbeam::select! {
                recv(done) -> _ => {
                    ctx_seen = true;
                    on_ctx_done(&mut collected);
                }
                recv(deadline) -> _ => {
                    if !ctx_seen {
                        ctx_seen = true;
                        on_ctx_done(&mut collected);
                    }
                }
                recv(quit) -> _ => {
                    stopped += 1;
                    if stopped == 1 {
                        self.queue.stop();
                    }
                }
                recv(err_rx) -> msg => match msg {
                    Ok(err) => {
                        collected.push(err);
                        if self.fail_fast {
                            self.queue.stop();
                        }
                    }
                    Err(_) => errors_open = false,
                },
            }
        }

        collected.extend(errors.try_iter());
        if self.queue.count() > 0 {
            debug!("jobs"; "{}: {} unprocessed items in queue", self.id, self.queue.count());
        }
        collected
    }

    fn finish(&self, mut errors: Vec<WorkerError>) -> Result<(), WorkerError> {
        if errors.is_empty() {
            return Ok(());
        }
        if self.fail_fast {
            return Err(errors.swap_remove(0));
        }
        let mut multi = MultiError::default();
        for err in errors {
            multi.push(err);
        }
        Err(WorkerError::new(multi, 0))
    }
}
