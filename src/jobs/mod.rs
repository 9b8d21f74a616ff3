//! Concurrent task execution.
//!
//! - [`queue`]: blocking MPMC [`WorkQueue`]
//! - [`pool`]: [`Job::dispatch`] runs one batch over N workers
//! - [`controller`]: a job kept alive while tasks keep arriving

pub mod controller;
pub mod pool;
pub mod queue;

pub use controller::Controller;
pub use pool::{Job, MultiError, Worker, WorkerError, WorkerFn};
pub use queue::WorkQueue;
