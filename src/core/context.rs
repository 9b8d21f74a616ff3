//! Cancellation token threaded through resolution and the worker runtime.
//!
//! A [`Context`] is cheap to clone. Cancelling any clone cancels all of them.
//! [`Context::done`] yields a receiver that disconnects on cancellation, so
//! it can sit in a `crossbeam::select!` next to other event sources.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

/// Why a context is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("context canceled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

struct CancelState {
    cancelled: AtomicBool,
    /// Dropped on cancel; disconnects `rx`.
    tx: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

#[derive(Clone)]
pub struct Context {
    state: Arc<CancelState>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never done unless cancelled.
    pub fn background() -> Self {
        let (tx, rx) = channel::bounded(0);
        Self {
            state: Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                tx: Mutex::new(Some(tx)),
                rx,
            }),
            deadline: None,
        }
    }

    /// Same cancellation, plus a deadline `timeout` from now.
    ///
    /// The earlier of the existing and new deadline wins.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let at = Instant::now() + timeout;
        Self {
            state: Arc::clone(&self.state),
            deadline: Some(self.deadline.map_or(at, |d| d.min(at))),
        }
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.tx.lock().take();
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    pub fn err(&self) -> Option<ContextError> {
        if self.state.cancelled.load(Ordering::SeqCst) {
            Some(ContextError::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(ContextError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Disconnects when the context is cancelled.
    pub fn done(&self) -> &Receiver<()> {
        &self.state.rx
    }

    /// Fires once at the deadline, never if there is none.
    pub fn deadline_tick(&self) -> Receiver<Instant> {
        match self.deadline {
            Some(d) => channel::at(d),
            None => channel::never(),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("err", &self.err())
            .field("deadline", &self.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::select;

    #[test]
    fn test_cancel_disconnects_done() {
        let ctx = Context::background();
        let clone = ctx.clone();
        assert!(!ctx.is_done());

        clone.cancel();
        clone.cancel();
        assert_eq!(ctx.err(), Some(ContextError::Cancelled));
        assert!(ctx.done().recv().is_err());
    }

    #[test]
    fn test_deadline_exceeded() {
        let ctx = Context::background().with_timeout(Duration::from_millis(10));
        select! {
            recv(ctx.done()) -> _ => panic!("not cancelled"),
            recv(ctx.deadline_tick()) -> _ => {}
        }
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[test]
    fn test_with_timeout_keeps_earlier_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(5));
        let longer = ctx.with_timeout(Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(longer.err(), Some(ContextError::DeadlineExceeded));
    }
}
