//! Blocking multi-producer multi-consumer task queue.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

struct State<T> {
    items: VecDeque<T>,
    stopped: bool,
    draining: bool,
}

/// FIFO buffer shared by a job's workers.
///
/// - `get` blocks until a task arrives, the queue is stopped, or the queue
///   is draining and empty
/// - a stopped queue rejects `add` and hands out nothing, even if tasks
///   remain buffered
pub struct WorkQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    /// `0` means unbounded.
    capacity: usize,
}

impl<T> WorkQueue<T> {
    /// Queue holding at most `capacity` tasks; `add` blocks while full.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                stopped: false,
                draining: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    pub fn unbounded() -> Self {
        Self::bounded(0)
    }

    /// Returns `false` when the queue is stopped.
    pub fn add(&self, task: T) -> bool {
        let mut state = self.state.lock();
        while !state.stopped && self.capacity > 0 && state.items.len() >= self.capacity {
            self.not_full.wait(&mut state);
        }
        if state.stopped {
            return false;
        }
        state.items.push_back(task);
        self.not_empty.notify_one();
        true
    }

    /// Next task, or `None` once the queue is stopped (or drained).
    pub fn get(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if state.stopped {
                return None;
            }
            if let Some(task) = state.items.pop_front() {
                self.not_full.notify_one();
                return Some(task);
            }
            if state.draining {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Stop the queue and wake every waiter.
    ///
    /// Returns `true` only for the call that actually stopped it.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        let first = !state.stopped;
        state.stopped = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
        first
    }

    /// Let blocked and future `get` calls return `None` once the queue is
    /// empty. Adding stays possible.
    pub fn drain(&self) {
        let mut state = self.state.lock();
        state.draining = true;
        self.not_empty.notify_all();
    }

    pub fn count(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}
