//! Counting gate bounding how many fragment jobs are in flight.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Returned by `Semaphore::acquire` after the gate was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("semaphore closed")]
pub struct SemaphoreClosed;

#[derive(Debug)]
struct GateState {
    available: usize,
    closed: bool,
}

/// Blocking counting semaphore (`Mutex` + `Condvar`).
///
/// `release` must be paired with a successful `acquire`; the gate does not
/// track holders. Waiters are not served in FIFO order.
#[derive(Debug)]
pub struct Semaphore {
    state: Mutex<GateState>,
    changed: Condvar,
    capacity: usize,
}

impl Semaphore {
    /// Gate admitting `capacity` holders at once. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(GateState {
                available: capacity,
                closed: false,
            }),
            changed: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a slot is free, then take it.
    pub fn acquire(&self) -> Result<(), SemaphoreClosed> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(SemaphoreClosed);
            }
            if state.available > 0 {
                state.available -= 1;
                return Ok(());
            }
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Return one slot to the gate.
    pub fn release(&self) {
        let mut state = self.lock();
        state.available = (state.available + 1).min(self.capacity);
        drop(state);
        self.changed.notify_one();
    }

    /// Fail every current and future `acquire`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.lock().available
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
