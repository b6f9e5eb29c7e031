//! Ordered job processor.
//!
//! Runs the `work` half of each job concurrently (at most `concurrency` jobs
//! admitted at once) and runs the `callback` half strictly in submission
//! order on a single drainer thread. A job stays admitted from `submit` until
//! its callback has returned, so the cap also bounds buffered results.
//!
//! Workers hand their finished callbacks to the drainer over an `mpsc`
//! channel. The drainer is the only owner of the completion table and the
//! cursor; everything else shares just the outstanding-work counters.

mod drain;
mod error;


use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::control::CancelToken;
use crate::semaphore::Semaphore;

pub use error::ProcessorError;
use error::panic_message;

/// Callback closed over its work's payload, waiting for its turn.
pub(crate) type Callback<E> = Box<dyn FnOnce() -> Result<(), E> + Send>;

/// Message from a worker to the drainer: sequence number plus outcome.
pub(crate) type Completion<E> = (u64, Result<Callback<E>, ProcessorError<E>>);

/// Outstanding-work bookkeeping shared by submitters, workers and the drainer.
struct DrainState<E> {
    submitted: u64,
    /// Callbacks run so far; equals the drainer's cursor.
    completed: u64,
    failed: bool,
    /// First failure, handed out once by `await_drain`.
    failure: Option<ProcessorError<E>>,
}

pub(crate) struct Shared<E> {
    semaphore: Semaphore,
    state: Mutex<DrainState<E>>,
    drained: Condvar,
    cancel: CancelToken,
}

impl<E> Shared<E> {
    fn lock(&self) -> MutexGuard<'_, DrainState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn has_failed(&self) -> bool {
        self.lock().failed
    }

    /// Record the first failure: stop admissions, cancel in-flight work, wake waiters.
    /// Later failures are dropped.
    pub(crate) fn fail(&self, err: ProcessorError<E>, seq: u64) {
        {
            let mut state = self.lock();
            if state.failed {
                tracing::debug!(seq, "suppressing error after first failure");
                return;
            }
            state.failed = true;
            state.failure = Some(err);
        }
        tracing::warn!(seq, "ordered job failed, aborting remaining jobs");
        self.semaphore.close();
        self.cancel.cancel();
        self.drained.notify_all();
    }

    /// One callback finished: free its slot and count it done.
    pub(crate) fn complete_one(&self) {
        self.semaphore.release();
        let mut state = self.lock();
        state.completed += 1;
        if state.completed == state.submitted {
            self.drained.notify_all();
        }
    }
}

/// Sequencer that runs jobs concurrently and their callbacks in order.
///
/// One instance serves one download. `stop` consumes the processor, so no
/// submission can follow it.
pub struct OrderedJobProcessor<E> {
    shared: Arc<Shared<E>>,
    next_seq: AtomicU64,
    tx: mpsc::Sender<Completion<E>>,
    drainer: Option<JoinHandle<()>>,
}

impl<E> OrderedJobProcessor<E>
where
    E: Send + 'static,
{
    /// Processor admitting at most `concurrency` jobs at once (minimum 1).
    pub fn new(concurrency: usize) -> Self {
        Self::with_cancel_token(concurrency, CancelToken::new())
    }

    /// Like `new`, but `cancel` is cancelled on the first failure and checked
    /// by whoever the caller hands it to (typically the jobs' fetches).
    pub fn with_cancel_token(concurrency: usize, cancel: CancelToken) -> Self {
        let shared = Arc::new(Shared {
            semaphore: Semaphore::new(concurrency),
            state: Mutex::new(DrainState {
                submitted: 0,
                completed: 0,
                failed: false,
                failure: None,
            }),
            drained: Condvar::new(),
            cancel,
        });
        let (tx, rx) = mpsc::channel();
        let drainer_shared = Arc::clone(&shared);
        let drainer = thread::Builder::new()
            .name("granger-drain".to_string())
            .spawn(move || drain::drain_loop(rx, drainer_shared));
        let drainer = match drainer {
            Ok(handle) => Some(handle),
            Err(e) => {
                shared.fail(ProcessorError::Spawn(e), 0);
                None
            }
        };
        Self {
            shared,
            next_seq: AtomicU64::new(0),
            tx,
            drainer,
        }
    }

    /// Token cancelled when this processor fails.
    pub fn cancel_token(&self) -> CancelToken {
        self.shared.cancel.clone()
    }

    /// Sequence number of the next callback due to run.
    pub fn cursor(&self) -> u64 {
        self.shared.lock().completed
    }

    /// Number of jobs submitted so far.
    pub fn submitted(&self) -> u64 {
        self.shared.lock().submitted
    }

    /// Admit a job, blocking while `concurrency` jobs are outstanding.
    ///
    /// `work` runs on its own thread; `callback` receives its payload on the
    /// drainer thread after every earlier callback has returned. Returns the
    /// job's sequence number, or `Aborted` once the processor has failed
    /// (the cause is reported by `await_drain`).
    pub fn submit<T, W, C>(&self, work: W, callback: C) -> Result<u64, ProcessorError<E>>
    where
        T: Send + 'static,
        W: FnOnce() -> Result<T, E> + Send + 'static,
        C: FnOnce(T) -> Result<(), E> + Send + 'static,
    {
        if self.shared.semaphore.acquire().is_err() {
            return Err(ProcessorError::Aborted);
        }

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.shared.lock().submitted += 1;

        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("granger-job-{seq}"))
            .spawn(move || {
                let outcome = match panic::catch_unwind(AssertUnwindSafe(work)) {
                    Ok(Ok(payload)) => {
                        let cb: Callback<E> = Box::new(move || callback(payload));
                        Ok(cb)
                    }
                    Ok(Err(e)) => Err(ProcessorError::Job(e)),
                    Err(payload) => Err(ProcessorError::Panicked(panic_message(payload.as_ref()))),
                };
                // The drainer only goes away after the processor is dropped.
                let _ = tx.send((seq, outcome));
            });

        if let Err(e) = spawned {
            self.shared.fail(ProcessorError::Spawn(e), seq);
            return Err(ProcessorError::Aborted);
        }
        tracing::trace!(seq, "job submitted");
        Ok(seq)
    }

    /// Block until every submitted callback has run, or the first failure.
    ///
    /// Returns immediately when nothing is outstanding. The first failure is
    /// returned once; later calls report `Aborted`. Must not be called from
    /// inside a callback.
    pub fn await_drain(&self) -> Result<(), ProcessorError<E>> {
        let mut state = self.shared.lock();
        while !state.failed && state.completed < state.submitted {
            state = self
                .shared
                .drained
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.failed {
            return Err(state.failure.take().unwrap_or(ProcessorError::Aborted));
        }
        Ok(())
    }

    /// Drain, then shut the drainer down.
    ///
    /// After a failure the drainer is left to wind down on its own: in-flight
    /// workers may still be blocked in I/O and are not waited for.
    pub fn stop(mut self) -> Result<(), ProcessorError<E>> {
        let result = self.await_drain();
        let drainer = self.drainer.take();
        // Dropping `self` drops the last submit-side sender.
        drop(self);
        if result.is_ok() {
            if let Some(handle) = drainer {
                if handle.join().is_err() {
                    return Err(ProcessorError::Panicked("drainer thread panicked".to_string()));
                }
            }
        }
        result
    }
}
