//! Drainer loop: the single consumer of completions.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use super::error::panic_message;
use super::{Callback, Completion, ProcessorError, Shared};

/// Receive completions until every sender is gone, running callbacks in
/// sequence order. After a failure, completions are received and dropped.
pub(super) fn drain_loop<E>(rx: Receiver<Completion<E>>, shared: Arc<Shared<E>>)
where
    E: Send + 'static,
{
    let mut table: BTreeMap<u64, Callback<E>> = BTreeMap::new();
    let mut next_to_run: u64 = 0;

    for (seq, outcome) in rx {
        if shared.has_failed() {
            table.clear();
            continue;
        }
        match outcome {
            Ok(callback) => {
                let previous = table.insert(seq, callback);
                debug_assert!(previous.is_none(), "sequence {seq} completed twice");
            }
            Err(err) => {
                shared.fail(err, seq);
                table.clear();
                continue;
            }
        }

        while let Some(callback) = table.remove(&next_to_run) {
            let seq = next_to_run;
            let result = panic::catch_unwind(AssertUnwindSafe(callback));
            next_to_run += 1;
            match result {
                Ok(Ok(())) => shared.complete_one(),
                Ok(Err(e)) => {
                    shared.fail(ProcessorError::Job(e), seq);
                    table.clear();
                    break;
                }
                Err(payload) => {
                    shared.fail(ProcessorError::Panicked(panic_message(payload.as_ref())), seq);
                    table.clear();
                    break;
                }
            }
        }
        if !table.is_empty() {
            tracing::trace!(
                next_to_run,
                buffered = table.len(),
                "waiting for next job in sequence"
            );
        }
    }
}
