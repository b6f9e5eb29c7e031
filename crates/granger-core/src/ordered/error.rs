//! Errors reported by the ordered job processor.

use thiserror::Error;

/// Failure of an ordered job processor run.
///
/// `Job` carries the first error returned by a job's work or callback.
/// Everything reported after that is `Aborted`.
#[derive(Debug, Error)]
pub enum ProcessorError<E> {
    #[error("{0}")]
    Job(E),

    #[error("job processor aborted after an earlier failure")]
    Aborted,

    #[error("job panicked: {0}")]
    Panicked(String),

    #[error("failed to spawn job thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Best-effort text of a caught panic payload.
pub(super) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}
