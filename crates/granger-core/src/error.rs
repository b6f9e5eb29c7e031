//! Download error taxonomy.
//!
//! Every fatal condition of a download surfaces as exactly one `FetchError`
//! from `Downloader::run`. There is no retry: the first error observed wins.

use thiserror::Error;

use crate::ordered::ProcessorError;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (connect, DNS, reset, timeout, truncated body).
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The server answered with a status outside 200..=299.
    #[error("unexpected HTTP status {status}")]
    UnexpectedStatus { status: u32 },

    /// The discovery response carried no parseable `Content-Length`.
    #[error("resource size unavailable: missing or unparseable Content-Length")]
    DiscoverySizeUnavailable,

    /// The sink failed to accept a write, sync or finalize.
    #[error("sink write failed: {0}")]
    SinkWrite(#[source] std::io::Error),

    /// The body ended before the fragment's byte count was reached.
    #[error("short read: expected {expected} bytes, got {received}")]
    ShortRead { expected: u64, received: u64 },

    /// A ranged request at a non-zero offset did not come back as the requested range.
    #[error("server did not honor range request (HTTP {status})")]
    RangeNotHonored { status: u32 },

    /// A sequential sink received a write that does not continue the stream.
    #[error("out-of-order write: expected offset {expected}, got {got}")]
    OutOfOrderWrite { expected: u64, got: u64 },

    #[error("download cancelled")]
    Cancelled,

    /// Returned by operations attempted after an earlier failure was already reported.
    #[error("download aborted after an earlier failure")]
    Aborted,

    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("invalid download options: {0}")]
    InvalidOptions(String),
}

impl FetchError {
    /// Wrap any transport error as `FetchError::Network`.
    pub fn network<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FetchError::Network(Box::new(err))
    }

    /// Recover a `FetchError` that a body reader tunnelled through `std::io::Error`.
    /// Plain I/O errors from the body are transport failures.
    pub fn from_body_io(err: std::io::Error) -> Self {
        let is_wrapped = err
            .get_ref()
            .map(|inner| inner.is::<FetchError>())
            .unwrap_or(false);
        if is_wrapped {
            if let Some(inner) = err.into_inner() {
                if let Ok(fetch) = inner.downcast::<FetchError>() {
                    return *fetch;
                }
            }
            return FetchError::Aborted;
        }
        FetchError::network(err)
    }

    /// True when the error was caused by cancellation rather than a real failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

impl From<curl::Error> for FetchError {
    fn from(err: curl::Error) -> Self {
        FetchError::network(err)
    }
}

impl From<ProcessorError<FetchError>> for FetchError {
    fn from(err: ProcessorError<FetchError>) -> Self {
        match err {
            ProcessorError::Job(e) => e,
            ProcessorError::Aborted => FetchError::Aborted,
            ProcessorError::Panicked(msg) => FetchError::Panicked(msg),
            ProcessorError::Spawn(e) => FetchError::Spawn(e),
        }
    }
}
