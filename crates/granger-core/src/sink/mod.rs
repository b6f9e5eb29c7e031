//! Output sinks receiving fragment bytes in offset order.
//!
//! The downloader only calls a sink from ordered callbacks, so
//! `write_fragment` sees strictly increasing, contiguous offsets.

mod file;
mod queued;
mod stream;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FetchError;

pub use file::FileSink;
pub use queued::{CompletionMode, PendingWrite, QueueOptions, QueuedSink, WriteBackend};
pub use stream::StreamSink;

/// Destination for downloaded bytes.
pub trait ByteSink: Send {
    /// Called once before any write. `total` is the resource size when known.
    fn prepare(&mut self, total: Option<u64>) -> Result<(), FetchError> {
        let _ = total;
        Ok(())
    }

    /// Write one fragment's bytes at `offset`.
    fn write_fragment(&mut self, offset: u64, data: Vec<u8>) -> Result<(), FetchError>;

    /// Flush and close after the last fragment. Not called after a failure.
    fn finish(&mut self) -> Result<(), FetchError> {
        Ok(())
    }
}

impl<S: ByteSink + ?Sized> ByteSink for Box<S> {
    fn prepare(&mut self, total: Option<u64>) -> Result<(), FetchError> {
        (**self).prepare(total)
    }

    fn write_fragment(&mut self, offset: u64, data: Vec<u8>) -> Result<(), FetchError> {
        (**self).write_fragment(offset, data)
    }

    fn finish(&mut self) -> Result<(), FetchError> {
        (**self).finish()
    }
}

/// Which sink `open_sink` builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Sequential writes straight to the destination.
    Stream,
    /// Positioned writes into a `.part` file, renamed on finish.
    #[default]
    File,
    /// Positioned writes through a background write queue.
    Queued,
}

/// Build a sink writing to `path`.
pub fn open_sink(
    kind: SinkKind,
    path: &Path,
    queue: QueueOptions,
) -> Result<Box<dyn ByteSink>, FetchError> {
    let sink: Box<dyn ByteSink> = match kind {
        SinkKind::Stream => Box::new(StreamSink::create(path).map_err(FetchError::SinkWrite)?),
        SinkKind::File => Box::new(FileSink::new(path)),
        SinkKind::Queued => Box::new(QueuedSink::new(path, queue)),
    };
    tracing::debug!(?kind, path = %path.display(), "opened sink");
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_writes_the_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        for kind in [SinkKind::Stream, SinkKind::File, SinkKind::Queued] {
            let path = dir.path().join(format!("{kind:?}.bin"));
            let mut sink = open_sink(kind, &path, QueueOptions::default()).unwrap();
            sink.prepare(Some(11)).unwrap();
            sink.write_fragment(0, b"hello ".to_vec()).unwrap();
            sink.write_fragment(6, b"world".to_vec()).unwrap();
            sink.finish().unwrap();
            assert_eq!(std::fs::read(&path).unwrap(), b"hello world", "{kind:?}");
        }
    }

    #[test]
    fn sink_kind_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            sink: SinkKind,
        }
        let w: Wrapper = toml::from_str("sink = \"queued\"").unwrap();
        assert_eq!(w.sink, SinkKind::Queued);
        assert_eq!(SinkKind::default(), SinkKind::File);
    }
}
