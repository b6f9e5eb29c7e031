use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::ByteSink;
use crate::error::FetchError;

/// Sequential sink: appends each fragment to a `Write`.
///
/// Offsets must continue the stream exactly; anything else is
/// `OutOfOrderWrite`.
#[derive(Debug)]
pub struct StreamSink<W> {
    inner: W,
    position: u64,
}

impl StreamSink<BufWriter<File>> {
    /// Stream into a new file at `path` (truncating).
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write + Send> StreamSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes written so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Send> ByteSink for StreamSink<W> {
    fn write_fragment(&mut self, offset: u64, data: Vec<u8>) -> Result<(), FetchError> {
        if offset != self.position {
            return Err(FetchError::OutOfOrderWrite {
                expected: self.position,
                got: offset,
            });
        }
        self.inner.write_all(&data).map_err(FetchError::SinkWrite)?;
        self.position += data.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), FetchError> {
        self.inner.flush().map_err(FetchError::SinkWrite)
    }
}
