use std::path::PathBuf;

use super::ByteSink;
use crate::error::FetchError;
use crate::storage::{self, StorageWriter, StorageWriterBuilder};

/// Positioned-write sink over a `.part` file, renamed into place on finish.
#[derive(Debug)]
pub struct FileSink {
    final_path: PathBuf,
    writer: Option<StorageWriter>,
}

impl FileSink {
    pub fn new(final_path: impl Into<PathBuf>) -> Self {
        Self {
            final_path: final_path.into(),
            writer: None,
        }
    }

    /// Create and preallocate the temp file on first use.
    fn open(&mut self, total: Option<u64>) -> Result<&StorageWriter, FetchError> {
        let writer = match self.writer.take() {
            Some(w) => w,
            None => {
                let temp = storage::temp_path(&self.final_path);
                let mut builder =
                    StorageWriterBuilder::create(&temp).map_err(FetchError::SinkWrite)?;
                if let Some(total) = total {
                    builder.preallocate(total).map_err(FetchError::SinkWrite)?;
                }
                builder.build()
            }
        };
        Ok(self.writer.insert(writer))
    }
}

impl ByteSink for FileSink {
    fn prepare(&mut self, total: Option<u64>) -> Result<(), FetchError> {
        self.open(total).map(|_| ())
    }

    fn write_fragment(&mut self, offset: u64, data: Vec<u8>) -> Result<(), FetchError> {
        self.open(None)?
            .write_at(offset, &data)
            .map_err(FetchError::SinkWrite)
    }

    fn finish(&mut self) -> Result<(), FetchError> {
        self.open(None)?;
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        writer.sync().map_err(FetchError::SinkWrite)?;
        writer
            .finalize(&self.final_path)
            .map_err(FetchError::SinkWrite)?;
        tracing::debug!(path = %self.final_path.display(), "file sink finalized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positioned_writes_land_at_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut sink = FileSink::new(&path);
        sink.prepare(Some(10)).unwrap();
        assert!(storage::temp_path(&path).exists());
        sink.write_fragment(0, b"01234".to_vec()).unwrap();
        sink.write_fragment(5, b"56789".to_vec()).unwrap();
        sink.finish().unwrap();
        assert!(!storage::temp_path(&path).exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"0123456789");
    }

    #[test]
    fn unknown_size_grows_with_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("open.bin");
        let mut sink = FileSink::new(&path);
        sink.prepare(None).unwrap();
        sink.write_fragment(0, b"streamed".to_vec()).unwrap();
        sink.finish().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"streamed");
    }

    #[test]
    fn empty_resource_still_produces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        let mut sink = FileSink::new(&path);
        sink.prepare(Some(0)).unwrap();
        sink.finish().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"");
    }

    #[test]
    fn unwritable_destination_is_sink_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("missing").join("out.bin"));
        assert!(matches!(sink.prepare(Some(4)), Err(FetchError::SinkWrite(_))));
    }
}
