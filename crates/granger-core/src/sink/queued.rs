//! Sink backed by an asynchronous write queue.
//!
//! Writes are submitted as `(offset, bytes)` requests to a dedicated writer
//! thread through a bounded queue; each submission returns a `PendingWrite`
//! that resolves once the bytes are on the file.

use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

use super::ByteSink;
use crate::error::FetchError;
use crate::storage::{self, StorageWriter, StorageWriterBuilder};

/// When a fragment's queued writes are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMode {
    /// Wait for every page of a fragment before the write callback returns.
    #[default]
    AwaitEach,
    /// Keep the pending handles and check them all in `finish`.
    Deferred,
}

#[derive(Debug, Clone, Copy)]
pub struct QueueOptions {
    /// Largest single write request; fragments are split into pages of this size.
    pub page_size: usize,
    /// Requests buffered ahead of the writer thread.
    pub queue_depth: usize,
    pub mode: CompletionMode,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            page_size: 1024 * 1024,
            queue_depth: 5,
            mode: CompletionMode::AwaitEach,
        }
    }
}

struct WriteRequest {
    offset: u64,
    data: Vec<u8>,
    done: Sender<io::Result<()>>,
}

/// Handle for one submitted write.
#[derive(Debug)]
pub struct PendingWrite {
    rx: Receiver<io::Result<()>>,
}

impl PendingWrite {
    /// Block until the write completed.
    pub fn wait(self) -> io::Result<()> {
        match self.rx.recv() {
            Ok(result) => result,
            Err(_) => Err(backend_gone()),
        }
    }
}

fn backend_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "write backend stopped")
}

/// Writer thread servicing positioned writes in submission order.
#[derive(Debug)]
pub struct WriteBackend {
    tx: Option<SyncSender<WriteRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl WriteBackend {
    pub fn start(writer: StorageWriter, queue_depth: usize) -> io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel::<WriteRequest>(queue_depth.max(1));
        let worker = thread::Builder::new()
            .name("granger-write".to_string())
            .spawn(move || {
                for req in rx {
                    let result = writer.write_at(req.offset, &req.data);
                    if let Err(e) = &result {
                        tracing::debug!(offset = req.offset, error = %e, "queued write failed");
                    }
                    // Nobody waiting is fine in deferred mode after a failure.
                    let _ = req.done.send(result);
                }
            })?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    /// Queue `data` for writing at `offset`. Blocks while the queue is full.
    pub fn submit_write(&self, offset: u64, data: Vec<u8>) -> io::Result<PendingWrite> {
        let tx = self.tx.as_ref().ok_or_else(backend_gone)?;
        let (done, rx) = mpsc::channel();
        tx.send(WriteRequest { offset, data, done })
            .map_err(|_| backend_gone())?;
        Ok(PendingWrite { rx })
    }

    /// Drain the queue and stop the writer thread.
    pub fn shutdown(&mut self) -> io::Result<()> {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "write backend panicked"))?;
        }
        Ok(())
    }
}

impl Drop for WriteBackend {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Positioned-write sink over a `.part` file, fed through a `WriteBackend`.
#[derive(Debug)]
pub struct QueuedSink {
    final_path: PathBuf,
    options: QueueOptions,
    writer: Option<StorageWriter>,
    backend: Option<WriteBackend>,
    pending: Vec<PendingWrite>,
}

impl QueuedSink {
    pub fn new(final_path: impl Into<PathBuf>, options: QueueOptions) -> Self {
        Self {
            final_path: final_path.into(),
            options,
            writer: None,
            backend: None,
            pending: Vec::new(),
        }
    }

    fn open(&mut self, total: Option<u64>) -> io::Result<&WriteBackend> {
        let backend = match self.backend.take() {
            Some(b) => b,
            None => {
                let temp = storage::temp_path(&self.final_path);
                let mut builder = StorageWriterBuilder::create(&temp)?;
                if let Some(total) = total {
                    builder.preallocate(total)?;
                }
                let writer = builder.build();
                let backend = WriteBackend::start(writer.clone(), self.options.queue_depth)?;
                self.writer = Some(writer);
                backend
            }
        };
        Ok(self.backend.insert(backend))
    }

    fn wait_all(pending: Vec<PendingWrite>) -> io::Result<()> {
        // Wait for every handle; the first error is reported.
        let mut first_err = None;
        for p in pending {
            if let Err(e) = p.wait() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl ByteSink for QueuedSink {
    fn prepare(&mut self, total: Option<u64>) -> Result<(), FetchError> {
        self.open(total).map(|_| ()).map_err(FetchError::SinkWrite)
    }

    fn write_fragment(&mut self, offset: u64, data: Vec<u8>) -> Result<(), FetchError> {
        let page_size = self.options.page_size.max(1);
        let mode = self.options.mode;
        let backend = self.open(None).map_err(FetchError::SinkWrite)?;

        let mut handles = Vec::with_capacity(data.len().div_ceil(page_size));
        if data.len() <= page_size {
            handles.push(backend.submit_write(offset, data).map_err(FetchError::SinkWrite)?);
        } else {
            let mut page_offset = offset;
            for page in data.chunks(page_size) {
                handles.push(
                    backend
                        .submit_write(page_offset, page.to_vec())
                        .map_err(FetchError::SinkWrite)?,
                );
                page_offset += page.len() as u64;
            }
        }

        match mode {
            CompletionMode::AwaitEach => Self::wait_all(handles).map_err(FetchError::SinkWrite),
            CompletionMode::Deferred => {
                self.pending.extend(handles);
                Ok(())
            }
        }
    }

    fn finish(&mut self) -> Result<(), FetchError> {
        self.open(None).map_err(FetchError::SinkWrite)?;
        Self::wait_all(std::mem::take(&mut self.pending)).map_err(FetchError::SinkWrite)?;
        if let Some(mut backend) = self.backend.take() {
            backend.shutdown().map_err(FetchError::SinkWrite)?;
        }
        if let Some(writer) = self.writer.take() {
            writer.sync().map_err(FetchError::SinkWrite)?;
            writer
                .finalize(&self.final_path)
                .map_err(FetchError::SinkWrite)?;
        }
        tracing::debug!(path = %self.final_path.display(), "queued sink finalized");
        Ok(())
    }
}
