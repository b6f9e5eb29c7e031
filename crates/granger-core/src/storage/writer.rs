use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(unix)]
use std::os::unix::fs::FileExt;

use super::with_path;

/// Offset writer over the temp file. Clones share the file; each
/// `write_at` is independent of any cursor.
#[derive(Debug, Clone)]
pub struct StorageWriter {
    file: Arc<File>,
    temp_path: PathBuf,
}

impl StorageWriter {
    pub(super) fn new(file: File, temp_path: PathBuf) -> Self {
        Self {
            file: Arc::new(file),
            temp_path,
        }
    }

    /// Write all of `data` at `offset`.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.file
            .write_all_at(data, offset)
            .map_err(|e| with_path(e, "write failed on", &self.temp_path))
    }

    /// Seek + write fallback. Not safe for concurrent use.
    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = self.file.try_clone()?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)
    }

    pub fn sync(&self) -> io::Result<()> {
        self.file
            .sync_all()
            .map_err(|e| with_path(e, "sync failed on", &self.temp_path))
    }

    /// Close the file and rename it to `final_path`. Same filesystem only.
    pub fn finalize(self, final_path: &Path) -> io::Result<()> {
        let Self { file, temp_path } = self;
        drop(file);
        std::fs::rename(&temp_path, final_path)
            .map_err(|e| with_path(e, "failed to rename temp file to", final_path))
    }
}
