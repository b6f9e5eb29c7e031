//! Positioned file output.
//!
//! Output goes to a `.part` file next to the destination: preallocated
//! (`posix_fallocate` on Unix, `set_len` otherwise), written with `pwrite`,
//! synced, then renamed over the final path.

mod builder;
mod writer;

use std::path::{Path, PathBuf};

pub use builder::StorageWriterBuilder;
pub use writer::StorageWriter;

/// Suffix of the in-progress file.
pub const TEMP_SUFFIX: &str = ".part";

/// `file.iso` -> `file.iso.part`.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Attach the path to an I/O error so sink failures say which file broke.
pub(crate) fn with_path(err: std::io::Error, what: &str, path: &Path) -> std::io::Error {
    std::io::Error::new(err.kind(), format!("{what} {}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_appends_part() {
        let p = temp_path(Path::new("file.iso"));
        assert_eq!(p.to_string_lossy(), "file.iso.part");
        let p2 = temp_path(Path::new("/tmp/archive.zip"));
        assert_eq!(p2.to_string_lossy(), "/tmp/archive.zip.part");
    }

    #[test]
    fn write_out_of_order_then_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("output.bin");
        let tp = temp_path(&final_path);

        let mut builder = StorageWriterBuilder::create(&tp).unwrap();
        builder.preallocate(12).unwrap();
        let writer = builder.build();

        writer.write_at(6, b"world!").unwrap();
        writer.write_at(0, b"hello ").unwrap();
        writer.sync().unwrap();
        writer.finalize(&final_path).unwrap();

        assert!(!tp.exists());
        assert_eq!(std::fs::read(&final_path).unwrap(), b"hello world!");
    }

    #[test]
    fn create_in_missing_directory_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let tp = dir.path().join("no-such-dir").join("x.part");
        let err = StorageWriterBuilder::create(&tp).err().unwrap();
        assert!(err.to_string().contains("x.part"));
    }
}
