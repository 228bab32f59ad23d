//! Atomic file replacement
//!
//! Content is staged in a temp file in the destination directory and
//! renamed over the target, so readers see either the old or the new file.
//! A staged file that is never committed is removed on drop.

use crate::storage::traits::StorageResult;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A file staged next to its final location
pub struct AtomicFile {
    target: PathBuf,
    temp: NamedTempFile,
}

impl AtomicFile {
    /// Stages a new file for `path`, creating parent directories as needed
    pub fn create(path: &Path) -> StorageResult<Self> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let temp = NamedTempFile::new_in(&parent)?;
        Ok(Self {
            target: path.to_path_buf(),
            temp,
        })
    }

    pub fn file(&mut self) -> &mut File {
        self.temp.as_file_mut()
    }

    /// Flushes the staged content to disk and renames it over the target
    pub fn commit(self) -> StorageResult<()> {
        self.temp.as_file().sync_all()?;
        self.temp.persist(&self.target)?;
        Ok(())
    }
}

/// Writes `value` as pretty JSON, atomically replacing `path`
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    let mut staged = AtomicFile::create(path)?;
    {
        let mut writer = BufWriter::new(staged.file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    staged.commit()
}
