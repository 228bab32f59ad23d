//! JSON Lines files
//!
//! Writers replace the whole file atomically. Readers are tolerant: blank
//! lines are skipped, and lines that fail to parse are counted rather than
//! aborting the read, so a file truncated mid-line still yields every
//! complete row before the tear.

use crate::storage::atomic::AtomicFile;
use crate::storage::traits::StorageResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

/// Rows read from a JSONL file plus the number of lines that were rejected
#[derive(Debug, Clone, PartialEq)]
pub struct JsonlRead<T> {
    pub rows: Vec<T>,
    pub parse_errors: usize,
}

impl<T> Default for JsonlRead<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            parse_errors: 0,
        }
    }
}

/// Writes one JSON document per line, atomically replacing `path`
///
/// # Returns
///
/// The number of rows written
pub fn write_jsonl<'a, T, I>(path: &Path, rows: I) -> StorageResult<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut staged = AtomicFile::create(path)?;
    let mut count = 0;
    {
        let mut writer = BufWriter::new(staged.file());
        for row in rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
            count += 1;
        }
        writer.flush()?;
    }
    staged.commit()?;
    Ok(count)
}

/// Appends rows to `path`, creating it (and its parents) if needed
///
/// Appends are not atomic; a crash can leave a torn last line, which the
/// readers below skip and count.
pub fn append_jsonl<'a, T, I>(path: &Path, rows: I) -> StorageResult<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    let mut count = 0;
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
        count += 1;
    }
    writer.flush()?;
    writer.get_ref().sync_data()?;
    Ok(count)
}

/// Calls `on_line` with every non-blank line; a missing file has no lines
fn for_each_line<F>(path: &Path, mut on_line: F) -> StorageResult<()>
where
    F: FnMut(&[u8]),
{
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for line in BufReader::new(file).split(b'\n') {
        let line = line?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        on_line(&line);
    }
    Ok(())
}

/// Reads typed rows, counting lines that are not valid rows
pub fn read_jsonl_with_errors<T: DeserializeOwned>(path: &Path) -> StorageResult<JsonlRead<T>> {
    let mut read = JsonlRead::default();
    for_each_line(path, |line| match serde_json::from_slice::<T>(line) {
        Ok(row) => read.rows.push(row),
        Err(_) => read.parse_errors += 1,
    })?;

    if read.parse_errors > 0 {
        tracing::warn!(
            "Skipped {} unparseable lines in {}",
            read.parse_errors,
            path.display()
        );
    }
    Ok(read)
}

/// Reads typed rows, skipping lines that are not valid rows
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> StorageResult<Vec<T>> {
    Ok(read_jsonl_with_errors(path)?.rows)
}

/// Counts JSON object rows and rejected lines without materializing rows
///
/// # Returns
///
/// `(rows, parse_errors)`. Valid JSON that is not an object counts as an
/// error.
pub fn count_jsonl_rows_with_errors(path: &Path) -> StorageResult<(usize, usize)> {
    let mut rows = 0;
    let mut errors = 0;
    for_each_line(path, |line| match serde_json::from_slice::<Value>(line) {
        Ok(Value::Object(_)) => rows += 1,
        _ => errors += 1,
    })?;
    Ok((rows, errors))
}
