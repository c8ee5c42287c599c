//! Shared helpers for file-backed sinks.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Separator line written around each flat-file record by default.
pub const DEFAULT_SEPARATOR: &str = "----------------------------------------";

/// Open `path` for appending, creating missing parent directories.
pub fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Build one flat-file record: header line, body, footer line.
///
/// Empty separators are omitted. The body always ends with a newline.
pub fn frame_record(header: &str, body: &str, footer: &str) -> String {
    let mut record = String::with_capacity(header.len() + body.len() + footer.len() + 3);
    if !header.is_empty() {
        record.push_str(header);
        record.push('\n');
    }
    record.push_str(body);
    if !body.ends_with('\n') {
        record.push('\n');
    }
    if !footer.is_empty() {
        record.push_str(footer);
        record.push('\n');
    }
    record
}

/// Write a record with a single `write_all` and flush it.
///
/// On failure the handle is dropped so the next write reopens the file.
pub fn write_record(handle: &mut Option<File>, path: &Path, record: &[u8]) -> io::Result<()> {
    if handle.is_none() {
        *handle = Some(open_append(path)?);
    }
    let Some(file) = handle.as_mut() else {
        return Err(io::Error::other("file handle unavailable"));
    };

    let result = file.write_all(record).and_then(|()| file.flush());
    if result.is_err() {
        *handle = None;
    }
    result
}
