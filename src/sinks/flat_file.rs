//! Append-only text file sink.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::pipeline::entry::{LogEntry, Severity};
use crate::pipeline::formatter::Formatter;
use crate::sinks::error::SinkError;
use crate::sinks::file::{frame_record, write_record};
use crate::sinks::LogSink;

/// Appends each formatted entry, framed by header and footer lines, to a fixed path.
#[derive(Debug)]
pub struct FlatFileSink {
    name: String,
    path: PathBuf,
    header: String,
    footer: String,
    formatter: Box<dyn Formatter>,
    min_severity: Option<Severity>,
    file: Mutex<Option<File>>,
}

impl FlatFileSink {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        header: impl Into<String>,
        footer: impl Into<String>,
        formatter: Box<dyn Formatter>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            header: header.into(),
            footer: footer.into(),
            formatter,
            min_severity: None,
            file: Mutex::new(None),
        }
    }

    /// Only emit entries at or above `min`.
    pub fn with_min_severity(mut self, min: Option<Severity>) -> Self {
        self.min_severity = min;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FlatFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_severity(&self) -> Option<Severity> {
        self.min_severity
    }

    fn format(&self, entry: &LogEntry) -> String {
        self.formatter.format(entry)
    }

    fn emit(&self, formatted: &str, _entry: &LogEntry) -> Result<(), SinkError> {
        let record = frame_record(&self.header, formatted, &self.footer);
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        write_record(&mut file, &self.path, record.as_bytes())
            .map_err(|e| SinkError::io(&self.name, &e))
    }
}
