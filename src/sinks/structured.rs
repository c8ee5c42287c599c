//! Structured record file sink.
//!
//! Every entry becomes one self-contained record on its own line. The file as
//! a whole is a sequence of records, not a single XML document with a root
//! element; readers are expected to parse record by record.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::pipeline::entry::{LogEntry, Severity};
use crate::pipeline::formatter::{Formatter, JsonFormatter, XmlFormatter};
use crate::sinks::error::SinkError;
use crate::sinks::file::write_record;
use crate::sinks::LogSink;

/// Record encoding of a structured sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuredFormat {
    #[default]
    Xml,
    Json,
}

impl StructuredFormat {
    fn formatter(self) -> Box<dyn Formatter> {
        match self {
            StructuredFormat::Xml => Box::new(XmlFormatter),
            StructuredFormat::Json => Box::new(JsonFormatter),
        }
    }
}

#[derive(Debug)]
pub struct StructuredFileSink {
    name: String,
    path: PathBuf,
    formatter: Box<dyn Formatter>,
    min_severity: Option<Severity>,
    file: Mutex<Option<File>>,
}

impl StructuredFileSink {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, format: StructuredFormat) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            formatter: format.formatter(),
            min_severity: None,
            file: Mutex::new(None),
        }
    }

    pub fn with_min_severity(mut self, min: Option<Severity>) -> Self {
        self.min_severity = min;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for StructuredFileSink {
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
        let mut record = String::with_capacity(formatted.len() + 1);
        record.push_str(formatted.trim_end_matches('\n'));
        record.push('\n');

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        write_record(&mut file, &self.path, record.as_bytes())
            .map_err(|e| SinkError::io(&self.name, &e))
    }
}
