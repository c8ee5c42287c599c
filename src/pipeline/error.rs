//! Router-level errors.

use thiserror::Error;

use crate::sinks::error::SinkError;

/// One or more sinks failed for a single write.
///
/// Every matching sink was still attempted; `delivered` counts the sinks that
/// accepted the entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{} sink(s) failed, {} delivered: {}", .failures.len(), .delivered, summarize(.failures))]
pub struct WriteError {
    pub failures: Vec<SinkError>,
    pub delivered: usize,
}

impl WriteError {
    /// Names of the sinks that failed, in attempt order.
    pub fn failed_sinks(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.sink.as_str()).collect()
    }
}

fn summarize(failures: &[SinkError]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.sink, f.kind))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised while assembling a router from sinks and categories.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("sink name used twice: {0}")]
    DuplicateSink(String),

    #[error("category `{category}` references unknown sink `{sink}`")]
    UnknownSink { category: String, sink: String },

    #[error("sink `{sink}` uses backend `{backend}`, which is not available on this platform")]
    UnsupportedBackend { sink: String, backend: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::error::SinkErrorKind;

    #[test]
    fn test_write_error_display() {
        let err = WriteError {
            failures: vec![
                SinkError::new(SinkErrorKind::IoFailure, "flat", "disk full"),
                SinkError::new(SinkErrorKind::TargetUnavailable, "events", "no log"),
            ],
            delivered: 2,
        };
        assert_eq!(
            err.to_string(),
            "2 sink(s) failed, 2 delivered: flat (io failure), events (target unavailable)"
        );
        assert_eq!(err.failed_sinks(), vec!["flat", "events"]);
    }
}
