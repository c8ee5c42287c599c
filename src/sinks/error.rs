//! Sink failure taxonomy.

use std::fmt;
use std::io;

use thiserror::Error;

/// Broad class of a sink failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkErrorKind {
    IoFailure,
    PermissionDenied,
    TargetUnavailable,
}

impl fmt::Display for SinkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SinkErrorKind::IoFailure => "io failure",
            SinkErrorKind::PermissionDenied => "permission denied",
            SinkErrorKind::TargetUnavailable => "target unavailable",
        })
    }
}

/// A single sink failed to accept an entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("sink `{sink}` failed ({kind}): {message}")]
pub struct SinkError {
    pub kind: SinkErrorKind,
    pub sink: String,
    pub message: String,
}

impl SinkError {
    pub fn new(kind: SinkErrorKind, sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Classify a filesystem error.
    pub fn io(sink: &str, err: &io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::PermissionDenied => SinkErrorKind::PermissionDenied,
            _ => SinkErrorKind::IoFailure,
        };
        Self::new(kind, sink, err.to_string())
    }

    /// Classify an error from an external target such as a system log.
    pub fn target(sink: &str, err: &io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::PermissionDenied => SinkErrorKind::PermissionDenied,
            io::ErrorKind::NotFound
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::Unsupported => SinkErrorKind::TargetUnavailable,
            _ => SinkErrorKind::IoFailure,
        };
        Self::new(kind, sink, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(SinkError::io("flat", &denied).kind, SinkErrorKind::PermissionDenied);

        let missing = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(SinkError::io("flat", &missing).kind, SinkErrorKind::IoFailure);
        assert_eq!(
            SinkError::target("events", &missing).kind,
            SinkErrorKind::TargetUnavailable
        );
    }

    #[test]
    fn test_display() {
        let err = SinkError::new(SinkErrorKind::IoFailure, "flat", "disk full");
        assert_eq!(err.to_string(), "sink `flat` failed (io failure): disk full");
    }
}
