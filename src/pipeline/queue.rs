//! Queued delivery: callers hand entries to a bounded channel and a dedicated
//! writer thread performs the sink I/O.
//!
//! The queue is an optional layer; `LogRouter::write` stays synchronous.

use std::io;
use std::sync::Arc;
use std::thread;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::pipeline::entry::LogEntry;
use crate::pipeline::router::LogRouter;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("log queue is full")]
    Full,

    #[error("log writer has stopped")]
    Closed,
}

/// Counts reported by the writer thread when it exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub written: u64,
    pub failed: u64,
}

/// Submission side of the queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct QueuedWriter {
    tx: mpsc::Sender<LogEntry>,
}

impl QueuedWriter {
    /// Enqueue without waiting.
    pub fn try_submit(&self, entry: LogEntry) -> Result<(), QueueError> {
        self.tx.try_send(entry).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Enqueue, waiting for capacity.
    pub async fn submit(&self, entry: LogEntry) -> Result<(), QueueError> {
        self.tx.send(entry).await.map_err(|_| QueueError::Closed)
    }
}

/// Handle to the writer thread.
#[derive(Debug)]
pub struct QueueWorker {
    handle: thread::JoinHandle<WorkerStats>,
}

impl QueueWorker {
    /// Wait for the writer to drain the queue and exit.
    ///
    /// The writer exits once every `QueuedWriter` clone has been dropped.
    pub fn join(self) -> WorkerStats {
        match self.handle.join() {
            Ok(stats) => stats,
            Err(_) => {
                tracing::error!("log writer thread panicked");
                WorkerStats::default()
            }
        }
    }
}

/// Start a writer thread that delivers queued entries through `router`.
pub fn spawn(router: Arc<LogRouter>, capacity: usize) -> io::Result<(QueuedWriter, QueueWorker)> {
    let (tx, mut rx) = mpsc::channel::<LogEntry>(capacity.max(1));

    let handle = thread::Builder::new()
        .name("log-writer".to_string())
        .spawn(move || {
            let mut stats = WorkerStats::default();
            while let Some(entry) = rx.blocking_recv() {
                match router.write(&entry) {
                    Ok(()) => stats.written += 1,
                    Err(e) => {
                        tracing::warn!(error = %e, "queued write failed");
                        stats.failed += 1;
                    }
                }
            }
            tracing::debug!(written = stats.written, failed = stats.failed, "log writer stopped");
            stats
        })?;

    Ok((QueuedWriter { tx }, QueueWorker { handle }))
}
