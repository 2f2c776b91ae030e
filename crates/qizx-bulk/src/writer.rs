//! Single archive writer
//!
//! When several workers dump into a stream that cannot take concurrent
//! writes, all writes funnel through one task that owns the archive.

use crate::archive::Archiver;
use crate::job::ArchiveMessage;
use crate::status::ExitStatus;
use async_channel::Receiver;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct WriterReport {
    pub status: ExitStatus,
    pub writes: usize,
    /// Entries that could not be written
    pub failed: Vec<String>,
    pub shutdown_received: bool,
    /// When the shutdown message was taken off the queue
    pub shutdown_at: Option<Instant>,
}

impl WriterReport {
    pub fn new() -> Self {
        Self {
            status: ExitStatus::Success,
            writes: 0,
            failed: Vec::new(),
            shutdown_received: false,
            shutdown_at: None,
        }
    }

    /// Report for a writer that died without reporting.
    pub fn fatal() -> Self {
        Self {
            status: ExitStatus::Fatal,
            ..Self::new()
        }
    }
}

impl Default for WriterReport {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ArchiveWriter {
    archive: Arc<dyn Archiver>,
    queue: Receiver<ArchiveMessage>,
}

impl ArchiveWriter {
    pub fn new(archive: Arc<dyn Archiver>, queue: Receiver<ArchiveMessage>) -> Self {
        Self { archive, queue }
    }

    /// Write requests in queue order until shutdown or until every sender is gone.
    pub async fn run(self) -> WriterReport {
        let mut report = WriterReport::new();

        loop {
            match self.queue.recv().await {
                Ok(ArchiveMessage::Write(request)) => {
                    match self.archive.write(&request.name, request.payload).await {
                        Ok(()) => report.writes += 1,
                        Err(e) => {
                            error!(entry = %request.name, error = %e, "Archive write failed");
                            report.failed.push(request.name);
                            report.status = report.status.worst(ExitStatus::DocumentFailed);
                        },
                    }
                },
                Ok(ArchiveMessage::Shutdown) => {
                    report.shutdown_received = true;
                    report.shutdown_at = Some(Instant::now());
                    break;
                },
                Err(_) => {
                    debug!("Archive queue closed");
                    break;
                },
            }
        }

        debug!(writes = report.writes, status = report.status.code(), "Archive writer finished");
        report
    }
}
