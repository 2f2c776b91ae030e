use super::Archiver;
use crate::error::{BulkError, Result};
use crate::job::{ArchiveMessage, WriteRequest};
use async_channel::Sender;
use async_trait::async_trait;

/// Write-only archiver that hands every write to the archive writer task.
///
/// Sending waits while the archive queue is full.
#[derive(Debug, Clone)]
pub struct QueuedTarArchiver {
    queue: Sender<ArchiveMessage>,
}

impl QueuedTarArchiver {
    pub fn new(queue: Sender<ArchiveMessage>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl Archiver for QueuedTarArchiver {
    async fn write(&self, name: &str, payload: Vec<u8>) -> Result<()> {
        let request = WriteRequest {
            name: name.to_string(),
            payload,
        };
        self.queue
            .send(ArchiveMessage::Write(request))
            .await
            .map_err(|_| BulkError::QueueClosed)
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        Err(BulkError::archive(format!(
            "cannot read {}: queued archive is write-only",
            name
        )))
    }

    async fn list_entries(&self) -> Result<Vec<String>> {
        Err(BulkError::archive("queued archive is write-only"))
    }

    /// The writer task owns the stream; shutting it down is the controller's job.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn supports_concurrent_writes(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forwards_write_requests() {
        let (tx, rx) = async_channel::bounded(4);
        let archive = QueuedTarArchiver::new(tx);
        archive.write("lib/documents/a.xml", b"<a/>".to_vec()).await.unwrap();

        match rx.recv().await.unwrap() {
            ArchiveMessage::Write(request) => {
                assert_eq!(request.name, "lib/documents/a.xml");
                assert_eq!(request.payload, b"<a/>");
            },
            ArchiveMessage::Shutdown => panic!("unexpected shutdown"),
        }
    }

    #[tokio::test]
    async fn test_closed_queue_is_reported() {
        let (tx, rx) = async_channel::bounded(1);
        drop(rx);
        let archive = QueuedTarArchiver::new(tx);
        assert!(matches!(
            archive.write("x", Vec::new()).await,
            Err(BulkError::QueueClosed)
        ));
    }
}
