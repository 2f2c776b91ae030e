//! Job transfer and the pool worker loop

use crate::archive::Archiver;
use crate::error::Result;
use crate::job::{Job, JobKind, JobMessage, PropertySet};
use crate::status::ExitStatus;
use crate::store::{RemoteStore, StoreFactory};
use async_channel::Receiver;
use qizx_api::MemberKind;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Which way documents flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Database to archive
    Dump,
    /// Archive to database
    Restore,
}

/// Moves single jobs between one store connection and the archive.
#[derive(Clone)]
pub struct Transfer {
    direction: Direction,
    store: Arc<dyn RemoteStore>,
    archive: Arc<dyn Archiver>,
}

impl Transfer {
    pub fn new(direction: Direction, store: Arc<dyn RemoteStore>, archive: Arc<dyn Archiver>) -> Self {
        Self {
            direction,
            store,
            archive,
        }
    }

    pub async fn run(&self, job: &Job) -> Result<()> {
        match self.direction {
            Direction::Dump => self.dump(job).await,
            Direction::Restore => self.restore(job).await,
        }
    }

    async fn dump(&self, job: &Job) -> Result<()> {
        let payload = match job.kind {
            JobKind::Document | JobKind::NonXmlDocument => {
                self.store.get_document(&job.library, &job.path).await?
            },
            JobKind::Properties => {
                let set = PropertySet {
                    path: job.path.clone(),
                    properties: self.store.get_properties(&job.library, &job.path).await?,
                };
                serde_json::to_vec_pretty(&set)?
            },
        };
        self.archive.write(&job.entry, payload).await
    }

    async fn restore(&self, job: &Job) -> Result<()> {
        let payload = self.archive.read(&job.entry).await?;
        match job.kind {
            JobKind::Document => {
                self.store
                    .put_document(&job.library, &job.path, payload, MemberKind::Document)
                    .await
            },
            JobKind::NonXmlDocument => {
                self.store
                    .put_document(&job.library, &job.path, payload, MemberKind::NonXmlDocument)
                    .await
            },
            JobKind::Properties => {
                let set: PropertySet = serde_json::from_slice(&payload)?;
                if set.is_collection() && job.path != "/" {
                    self.store.create_collection(&job.library, &job.path).await?;
                }
                self.store
                    .put_properties(&job.library, &job.path, &set.writable())
                    .await
            },
        }
    }
}

/// Outcome of one worker, or of the controller running jobs itself.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker: usize,
    pub status: ExitStatus,
    /// Jobs transferred successfully
    pub processed: usize,
    /// Entries of jobs that failed
    pub failed: Vec<String>,
    pub shutdown_received: bool,
    pub finished_at: Instant,
}

impl WorkerReport {
    pub fn new(worker: usize) -> Self {
        Self {
            worker,
            status: ExitStatus::Success,
            processed: 0,
            failed: Vec::new(),
            shutdown_received: false,
            finished_at: Instant::now(),
        }
    }

    /// Record one job outcome; returns `false` when the worker must stop.
    pub fn record(&mut self, job: &Job, result: Result<()>) -> bool {
        match result {
            Ok(()) => {
                self.processed += 1;
                true
            },
            Err(e) if e.is_fatal() => {
                error!(worker = self.worker, entry = %job.entry, error = %e, "Fatal error, worker stopping");
                self.failed.push(job.entry.clone());
                self.status = self.status.worst(ExitStatus::Fatal);
                false
            },
            Err(e) => {
                warn!(
                    worker = self.worker,
                    library = %job.library,
                    path = %job.path,
                    error = %e,
                    "Transfer failed, skipping"
                );
                self.failed.push(job.entry.clone());
                self.status = self.status.worst(ExitStatus::DocumentFailed);
                true
            },
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Instant::now();
        self
    }
}

#[derive(Debug)]
struct Progress {
    report: WorkerReport,
    in_flight: Option<Job>,
}

/// Shared view of a worker's report, kept outside its task so that the
/// progress made before a crash is not lost with it.
#[derive(Debug, Clone)]
pub struct WorkerProgress {
    inner: Arc<Mutex<Progress>>,
}

impl WorkerProgress {
    pub fn new(worker: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Progress {
                report: WorkerReport::new(worker),
                in_flight: None,
            })),
        }
    }

    // A panicking job never holds the lock, so a poisoned state is still consistent.
    fn lock(&self) -> MutexGuard<'_, Progress> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, job: &Job) {
        self.lock().in_flight = Some(job.clone());
    }

    fn record(&self, job: &Job, result: Result<()>) -> bool {
        let mut progress = self.lock();
        progress.in_flight = None;
        progress.report.record(job, result)
    }

    fn update(&self, apply: impl FnOnce(&mut WorkerReport)) {
        apply(&mut self.lock().report);
    }

    /// Report as it stands now.
    pub fn snapshot(&self) -> WorkerReport {
        self.lock().report.clone()
    }

    /// Report of a worker whose task died: the job it was running counts as
    /// failed and the worker as fatal.
    pub fn crashed(&self) -> WorkerReport {
        let mut progress = self.lock();
        if let Some(job) = progress.in_flight.take() {
            error!(worker = progress.report.worker, entry = %job.entry, "Worker died while transferring");
            progress.report.failed.push(job.entry);
        }
        progress.report.status = ExitStatus::Fatal;
        progress.report.clone().finish()
    }
}

/// One member of the worker pool.
pub struct Worker {
    id: usize,
    direction: Direction,
    factory: Arc<dyn StoreFactory>,
    archive: Arc<dyn Archiver>,
    jobs: Receiver<JobMessage>,
    cancel: CancellationToken,
    progress: WorkerProgress,
}

impl Worker {
    pub fn new(
        id: usize,
        direction: Direction,
        factory: Arc<dyn StoreFactory>,
        archive: Arc<dyn Archiver>,
        jobs: Receiver<JobMessage>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            direction,
            factory,
            archive,
            jobs,
            cancel,
            progress: WorkerProgress::new(id),
        }
    }

    /// Handle for reading this worker's report after its task is gone.
    pub fn progress(&self) -> WorkerProgress {
        self.progress.clone()
    }

    /// Connect, then transfer jobs until shutdown, a closed queue, or cancellation.
    pub async fn run(self) -> WorkerReport {
        let store = match self.factory.connect().await {
            Ok(store) => store,
            Err(e) => {
                error!(worker = self.id, error = %e, "Couldn't create client, check config & url");
                self.progress.update(|report| report.status = ExitStatus::NoClient);
                return self.progress.snapshot().finish();
            },
        };
        let transfer = Transfer::new(self.direction, store, self.archive);

        loop {
            let message = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(worker = self.id, "Worker interrupted");
                    break;
                }
                message = self.jobs.recv() => message,
            };

            match message {
                Ok(JobMessage::Job(job)) => {
                    self.progress.begin(&job);
                    let result = transfer.run(&job).await;
                    if !self.progress.record(&job, result) {
                        break;
                    }
                },
                Ok(JobMessage::Shutdown) => {
                    self.progress.update(|report| report.shutdown_received = true);
                    break;
                },
                Err(_) => {
                    debug!(worker = self.id, "Job queue closed");
                    break;
                },
            }
        }

        let report = self.progress.snapshot();
        debug!(
            worker = self.id,
            processed = report.processed,
            failed = report.failed.len(),
            status = report.status.code(),
            "Worker finished"
        );
        report.finish()
    }
}
