//! Pipeline controller
//!
//! Drives one dump or restore run through
//! `Init -> Enumerating -> Running -> Draining -> Closed`:
//!
//! - connects its own store (failure: status 100, straight to `Closed`)
//! - starts the worker pool, plus an archive writer when several workers
//!   dump into a stream that cannot take concurrent writes
//! - enumerates and queues jobs library by library
//! - sends one shutdown per worker, joins them, then shuts down the writer
//! - closes the archive exactly once and aggregates every status
//!
//! With `jobs == 1` the same jobs run inline through the same transfer code.
//! Restore runs twice through the pool: document bodies, then property sets.

use crate::archive::{Archive, Archiver, QueuedTarArchiver};
use crate::enumerate;
use crate::error::Result;
use crate::job::{ArchiveMessage, Job, JobMessage};
use crate::status::ExitStatus;
use crate::store::{RemoteStore, StoreFactory};
use crate::worker::{Direction, Transfer, Worker, WorkerProgress, WorkerReport};
use crate::writer::{ArchiveWriter, WriterReport};
use async_channel::{Receiver, Sender};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_JOBS: usize = 8;
pub const DEFAULT_ARCHIVE_QUEUE_CAPACITY: usize = 64;

/// Explicit settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Concurrency budget, archive writer included
    pub jobs: usize,
    /// Single library to transfer; all libraries when `None`
    pub library: Option<String>,
    /// Write requests buffered ahead of the archive writer
    pub archive_queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            jobs: DEFAULT_JOBS,
            library: None,
            archive_queue_capacity: DEFAULT_ARCHIVE_QUEUE_CAPACITY,
        }
    }
}

impl PipelineConfig {
    pub fn new(jobs: usize) -> Self {
        Self {
            jobs: jobs.max(1),
            ..Default::default()
        }
    }

    pub fn with_library(mut self, library: Option<String>) -> Self {
        self.library = library;
        self
    }

    pub fn with_archive_queue_capacity(mut self, capacity: usize) -> Self {
        self.archive_queue_capacity = capacity.max(1);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Enumerating,
    Running,
    Draining,
    Closed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Init => "init",
            PipelineState::Enumerating => "enumerating",
            PipelineState::Running => "running",
            PipelineState::Draining => "draining",
            PipelineState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Everything learned during a run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// Aggregated max-severity status
    pub status: ExitStatus,
    /// Libraries dumped, or restored into
    pub libraries: Vec<String>,
    pub jobs_queued: usize,
    pub shutdowns_sent: usize,
    pub workers: Vec<WorkerReport>,
    pub writer: Option<WriterReport>,
    /// Queued jobs no worker took before the pool stopped
    pub unprocessed: Vec<String>,
}

impl PipelineReport {
    pub fn processed(&self) -> usize {
        self.workers.iter().map(|w| w.processed).sum()
    }

    /// Entries of every failed job and failed archive write.
    pub fn failed(&self) -> Vec<&str> {
        self.workers
            .iter()
            .flat_map(|w| w.failed.iter())
            .chain(self.writer.iter().flat_map(|w| w.failed.iter()))
            .map(String::as_str)
            .collect()
    }

    fn child_statuses(&self) -> impl Iterator<Item = ExitStatus> + '_ {
        self.workers
            .iter()
            .map(|w| w.status)
            .chain(self.writer.iter().map(|w| w.status))
    }
}

/// How queued jobs get executed.
enum Dispatch {
    /// `jobs == 1`: the controller transfers each job as it is submitted
    Inline {
        transfer: Transfer,
        report: WorkerReport,
        stopped: bool,
    },
    Pool {
        sender: Sender<JobMessage>,
        receiver: Receiver<JobMessage>,
        handles: Vec<(WorkerProgress, JoinHandle<WorkerReport>)>,
    },
}

pub struct PipelineController {
    direction: Direction,
    config: PipelineConfig,
    factory: Arc<dyn StoreFactory>,
    archive: Arc<dyn Archiver>,
    cancel: CancellationToken,
    state: PipelineState,
}

impl PipelineController {
    pub fn new(
        direction: Direction,
        config: PipelineConfig,
        factory: Arc<dyn StoreFactory>,
        archive: Arc<dyn Archiver>,
    ) -> Self {
        Self {
            direction,
            config,
            factory,
            archive,
            cancel: CancellationToken::new(),
            state: PipelineState::Init,
        }
    }

    /// Use an externally controlled token, typically cancelled on Ctrl-C.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Whether writes must be funnelled through an archive writer task.
    pub fn needs_writer(&self) -> bool {
        self.direction == Direction::Dump
            && self.config.jobs > 1
            && !self.archive.supports_concurrent_writes()
    }

    /// Pool size; zero means jobs run inline in the controller.
    pub fn worker_count(&self) -> usize {
        match self.config.jobs {
            0 | 1 => 0,
            jobs if self.needs_writer() => jobs - 1,
            jobs => jobs,
        }
    }

    pub async fn run(mut self) -> PipelineReport {
        let mut report = PipelineReport::default();
        info!(
            direction = ?self.direction,
            jobs = self.config.jobs,
            workers = self.worker_count(),
            writer = self.needs_writer(),
            "Starting pipeline"
        );

        match self.factory.connect().await {
            Ok(store) => {
                self.transition(PipelineState::Enumerating);
                let result = match self.direction {
                    Direction::Dump => self.dump(&store, &mut report).await,
                    Direction::Restore => self.restore(&store, &mut report).await,
                };
                if let Err(e) = result {
                    error!(error = %e, "Aborting run");
                    report.status = report.status.worst(ExitStatus::Fatal);
                }
            },
            Err(e) => {
                error!(error = %e, "Couldn't create client, check config & url");
                report.status = ExitStatus::NoClient;
            },
        }

        if let Err(e) = self.archive.close().await {
            error!(error = %e, "Failed to close archive");
            report.status = report.status.worst(ExitStatus::Fatal);
        }
        self.transition(PipelineState::Closed);

        report.status = ExitStatus::aggregate(
            std::iter::once(report.status).chain(report.child_statuses()),
        );
        if self.cancel.is_cancelled() {
            warn!("Aborted on interrupt after waiting for workers to finish");
            report.status = report.status.worst(ExitStatus::Interrupted);
        }

        info!(
            status = report.status.code(),
            queued = report.jobs_queued,
            processed = report.processed(),
            failed = report.failed().len(),
            "Pipeline finished"
        );
        report
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "Pipeline state");
        self.state = next;
    }

    async fn dump(&mut self, store: &Arc<dyn RemoteStore>, report: &mut PipelineReport) -> Result<()> {
        let libraries =
            enumerate::select_libraries(store.as_ref(), self.config.library.as_deref()).await?;
        report.libraries = libraries.clone();

        let writer = self.needs_writer().then(|| {
            let (sender, receiver) = async_channel::bounded(self.config.archive_queue_capacity.max(1));
            let handle = tokio::spawn(ArchiveWriter::new(Arc::clone(&self.archive), receiver).run());
            (sender, handle)
        });
        let worker_archive: Arc<dyn Archiver> = match &writer {
            Some((sender, _)) => Arc::new(Archive::QueuedTar(QueuedTarArchiver::new(sender.clone()))),
            None => Arc::clone(&self.archive),
        };

        let mut dispatch = self.start(worker_archive, store);
        self.transition(PipelineState::Running);

        let mut result = Ok(());
        for library in &libraries {
            if self.cancel.is_cancelled() {
                break;
            }
            info!(library = %library, "Dumping library");
            match enumerate::dump_jobs(store.as_ref(), library).await {
                Ok(jobs) => self.submit_all(&mut dispatch, jobs, report).await,
                Err(e) => {
                    result = Err(e);
                    break;
                },
            }
        }

        self.transition(PipelineState::Draining);
        self.drain(dispatch, report).await;
        if let Some((sender, handle)) = writer {
            self.stop_writer(sender, handle, report).await;
        }
        result
    }

    async fn restore(
        &mut self,
        store: &Arc<dyn RemoteStore>,
        report: &mut PipelineReport,
    ) -> Result<()> {
        let plan =
            enumerate::restore_plan(self.archive.as_ref(), self.config.library.as_deref()).await?;
        enumerate::ensure_libraries(store.as_ref(), &plan.libraries).await?;
        report.libraries = plan.libraries.iter().map(|m| m.target.clone()).collect();
        info!(libraries = ?report.libraries, jobs = plan.job_count(), "Restoring archive");

        for (phase, jobs) in [("documents", plan.documents), ("properties", plan.properties)] {
            if self.cancel.is_cancelled() {
                break;
            }
            let mut dispatch = self.start(Arc::clone(&self.archive), store);
            self.transition(PipelineState::Running);
            debug!(phase, jobs = jobs.len(), "Restore phase");

            self.submit_all(&mut dispatch, jobs, report).await;

            self.transition(PipelineState::Draining);
            self.drain(dispatch, report).await;
        }
        Ok(())
    }

    fn start(&self, archive: Arc<dyn Archiver>, store: &Arc<dyn RemoteStore>) -> Dispatch {
        let workers = self.worker_count();
        if workers == 0 {
            return Dispatch::Inline {
                transfer: Transfer::new(self.direction, Arc::clone(store), archive),
                report: WorkerReport::new(0),
                stopped: false,
            };
        }

        let (sender, receiver) = async_channel::unbounded();
        let handles = (1..=workers)
            .map(|id| {
                let worker = Worker::new(
                    id,
                    self.direction,
                    Arc::clone(&self.factory),
                    Arc::clone(&archive),
                    receiver.clone(),
                    self.cancel.clone(),
                );
                (worker.progress(), tokio::spawn(worker.run()))
            })
            .collect();
        debug!(workers, "Started worker pool");

        Dispatch::Pool {
            sender,
            receiver,
            handles,
        }
    }

    async fn submit_all(&self, dispatch: &mut Dispatch, jobs: Vec<Job>, report: &mut PipelineReport) {
        for job in jobs {
            if self.cancel.is_cancelled() {
                break;
            }
            match dispatch {
                Dispatch::Inline {
                    transfer,
                    report: inline,
                    stopped,
                } => {
                    report.jobs_queued += 1;
                    if *stopped {
                        report.unprocessed.push(job.entry);
                        continue;
                    }
                    let result = transfer.run(&job).await;
                    *stopped = !inline.record(&job, result);
                },
                Dispatch::Pool { sender, .. } => {
                    // The controller holds a receiver, so the queue cannot close here.
                    if let Err(e) = sender.send(JobMessage::Job(job)).await {
                        if let JobMessage::Job(job) = e.into_inner() {
                            report.unprocessed.push(job.entry);
                        }
                        continue;
                    }
                    report.jobs_queued += 1;
                },
            }
        }
    }

    /// Shut down and join the pool, collecting every worker report.
    async fn drain(&self, dispatch: Dispatch, report: &mut PipelineReport) {
        match dispatch {
            Dispatch::Inline {
                report: inline, ..
            } => report.workers.push(inline.finish()),
            Dispatch::Pool {
                sender,
                receiver,
                handles,
            } => {
                if !self.cancel.is_cancelled() {
                    for _ in 0..handles.len() {
                        if sender.send(JobMessage::Shutdown).await.is_ok() {
                            report.shutdowns_sent += 1;
                        }
                    }
                }

                for (index, (progress, handle)) in handles.into_iter().enumerate() {
                    let worker = index + 1;
                    match handle.await {
                        Ok(worker_report) => {
                            if worker_report.status != ExitStatus::Success {
                                warn!(worker, status = %worker_report.status, "Worker finished with errors");
                            }
                            report.workers.push(worker_report);
                        },
                        Err(e) => {
                            error!(worker, error = %e, "Worker failed");
                            report.workers.push(progress.crashed());
                        },
                    }
                }

                while let Ok(message) = receiver.try_recv() {
                    if let JobMessage::Job(job) = message {
                        report.unprocessed.push(job.entry);
                    }
                }
                if !report.unprocessed.is_empty() {
                    warn!(count = report.unprocessed.len(), "Jobs left unprocessed");
                }
            },
        }
    }

    /// Called only after every worker has been joined.
    async fn stop_writer(
        &self,
        sender: Sender<ArchiveMessage>,
        handle: JoinHandle<WriterReport>,
        report: &mut PipelineReport,
    ) {
        if !self.cancel.is_cancelled() && sender.send(ArchiveMessage::Shutdown).await.is_ok() {
            report.shutdowns_sent += 1;
        }
        drop(sender);

        report.writer = Some(match handle.await {
            Ok(writer_report) => writer_report,
            Err(e) => {
                error!(error = %e, "Archive writer failed");
                WriterReport::fatal()
            },
        });
    }
}
