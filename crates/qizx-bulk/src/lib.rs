//! Bulk dump and restore of Qizx libraries
//!
//! Moves every document and property set of one or more libraries between a
//! Qizx server and a local archive (a directory tree or a tar stream):
//!
//! - **Enumeration**: collection walk on dump, archive listing on restore
//! - **Worker pool**: concurrent workers sharing one job queue
//! - **Archive writer**: single owner of a tar stream fed through a bounded queue
//! - **Controller**: state machine, shutdown accounting, exit status aggregation

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod archive;
pub mod controller;
pub mod enumerate;
pub mod error;
pub mod job;
pub mod status;
pub mod store;
pub mod worker;
pub mod writer;

pub use archive::{Archive, ArchiveMode, ArchiveTarget, Archiver, Compression};
pub use controller::{PipelineConfig, PipelineController, PipelineReport, PipelineState};
pub use error::{BulkError, Result};
pub use job::{ArchiveMessage, Job, JobKind, JobMessage, WriteRequest};
pub use status::ExitStatus;
pub use store::{QizxStore, QizxStoreFactory, RemoteStore, StoreFactory};
pub use worker::{Direction, WorkerProgress, WorkerReport};
pub use writer::WriterReport;
