//! Archive containers
//!
//! An archiver persists named byte payloads. The set of containers is closed:
//!
//! - [`DirectoryArchiver`]: one file per entry, safe for concurrent writers
//! - [`TarArchiver`]: a single, optionally compressed, tar stream
//! - [`QueuedTarArchiver`]: write-only proxy forwarding to an archive writer task
//!
//! [`Archive`] selects one of them from an [`ArchiveTarget`] at startup.

mod directory;
mod queued;
mod tarball;

pub use self::directory::DirectoryArchiver;
pub use self::queued::QueuedTarArchiver;
pub use self::tarball::TarArchiver;

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

/// Whether an archive is being created or read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    Read,
    Write,
}

/// Compression applied to a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Bzip2,
}

/// Where an archive lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveTarget {
    Directory(PathBuf),
    Tar {
        path: PathBuf,
        compression: Compression,
    },
}

impl fmt::Display for ArchiveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveTarget::Directory(path) => write!(f, "directory {}", path.display()),
            ArchiveTarget::Tar { path, compression } => {
                write!(f, "tar {} ({:?})", path.display(), compression)
            },
        }
    }
}

/// Capability of a persistent container of named payloads.
#[async_trait]
pub trait Archiver: Send + Sync {
    async fn write(&self, name: &str, payload: Vec<u8>) -> Result<()>;

    async fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// All entry names, sorted.
    async fn list_entries(&self) -> Result<Vec<String>>;

    /// Flush and release the underlying resource.
    async fn close(&self) -> Result<()>;

    /// Whether several tasks may call [`Archiver::write`] at the same time.
    fn supports_concurrent_writes(&self) -> bool;
}

/// The archive variant selected for a run.
pub enum Archive {
    Directory(DirectoryArchiver),
    Tar(TarArchiver),
    QueuedTar(QueuedTarArchiver),
}

impl Archive {
    pub async fn open(target: &ArchiveTarget, mode: ArchiveMode) -> Result<Self> {
        match target {
            ArchiveTarget::Directory(root) => {
                Ok(Archive::Directory(DirectoryArchiver::open(root, mode).await?))
            },
            ArchiveTarget::Tar { path, compression } => Ok(Archive::Tar(
                TarArchiver::open(path.clone(), *compression, mode).await?,
            )),
        }
    }

    fn inner(&self) -> &dyn Archiver {
        match self {
            Archive::Directory(archiver) => archiver,
            Archive::Tar(archiver) => archiver,
            Archive::QueuedTar(archiver) => archiver,
        }
    }
}

#[async_trait]
impl Archiver for Archive {
    async fn write(&self, name: &str, payload: Vec<u8>) -> Result<()> {
        self.inner().write(name, payload).await
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.inner().read(name).await
    }

    async fn list_entries(&self) -> Result<Vec<String>> {
        self.inner().list_entries().await
    }

    async fn close(&self) -> Result<()> {
        self.inner().close().await
    }

    fn supports_concurrent_writes(&self) -> bool {
        self.inner().supports_concurrent_writes()
    }
}
