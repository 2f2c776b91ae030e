use super::{ArchiveMode, Archiver, Compression};
use crate::error::{BulkError, Result};
use async_trait::async_trait;
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tar::{Builder, Header};
use tracing::debug;

/// Output stream of a tar archive, with its compression layer.
enum TarSink {
    Plain(File),
    Gzip(GzEncoder<File>),
    Bzip2(BzEncoder<File>),
}

impl TarSink {
    fn create(path: &Path, compression: Compression) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(match compression {
            Compression::None => TarSink::Plain(file),
            Compression::Gzip => TarSink::Gzip(GzEncoder::new(file, flate2::Compression::default())),
            Compression::Bzip2 => {
                TarSink::Bzip2(BzEncoder::new(file, bzip2::Compression::default()))
            },
        })
    }

    /// Write the compression trailer and sync the file.
    fn finish(self) -> io::Result<()> {
        let file = match self {
            TarSink::Plain(file) => file,
            TarSink::Gzip(encoder) => encoder.finish()?,
            TarSink::Bzip2(encoder) => encoder.finish()?,
        };
        file.sync_all()
    }
}

impl Write for TarSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TarSink::Plain(file) => file.write(buf),
            TarSink::Gzip(encoder) => encoder.write(buf),
            TarSink::Bzip2(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TarSink::Plain(file) => file.flush(),
            TarSink::Gzip(encoder) => encoder.flush(),
            TarSink::Bzip2(encoder) => encoder.flush(),
        }
    }
}

/// Uncompressed copy of an archive with the data offset of every entry.
struct TarIndex {
    file: File,
    /// name -> (offset, size)
    entries: BTreeMap<String, (u64, u64)>,
}

impl TarIndex {
    fn load(path: &Path, compression: Compression) -> Result<Self> {
        let mut source = File::open(path)?;
        let mut file = tempfile::tempfile()?;
        match compression {
            Compression::None => io::copy(&mut source, &mut file)?,
            Compression::Gzip => io::copy(&mut GzDecoder::new(source), &mut file)?,
            Compression::Bzip2 => io::copy(&mut BzDecoder::new(source), &mut file)?,
        };
        file.seek(SeekFrom::Start(0))?;

        let mut entries = BTreeMap::new();
        {
            let mut archive = tar::Archive::new(&file);
            for entry in archive.entries()? {
                let entry = entry?;
                if !entry.header().entry_type().is_file() {
                    continue;
                }
                let name = entry.path()?.to_string_lossy().into_owned();
                entries.insert(name, (entry.raw_file_position(), entry.size()));
            }
        }

        debug!(archive = %path.display(), entries = entries.len(), "Indexed tar archive");
        Ok(Self { file, entries })
    }

    fn read(&mut self, name: &str) -> Result<Vec<u8>> {
        let (offset, size) = *self
            .entries
            .get(name)
            .ok_or_else(|| BulkError::EntryNotFound(name.to_string()))?;
        let size = usize::try_from(size).map_err(|e| BulkError::archive(e.to_string()))?;

        self.file.seek(SeekFrom::Start(offset))?;
        let mut payload = vec![0; size];
        self.file.read_exact(&mut payload)?;
        Ok(payload)
    }
}

enum TarState {
    Writing(Builder<TarSink>),
    Reading(TarIndex),
    Closed,
}

/// Tar stream archive. Writes must come from one task at a time.
pub struct TarArchiver {
    path: PathBuf,
    state: Arc<Mutex<TarState>>,
}

impl TarArchiver {
    pub async fn open(path: PathBuf, compression: Compression, mode: ArchiveMode) -> Result<Self> {
        let source = path.clone();
        let state = tokio::task::spawn_blocking(move || -> Result<TarState> {
            match mode {
                ArchiveMode::Write => {
                    let sink = TarSink::create(&source, compression)?;
                    Ok(TarState::Writing(Builder::new(sink)))
                },
                ArchiveMode::Read => Ok(TarState::Reading(TarIndex::load(&source, compression)?)),
            }
        })
        .await
        .map_err(|e| BulkError::archive(e.to_string()))??;

        Ok(Self {
            path,
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run blocking archive I/O against the locked state.
    async fn with_state<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut TarState) -> Result<T> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        tokio::task::spawn_blocking(move || {
            let mut guard = state
                .lock()
                .map_err(|_| BulkError::archive("tar archive lock poisoned"))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| BulkError::archive(e.to_string()))?
    }
}

#[async_trait]
impl Archiver for TarArchiver {
    async fn write(&self, name: &str, payload: Vec<u8>) -> Result<()> {
        let name = name.to_string();
        self.with_state(move |state| match state {
            TarState::Writing(builder) => {
                let mtime = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                let mut header = Header::new_gnu();
                header.set_size(payload.len() as u64);
                header.set_mode(0o644);
                header.set_mtime(mtime);
                builder.append_data(&mut header, &name, payload.as_slice())?;
                Ok(())
            },
            TarState::Reading(_) => Err(BulkError::archive("tar archive is open for reading")),
            TarState::Closed => Err(BulkError::archive("tar archive is closed")),
        })
        .await
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let name = name.to_string();
        self.with_state(move |state| match state {
            TarState::Reading(index) => index.read(&name),
            TarState::Writing(_) => Err(BulkError::archive("tar archive is open for writing")),
            TarState::Closed => Err(BulkError::archive("tar archive is closed")),
        })
        .await
    }

    async fn list_entries(&self) -> Result<Vec<String>> {
        self.with_state(|state| match state {
            TarState::Reading(index) => Ok(index.entries.keys().cloned().collect()),
            TarState::Writing(_) => Err(BulkError::archive("tar archive is open for writing")),
            TarState::Closed => Err(BulkError::archive("tar archive is closed")),
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        self.with_state(|state| {
            match std::mem::replace(state, TarState::Closed) {
                TarState::Writing(builder) => builder.into_inner()?.finish()?,
                TarState::Reading(_) | TarState::Closed => {},
            }
            Ok(())
        })
        .await?;
        debug!(archive = %self.path.display(), "Closed tar archive");
        Ok(())
    }

    fn supports_concurrent_writes(&self) -> bool {
        false
    }
}
