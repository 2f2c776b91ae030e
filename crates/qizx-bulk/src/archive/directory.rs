use super::{ArchiveMode, Archiver};
use crate::error::{BulkError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// Directory-of-files archive: entry `a/b/c` is the file `<root>/a/b/c`.
#[derive(Debug, Clone)]
pub struct DirectoryArchiver {
    root: PathBuf,
}

impl DirectoryArchiver {
    pub async fn open(root: impl Into<PathBuf>, mode: ArchiveMode) -> Result<Self> {
        let root = root.into();
        match mode {
            ArchiveMode::Write => fs::create_dir_all(&root).await?,
            ArchiveMode::Read => {
                if !fs::metadata(&root).await.map(|m| m.is_dir()).unwrap_or(false) {
                    return Err(BulkError::archive(format!(
                        "{} is not a directory",
                        root.display()
                    )));
                }
            },
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let safe = !name.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(BulkError::InvalidEntry(name.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Archiver for DirectoryArchiver {
    async fn write(&self, name: &str, payload: Vec<u8>) -> Result<()> {
        let path = self.entry_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, payload).await?;
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.entry_path(name)?;
        match fs::read(&path).await {
            Ok(payload) => Ok(payload),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BulkError::EntryNotFound(name.to_string()))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn list_entries(&self) -> Result<Vec<String>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let mut entries = Vec::new();
            for entry in WalkDir::new(&root).min_depth(1) {
                let entry = entry.map_err(|e| BulkError::archive(e.to_string()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(&root)
                    .map_err(|e| BulkError::archive(e.to_string()))?;
                let name: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                entries.push(name.join("/"));
            }
            entries.sort();
            Ok(entries)
        })
        .await
        .map_err(|e| BulkError::archive(e.to_string()))?
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn supports_concurrent_writes(&self) -> bool {
        true
    }
}
