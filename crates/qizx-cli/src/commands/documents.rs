//! Document and collection commands

use super::read_input;
use crate::error::{CliError, Result};
use colored::Colorize;
use qizx_api::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Write a document body, or a collection listing, to standard output
pub async fn get(client: &Client, path: &str, library: Option<&str>) -> Result<()> {
    let body = client.get(path, library).await?;
    let mut stdout = tokio::io::stdout();
    stdout.write_all(&body).await?;
    stdout.flush().await?;
    Ok(())
}

/// Upload one document from a file or from standard input
pub async fn put(
    client: &Client,
    src: &str,
    dst: &str,
    nonxml: bool,
    library: Option<&str>,
) -> Result<()> {
    let content = read_input(Some(Path::new(src))).await?;

    client
        .put(vec![(dst.to_string(), content)], !nonxml, library)
        .await?;
    println!("{} {}", "Stored".green(), dst);
    Ok(())
}

/// Upload files into `collection` with one request, keeping their file names
pub async fn mput(
    client: &Client,
    paths: &[PathBuf],
    collection: &str,
    nonxml: bool,
    library: Option<&str>,
) -> Result<()> {
    let mut batch = client.batch();
    let mut stored = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                CliError::invalid_argument(format!("'{}' does not name a file", path.display()))
            })?;
        let dst = format!("{}/{}", collection.trim_end_matches('/'), name);
        batch.add(dst.clone(), tokio::fs::read(path).await?);
        stored.push(dst);
    }

    batch.flush(!nonxml, library).await?;
    for dst in stored {
        println!("{} {}", "Stored".green(), dst);
    }
    Ok(())
}

pub async fn mkcol(client: &Client, path: &str, parents: bool, library: Option<&str>) -> Result<()> {
    let created = client.mkcol(path, parents, library).await?;
    println!("{} {}", "Created".green(), created);
    Ok(())
}

pub async fn move_member(client: &Client, src: &str, dst: &str, library: Option<&str>) -> Result<()> {
    let moved = client.move_member(src, dst, library).await?;
    println!("{} {}", "Moved to".green(), moved);
    Ok(())
}

pub async fn copy(client: &Client, src: &str, dst: &str, library: Option<&str>) -> Result<()> {
    let copied = client.copy(src, dst, library).await?;
    println!("{} {}", "Copied to".green(), copied);
    Ok(())
}

pub async fn delete(client: &Client, path: &str, library: Option<&str>) -> Result<()> {
    match client.delete(path, library).await? {
        Some(deleted) => println!("{} {}", "Deleted".green(), deleted),
        None => println!("{} {}", "Not found:".yellow(), path),
    }
    Ok(())
}
