//! Backups and other long-running server tasks, and running queries

use super::print_records;
use crate::error::{CliError, Result};
use colored::Colorize;
use qizx_api::Client;
use std::time::Duration;

/// Name under which the server lists backup tasks
const BACKUP_TASK: &str = "backup";

/// Start a backup and print its progress id, optionally waiting for it
pub async fn backup(
    client: &Client,
    directory: &str,
    library: &str,
    exclusive: bool,
    wait: bool,
) -> Result<()> {
    if exclusive {
        let running = client.listtasks(0).await?.iter().any(|task| {
            task.get("TaskName").and_then(|name| name.as_str()) == Some(BACKUP_TASK)
        });
        if running {
            return Err(CliError::unsuccessful("backup already running"));
        }
    }

    let id = client.backup(directory, library).await?;
    println!("{}", id);

    if wait {
        client.wait(&id, None, qizx_api::DEFAULT_POLL).await?;
        eprintln!("{}", "Backup complete".green());
    }
    Ok(())
}

pub async fn progress(client: &Client, id: &str) -> Result<()> {
    let progress = client.progress(id).await?;
    println!("{} {}", progress.task, progress.done);
    Ok(())
}

/// Wait for a task; fails when `max_wait` seconds pass first
pub async fn wait(client: &Client, id: &str, max_wait: Option<u64>, poll: u64) -> Result<()> {
    let complete = client
        .wait(id, max_wait.map(Duration::from_secs), Duration::from_secs(poll))
        .await?;
    if complete {
        Ok(())
    } else {
        Err(CliError::unsuccessful(format!("task {} did not complete in time", id)))
    }
}

pub async fn listtasks(client: &Client, timeline: u32) -> Result<()> {
    print_records(&client.listtasks(timeline).await?)
}

pub async fn listqueries(client: &Client) -> Result<()> {
    print_records(&client.listqueries().await?)
}

pub async fn cancelquery(client: &Client, id: &str) -> Result<()> {
    println!("{}", client.cancelquery(id).await?);
    Ok(())
}
