//! Server and library administration commands

use super::{print_records, read_input};
use crate::error::{CliError, Result};
use colored::Colorize;
use qizx_api::{AclScope, Client, InfoLevel, ServerCommand};
use std::path::Path;

/// Show server information
pub async fn info(client: &Client) -> Result<()> {
    let info = client.info().await?;

    println!("{}", "Server Information:".cyan().bold());
    for (name, value) in &info {
        println!("  {}: {}", name, value);
    }
    Ok(())
}

pub async fn listlib(client: &Client) -> Result<()> {
    for library in client.listlib().await? {
        println!("{}", library);
    }
    Ok(())
}

pub async fn mklib(client: &Client, name: &str) -> Result<()> {
    client.mklib(name).await?;
    println!("{} {}", "Created library".green(), name);
    Ok(())
}

pub async fn dellib(client: &Client, name: &str) -> Result<()> {
    client.dellib(name).await?;
    println!("{} {}", "Deleted library".green(), name);
    Ok(())
}

/// Send a server command and print the resulting server status
pub async fn server(client: &Client, command: ServerCommand) -> Result<()> {
    println!("{}", client.server(command).await?);
    Ok(())
}

/// Start reindexing and print the task id
pub async fn reindex(client: &Client, library: Option<&str>) -> Result<()> {
    println!("{}", client.reindex(library).await?);
    Ok(())
}

/// Start optimization and print the task id
pub async fn optimize(client: &Client, library: Option<&str>) -> Result<()> {
    println!("{}", client.optimize(library).await?);
    Ok(())
}

pub async fn getindexing(client: &Client, library: Option<&str>) -> Result<()> {
    println!("{}", client.getindexing(library).await?);
    Ok(())
}

/// Replace the indexing definition with a file, or standard input
pub async fn setindexing(client: &Client, path: Option<&Path>, library: Option<&str>) -> Result<()> {
    let indexing = read_input(path).await?;
    client.setindexing(indexing, library).await?;
    println!("{}", "Indexing updated".green());
    Ok(())
}

pub async fn getacl(
    client: &Client,
    path: &str,
    scope: Option<AclScope>,
    library: Option<&str>,
) -> Result<()> {
    println!("{}", client.getacl(path, scope, library).await?);
    Ok(())
}

/// Apply an access control list from a file, or standard input
pub async fn setacl(client: &Client, path: Option<&Path>, library: Option<&str>) -> Result<()> {
    let acl = read_input(path).await?;
    let acl = String::from_utf8(acl)
        .map_err(|_| CliError::invalid_argument("access control list is not UTF-8"))?;
    client.setacl(&acl, library).await?;
    println!("{}", "Access control updated".green());
    Ok(())
}

pub async fn getconfig(client: &Client, level: Option<InfoLevel>) -> Result<()> {
    print_records(&client.getconfig(level).await?)
}

pub async fn changeconfig(client: &Client, name: &str, value: &str) -> Result<()> {
    if client.changeconfig(&[(name, value)]).await? {
        println!("{} {} = {}", "Changed".green(), name, value);
        Ok(())
    } else {
        Err(CliError::unsuccessful(format!("configuration property '{}' was not changed", name)))
    }
}

pub async fn getstats(client: &Client, level: InfoLevel) -> Result<()> {
    print_records(&client.getstats(level).await?)
}
