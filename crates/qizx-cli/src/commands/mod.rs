//! CLI command implementations
//!
//! Bulk transfer lives in [`transfer`]; every other module wraps one group of
//! REST calls and prints the result.

pub mod admin;
pub mod documents;
pub mod properties;
pub mod query;
pub mod tasks;
pub mod transfer;

use crate::error::Result;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Contents of a local file, or of standard input when no file is given.
pub(crate) async fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => Ok(tokio::fs::read(path).await?),
        _ => {
            let mut buffer = Vec::new();
            tokio::io::stdin().read_to_end(&mut buffer).await?;
            Ok(buffer)
        },
    }
}

/// Print server listings as pretty JSON.
pub(crate) fn print_records(records: &[qizx_api::Record]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(records)?);
    Ok(())
}
