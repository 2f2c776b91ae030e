//! `qizx eval` command implementation

use crate::error::{CliError, Result};
use crate::Format;
use qizx_api::{Client, Counting, EvalFormat, ItemsOptions};
use tokio::io::AsyncWriteExt;

/// Evaluation options as given on the command line
#[derive(Debug, Clone, Default)]
pub struct EvalArgs {
    pub profile: bool,
    pub maxtime: Option<u64>,
    pub counting: Option<Counting>,
    pub count: Option<u32>,
    pub first: Option<u32>,
}

impl EvalArgs {
    fn has_item_options(&self) -> bool {
        self.profile || self.counting.is_some() || self.count.is_some() || self.first.is_some()
    }
}

pub async fn eval(
    client: &Client,
    query: &str,
    format: Format,
    args: &EvalArgs,
    library: Option<&str>,
) -> Result<()> {
    let raw_format = match format {
        Format::Items => return eval_items(client, query, args, library).await,
        Format::Xml => EvalFormat::Xml,
        Format::Html => EvalFormat::Html,
        Format::Xhtml => EvalFormat::Xhtml,
    };

    if args.has_item_options() {
        return Err(CliError::invalid_argument(
            "item options (--profile, --counting, --count, --first) need --format items",
        ));
    }

    let body = client.eval(query, raw_format, args.maxtime, library).await?;
    let mut stdout = tokio::io::stdout();
    stdout.write_all(&body).await?;
    if !body.ends_with(b"\n") {
        stdout.write_all(b"\n").await?;
    }
    stdout.flush().await?;
    Ok(())
}

async fn eval_items(client: &Client, query: &str, args: &EvalArgs, library: Option<&str>) -> Result<()> {
    let options = ItemsOptions {
        profile: args.profile,
        counting: args.counting,
        count: args.count,
        first: args.first,
    };

    for item in client.eval_items(query, &options, args.maxtime, library).await? {
        println!("{}", item);
    }
    Ok(())
}
