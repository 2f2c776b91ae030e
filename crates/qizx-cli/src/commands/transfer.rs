//! `qizx dump` and `qizx restore` command implementation
//!
//! Both commands return the aggregated pipeline status instead of an error,
//! because the status is the process exit code.

use crate::{Cli, TransferArgs};
use colored::Colorize;
use qizx_bulk::{
    Archive, ArchiveMode, Direction, ExitStatus, PipelineConfig, PipelineController,
    PipelineReport, QizxStoreFactory,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Dump libraries into the archive
pub async fn dump(cli: &Cli, args: &TransferArgs, cancel: CancellationToken) -> ExitStatus {
    run(Direction::Dump, cli, args, cancel).await
}

/// Restore libraries from the archive
pub async fn restore(cli: &Cli, args: &TransferArgs, cancel: CancellationToken) -> ExitStatus {
    run(Direction::Restore, cli, args, cancel).await
}

async fn run(
    direction: Direction,
    cli: &Cli,
    args: &TransferArgs,
    cancel: CancellationToken,
) -> ExitStatus {
    let connection = match cli.connection() {
        Ok(connection) => connection,
        Err(e) => {
            error!(url = %cli.url, error = %e, "Couldn't create client, check config & url");
            eprintln!("{} {}", "Error:".red().bold(), e);
            return ExitStatus::NoClient;
        },
    };

    let target = args.target();
    let mode = match direction {
        Direction::Dump => ArchiveMode::Write,
        Direction::Restore => ArchiveMode::Read,
    };
    let archive = match Archive::open(&target, mode).await {
        Ok(archive) => archive,
        Err(e) => {
            error!(archive = %target, error = %e, "Couldn't open archive");
            eprintln!("{} {}", "Error:".red().bold(), e);
            return ExitStatus::Fatal;
        },
    };

    let config = PipelineConfig::new(args.jobs).with_library(args.library.clone());
    let report = PipelineController::new(
        direction,
        config,
        Arc::new(QizxStoreFactory::new(connection)),
        Arc::new(archive),
    )
    .with_cancellation(cancel)
    .run()
    .await;

    print_summary(direction, &report);
    report.status
}

fn print_summary(direction: Direction, report: &PipelineReport) {
    let verb = match direction {
        Direction::Dump => "Dumped",
        Direction::Restore => "Restored",
    };

    if report.libraries.is_empty() {
        eprintln!("{} no libraries transferred", verb.cyan().bold());
    } else {
        eprintln!(
            "{} {} of {} entries ({})",
            verb.cyan().bold(),
            report.processed(),
            report.jobs_queued,
            report.libraries.join(", ")
        );
    }

    let failed = report.failed();
    if !failed.is_empty() {
        eprintln!("{} {} entries failed:", "Warning:".yellow().bold(), failed.len());
        for entry in failed {
            eprintln!("  {}", entry);
        }
    }

    if !report.unprocessed.is_empty() {
        eprintln!(
            "{} {} entries were not processed",
            "Warning:".yellow().bold(),
            report.unprocessed.len()
        );
    }

    match report.status {
        ExitStatus::Success => {},
        ExitStatus::Interrupted => eprintln!("{}", "Interrupted".red().bold()),
        status => eprintln!("{} {}", "Finished with status".red().bold(), status),
    }
}
