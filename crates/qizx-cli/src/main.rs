//! Qizx CLI - Main entry point

use clap::Parser;
use qizx_api::Client;
use qizx_cli::commands::{admin, documents, properties, query, tasks, transfer};
use qizx_cli::{Cli, ClientCommand, Commands};
use qizx_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::error;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.debug {
        LogLevel::Debug
    } else if cli.verbose {
        LogLevel::Info
    } else {
        LogLevel::Warn
    };
    let log_config = LogConfig::builder()
        .level(level)
        .output(LogOutput::Console)
        .log_file_prefix("qizx")
        .http_trace(cli.debug)
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging
    let _ = init_logging(&log_config);

    let code = match &cli.command {
        Commands::Dump(args) => transfer::dump(&cli, args, interrupt_token()).await.code(),
        Commands::Restore(args) => transfer::restore(&cli, args, interrupt_token()).await.code(),
        Commands::Client(command) => match execute_command(&cli, command).await {
            Ok(()) => 0,
            Err(e) => {
                error!(error = %e, "Command failed");
                eprintln!("Error: {}", e);
                1
            },
        },
    };

    process::exit(code);
}

/// Token cancelled on the first Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Shutting down gracefully...");
            token.cancel();
        }
    });

    cancel
}

/// Execute a client command
async fn execute_command(cli: &Cli, command: &ClientCommand) -> qizx_cli::Result<()> {
    let client = Client::new(cli.connection()?)?;

    match command {
        ClientCommand::Info => admin::info(&client).await,

        ClientCommand::Eval {
            format,
            profile,
            maxtime,
            counting,
            count,
            first,
            library,
            query: expression,
        } => {
            let args = query::EvalArgs {
                profile: *profile,
                maxtime: *maxtime,
                counting: counting.map(Into::into),
                count: *count,
                first: *first,
            };
            query::eval(&client, expression, *format, &args, library.as_deref()).await
        },

        ClientCommand::Get { library, path } => documents::get(&client, path, library.as_deref()).await,

        ClientCommand::Put {
            nonxml,
            library,
            src,
            dst,
        } => documents::put(&client, src, dst, *nonxml, library.as_deref()).await,

        ClientCommand::Mkcol {
            parents,
            library,
            path,
        } => documents::mkcol(&client, path, *parents, library.as_deref()).await,

        ClientCommand::Move { library, src, dst } => {
            documents::move_member(&client, src, dst, library.as_deref()).await
        },

        ClientCommand::Copy { library, src, dst } => {
            documents::copy(&client, src, dst, library.as_deref()).await
        },

        ClientCommand::Delete { library, path } => {
            documents::delete(&client, path, library.as_deref()).await
        },

        ClientCommand::Getprop {
            depth,
            library,
            path,
            names,
        } => properties::getprop(&client, path, names, *depth, library.as_deref()).await,

        ClientCommand::Setprop {
            library,
            path,
            name,
            value,
            value_type,
        } => {
            properties::setprop(
                &client,
                path,
                name,
                value.as_deref(),
                value_type.as_deref(),
                library.as_deref(),
            )
            .await
        },

        ClientCommand::Listlib => admin::listlib(&client).await,

        ClientCommand::Mklib { name } => admin::mklib(&client, name).await,

        ClientCommand::Dellib { name } => admin::dellib(&client, name).await,

        ClientCommand::Server { command } => admin::server(&client, (*command).into()).await,

        ClientCommand::Reindex { library } => admin::reindex(&client, library.as_deref()).await,

        ClientCommand::Optimize { library } => admin::optimize(&client, library.as_deref()).await,

        ClientCommand::Mput {
            nonxml,
            library,
            collection,
            paths,
        } => documents::mput(&client, paths, collection, *nonxml, library.as_deref()).await,

        ClientCommand::Queryprop {
            path,
            library,
            query: expression,
            names,
        } => {
            properties::queryprop(&client, expression, names, path.as_deref(), library.as_deref())
                .await
        },

        ClientCommand::Backup {
            library,
            exclusive,
            wait,
            directory,
        } => tasks::backup(&client, directory, library, *exclusive, *wait).await,

        ClientCommand::Progress { id } => tasks::progress(&client, id).await,

        ClientCommand::Wait { id, max_wait, poll } => tasks::wait(&client, id, *max_wait, *poll).await,

        ClientCommand::Getindexing { library } => {
            admin::getindexing(&client, library.as_deref()).await
        },

        ClientCommand::Setindexing { library, path } => {
            admin::setindexing(&client, path.as_deref(), library.as_deref()).await
        },

        ClientCommand::Getacl {
            scope,
            library,
            path,
        } => admin::getacl(&client, path, scope.map(Into::into), library.as_deref()).await,

        ClientCommand::Setacl { library, path } => {
            admin::setacl(&client, path.as_deref(), library.as_deref()).await
        },

        ClientCommand::Getconfig { level } => admin::getconfig(&client, level.map(Into::into)).await,

        ClientCommand::Changeconfig { name, value } => admin::changeconfig(&client, name, value).await,

        ClientCommand::Getstats { level } => admin::getstats(&client, (*level).into()).await,

        ClientCommand::Listtasks { timeline } => tasks::listtasks(&client, *timeline).await,

        ClientCommand::Listqueries => tasks::listqueries(&client).await,

        ClientCommand::Cancelquery { id } => tasks::cancelquery(&client, id).await,
    }
}
