//! CLI entry point for the fetcher tool.

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use fetcher_core::download::{
    ClientSettings, DataResult, DownloadError, ErrorKind, FetchClient, StreamResult,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use cli::{Cli, Command};

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    Success = 0,
    /// The request ran and failed (transport, HTTP status, disk).
    Failure = 1,
    /// Refused before any request: URL policy, bad settings or missing name.
    Refused = 2,
}

impl From<ProcessExit> for ExitCode {
    fn from(code: ProcessExit) -> Self {
        ExitCode::from(code as u8)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?cli, "CLI arguments parsed");

    let settings = match build_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ProcessExit::Refused.into();
        }
    };

    let client = match FetchClient::open(settings) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {e}");
            return exit_for_error(&e).into();
        }
    };

    let outcome = run(&client, &cli).await;

    if let Err(e) = client.close() {
        warn!(error = %e, "failed to close client");
    }

    match outcome {
        Ok(code) => code.into(),
        Err(e) => {
            eprintln!("error: {e:#}");
            e.downcast_ref::<DownloadError>()
                .map_or(ProcessExit::Failure, exit_for_error)
                .into()
        }
    }
}

/// Defaults, then the config file, then command-line flags.
fn build_settings(cli: &Cli) -> Result<ClientSettings> {
    let mut settings = ClientSettings::default();
    if let Some(file_config) = app_config::load_config(cli.config.as_deref())? {
        file_config.validate()?;
        file_config.apply_to(&mut settings);
    }
    cli.client.apply_to(&mut settings);
    if let Command::Post {
        content_type: Some(content_type),
        ..
    } = &cli.command
    {
        settings.post_content_type = Some(content_type.clone());
    }
    settings.validate()?;
    Ok(settings)
}

async fn run(client: &FetchClient, cli: &Cli) -> Result<ProcessExit> {
    let trace_id = cli.client.trace_id.as_deref();
    match &cli.command {
        Command::Get { url } => {
            let result = client.get(url, trace_id).await?;
            write_data_result(&result)
        }
        Command::Post {
            url,
            data,
            data_file,
            ..
        } => {
            let body = match (data, data_file) {
                (Some(data), _) => data.clone().into_bytes(),
                (None, Some(path)) => tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read request body '{}'", path.display()))?,
                (None, None) => Vec::new(),
            };
            let result = client.post(url, body, trace_id).await?;
            write_data_result(&result)
        }
        Command::Download { url, output, name } => {
            let cancel = CancellationToken::new();
            let watcher = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, stopping download");
                    watcher.cancel();
                }
            });

            let result = match output {
                Some(destination) => {
                    client
                        .download_to_with_cancel(url, destination, trace_id, &cancel)
                        .await?
                }
                None => {
                    client
                        .download_with_cancel(url, name.as_deref(), trace_id, &cancel)
                        .await?
                }
            };
            Ok(report_stream_result(&result))
        }
    }
}

fn write_data_result(result: &DataResult) -> Result<ProcessExit> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(result.bytes())
        .context("Failed to write response body")?;
    stdout.flush().context("Failed to flush stdout")?;

    if result.is_success() {
        return Ok(ProcessExit::Success);
    }
    match &result.error {
        Some(e) => eprintln!("error: {e}"),
        None => eprintln!("error: request to {} failed", result.url),
    }
    Ok(ProcessExit::Failure)
}

fn report_stream_result(result: &StreamResult) -> ProcessExit {
    if result.is_success() {
        println!("{}", display_path(result.path()));
        return ProcessExit::Success;
    }
    match &result.error {
        Some(e) => eprintln!(
            "error: download of {} {:?}: {e} (partial file kept at {})",
            result.url,
            result.status,
            display_path(result.path())
        ),
        None => eprintln!(
            "error: download of {} {:?} (partial file kept at {})",
            result.url,
            result.status,
            display_path(result.path())
        ),
    }
    ProcessExit::Failure
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

fn exit_for_error(error: &DownloadError) -> ProcessExit {
    match error {
        DownloadError::Config(_) | DownloadError::FileNameRequired { .. } => ProcessExit::Refused,
        e if e.kind() == ErrorKind::PolicyViolation => ProcessExit::Refused,
        _ => ProcessExit::Failure,
    }
}
