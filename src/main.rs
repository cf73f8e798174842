//! CLI entry point for the archiver tool.

use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error};

use archiver_core::cli::{Args, Command};
use archiver_core::commands;
use archiver_core::downloader::DownloadConfig;
use archiver_core::exit;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let result = match args.command {
        Command::Get {
            url,
            output_dir,
            output_template,
        } => {
            let config = DownloadConfig {
                output_dir,
                output_template,
            };
            commands::run_get_command(&url, config).await
        }
        Command::Auth { platform, clear } => commands::run_auth_command(&platform, clear).await,
        Command::Platforms => {
            commands::run_platforms_command();
            Ok(exit::OK)
        }
    };

    match result {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(error) => {
            error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}
