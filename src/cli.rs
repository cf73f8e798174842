//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::downloader::DEFAULT_OUTPUT_TEMPLATE;

/// Archive media from video platforms.
///
/// The fetch itself is delegated to yt-dlp; archiver supplies it with
/// working login sessions by walking browser cookie sources and, when the
/// direct cookie-database read fails, exporting cookies from inside a
/// running browser over the DevTools protocol.
#[derive(Parser, Debug)]
#[command(name = "archiver")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download a single URL, handling platform authentication
    Get {
        /// The video or page URL to fetch
        url: String,

        /// Directory to place the downloaded file in
        #[arg(short = 'P', long = "paths")]
        output_dir: Option<PathBuf>,

        /// Output filename template passed to the downloader
        #[arg(long, default_value = DEFAULT_OUTPUT_TEMPLATE)]
        output_template: String,
    },
    /// Log in to a platform in a managed browser window and cache the session
    Auth {
        /// Platform id (see `archiver platforms`)
        platform: String,

        /// Remove the cached session instead of logging in
        #[arg(long)]
        clear: bool,
    },
    /// List supported platforms
    Platforms,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_get_parses_url_and_defaults() {
        let args = Args::try_parse_from(["archiver", "get", "https://youtu.be/x"]).unwrap();
        match args.command {
            Command::Get {
                url,
                output_dir,
                output_template,
            } => {
                assert_eq!(url, "https://youtu.be/x");
                assert!(output_dir.is_none());
                assert_eq!(output_template, DEFAULT_OUTPUT_TEMPLATE);
            }
            other => panic!("expected get, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_get_accepts_output_dir() {
        let args =
            Args::try_parse_from(["archiver", "get", "-P", "/tmp/media", "https://youtu.be/x"])
                .unwrap();
        match args.command {
            Command::Get { output_dir, .. } => {
                assert_eq!(output_dir.unwrap(), PathBuf::from("/tmp/media"));
            }
            other => panic!("expected get, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_auth_parses_platform_and_clear_flag() {
        let args = Args::try_parse_from(["archiver", "auth", "youtube", "--clear"]).unwrap();
        match args.command {
            Command::Auth { platform, clear } => {
                assert_eq!(platform, "youtube");
                assert!(clear);
            }
            other => panic!("expected auth, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_verbose_flag_is_counted_and_global() {
        let args = Args::try_parse_from(["archiver", "platforms", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_requires_a_subcommand() {
        let result = Args::try_parse_from(["archiver"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["archiver", "--help"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
