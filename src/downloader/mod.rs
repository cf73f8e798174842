//! External downloader boundary: locating yt-dlp, building its argument
//! list, running it, and classifying its failures.
//!
//! The downloader is the only component that talks to the media sites; this
//! module never interprets media, it only decides whether a failed run was
//! an authentication problem (retry with another credential source) or a
//! terminal failure.

mod attempts;

pub use attempts::DownloadAttempt;

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::auth::{AttemptOutcome, AuthSource};
use crate::platform::Platform;

/// Explicit path to the yt-dlp executable, bypassing the PATH search.
pub const YTDLP_PATH_ENV: &str = "ARCHIVER_YTDLP_PATH";
/// Browser profile name appended to the cookies-from-browser flag.
pub const BROWSER_PROFILE_ENV: &str = "ARCHIVER_BROWSER_PROFILE";

pub const DEFAULT_OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Errors locating or running the external downloader.
#[derive(Debug, Error)]
pub enum DownloaderError {
    /// yt-dlp is not installed or not reachable.
    #[error("yt-dlp not found; install it or set {YTDLP_PATH_ENV} to the executable")]
    NotFound,
    /// Spawning or waiting on the process failed.
    #[error("failed to run the downloader: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to a located yt-dlp executable.
#[derive(Debug, Clone)]
pub struct Downloader {
    path: PathBuf,
}

impl Downloader {
    /// Locates yt-dlp via `ARCHIVER_YTDLP_PATH` or the PATH.
    ///
    /// # Errors
    ///
    /// Returns [`DownloaderError::NotFound`] when no executable is found.
    pub fn locate() -> Result<Self, DownloaderError> {
        if let Some(value) = env::var_os(YTDLP_PATH_ENV) {
            let path = PathBuf::from(value);
            if path.is_file() {
                return Ok(Self { path });
            }
            return Err(DownloaderError::NotFound);
        }
        find_in_path("yt-dlp")
            .map(|path| Self { path })
            .ok_or(DownloaderError::NotFound)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_env = env::var_os("PATH")?;
    env::split_paths(&path_env)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Download options shared by every attempt of one `get` run.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Directory the downloader places finished files in.
    pub output_dir: Option<PathBuf>,
    /// yt-dlp output filename template.
    pub output_template: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            output_template: DEFAULT_OUTPUT_TEMPLATE.to_string(),
        }
    }
}

/// Arguments common to every attempt (output placement).
#[must_use]
pub fn base_args(config: &DownloadConfig) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(dir) = &config.output_dir {
        args.push("--paths".to_string());
        args.push(dir.display().to_string());
    }
    let template = if config.output_template.trim().is_empty() {
        DEFAULT_OUTPUT_TEMPLATE
    } else {
        config.output_template.as_str()
    };
    args.push("--output".to_string());
    args.push(template.to_string());
    args
}

/// `--cookies FILE`: read (and dump back) a Netscape jar.
#[must_use]
pub fn cookie_file_args(path: &Path) -> [String; 2] {
    ["--cookies".to_string(), path.display().to_string()]
}

/// `--cookies-from-browser BROWSER[:PROFILE]`: read a browser's own store.
#[must_use]
pub fn browser_args(source: AuthSource) -> [String; 2] {
    let AuthSource::Browser(id) = source;
    let mut selector = id.as_str().to_string();
    if let Ok(profile) = env::var(BROWSER_PROFILE_ENV) {
        let profile = profile.trim();
        if !profile.is_empty() {
            selector.push(':');
            selector.push_str(profile);
        }
    }
    ["--cookies-from-browser".to_string(), selector]
}

/// Runs the downloader, passing its stdout through and capturing stderr for
/// classification (it is also echoed so the operator sees progress/errors).
///
/// # Errors
///
/// Returns [`DownloaderError::Io`] when the process cannot be spawned or
/// waited on.
pub async fn run(
    downloader: &Downloader,
    args: &[String],
    url: &str,
) -> Result<(i32, String), DownloaderError> {
    let mut command = Command::new(downloader.path());
    command
        .args(args)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped());
    debug!(program = %downloader.path().display(), ?args, url, "invoking downloader");

    let mut child = command.spawn()?;
    let mut captured = String::new();
    if let Some(stderr) = child.stderr.take() {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            eprintln!("{line}");
            captured.push_str(&line);
            captured.push('\n');
        }
    }
    let status = child.wait().await?;
    Ok((status.code().unwrap_or(-1), captured))
}

/// Classifies a finished downloader run into an attempt outcome, logging
/// one actionable guidance message per recognized failure mode.
///
/// Matching is on stderr substrings: yt-dlp reports cookie-store and login
/// problems as text, not exit codes.
#[must_use]
pub fn classify_output(exit_code: i32, stderr: &str, platform: &Platform) -> AttemptOutcome {
    if exit_code == 0 {
        return AttemptOutcome::Success;
    }
    let lower = stderr.to_ascii_lowercase();
    let auth_cmd = format!("archiver auth {}", platform.id);

    if lower.contains("could not copy") && lower.contains("cookie database") {
        warn!(
            "the browser is holding its cookie database; close it fully (background processes \
             included) and retry, switch browsers, or run `{auth_cmd}` to export over CDP"
        );
        return AttemptOutcome::CookieProblem;
    }
    if lower.contains("failed to decrypt with dpapi") {
        warn!("browser cookie decryption failed; switch to firefox or run `{auth_cmd}`");
        return AttemptOutcome::CookieProblem;
    }
    // Chrome's app-bound cookie encryption intentionally defeats third-party
    // decryption; even admin rights may not help.
    if lower.contains("app-bound") && lower.contains("cookie") && lower.contains("encrypt") {
        warn!(
            "chrome app-bound cookie encryption blocks direct decryption; run `{auth_cmd}` \
             (CDP export) or use firefox/edge credentials"
        );
        return AttemptOutcome::CookieProblem;
    }
    if lower.contains("permission denied") && lower.contains("cookies") {
        warn!("reading the browser cookie store was denied; check browser processes and file permissions");
        return AttemptOutcome::CookieProblem;
    }
    if lower.contains("cannot decrypt v11 cookies: no key found") {
        warn!(
            "browser cookie decryption failed (keyring unavailable); run from a desktop session, \
             use firefox, or run `{auth_cmd}`"
        );
        return AttemptOutcome::CookieProblem;
    }
    if lower.contains("sign in to confirm you're not a bot")
        || lower.contains("sign in to confirm you\u{2019}re not a bot")
    {
        warn!(
            "{} wants a logged-in session; log in in a browser and retry, or run `{auth_cmd}`",
            platform.name
        );
        return AttemptOutcome::AuthRequired;
    }
    if lower.contains("sign in to confirm your age")
        || (lower.contains("inappropriate for some users") && lower.contains("sign in"))
    {
        warn!(
            "{} wants a logged-in, age-verified session; confirm once in a browser, or run \
             `{auth_cmd}` and confirm in the managed window",
            platform.name
        );
        return AttemptOutcome::AuthRequired;
    }
    // Generic "cookies suggested" detection for other extractors; sites
    // phrase it like "you have to login ... Use --cookies-from-browser or
    // --cookies for the authentication".
    if (lower.contains("use --cookies-from-browser") || lower.contains("use --cookies"))
        && [
            "login",
            "sign in",
            "premium member",
            "members only",
            "members-only",
            "authentication",
        ]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        warn!(
            "{} requires a logged-in account with access to this video; log in and retry, or \
             run `{auth_cmd}`",
            platform.name
        );
        return AttemptOutcome::AuthRequired;
    }
    if lower.contains("cookies file") && lower.contains("netscape") {
        warn!("the cookie jar is malformed; remove the cached jar (`archiver auth {} --clear`) and retry", platform.id);
        return AttemptOutcome::CookieProblem;
    }

    warn!(
        exit_code,
        "download failed; try updating yt-dlp (`yt-dlp -U`) and check whether the session expired"
    );
    AttemptOutcome::Failed(exit_code)
}
