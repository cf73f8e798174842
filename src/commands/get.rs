//! The `get` command: platform detection plus the authenticated download
//! walk.

use anyhow::{Result, anyhow};
use tracing::{error, info, warn};
use url::Url;

use crate::auth::{build_auth_sources, run_with_fallback};
use crate::downloader::{self, DownloadAttempt, DownloadConfig, Downloader};
use crate::exit;
use crate::platform::platform_for_url;
use crate::state;

/// Downloads one URL, running the authentication fallback for known
/// platforms. Returns the process exit code.
///
/// # Errors
///
/// Returns an error for unparseable URLs or when the state directory is
/// needed but cannot be resolved; downloader failures map to exit codes.
pub async fn run_get_command(raw_url: &str, config: DownloadConfig) -> Result<i32> {
    let parsed =
        Url::parse(raw_url).map_err(|error| anyhow!("invalid URL '{raw_url}': {error}"))?;

    let downloader = match Downloader::locate() {
        Ok(downloader) => downloader,
        Err(error) => {
            error!("{error}");
            return Ok(exit::DOWNLOADER_MISSING);
        }
    };

    let Some(platform) = platform_for_url(&parsed) else {
        // Unknown site: plain fetch. No cookie jar is kept for arbitrary
        // hosts — that would persist a full browser jar for any URL.
        info!(url = raw_url, "no known platform matched; downloading without auth");
        let args = downloader::base_args(&config);
        let (code, _stderr) = downloader::run(&downloader, &args, raw_url).await?;
        if code == 0 {
            return Ok(exit::OK);
        }
        warn!(exit_code = code, "download failed");
        return Ok(exit::DOWNLOAD_FAILED);
    };
    info!(platform = platform.id, "detected platform");

    let cookie_cache = if platform.has_auth_signals() {
        match state::cookie_cache_path(platform) {
            Ok(path) => Some(path),
            Err(error) => {
                warn!(error = %error, "no state directory; continuing without a cookie cache");
                None
            }
        }
    } else {
        None
    };
    let profile_dir = state::browser_profile_dir()?;

    let sources = build_auth_sources();
    let mut runner = DownloadAttempt {
        downloader,
        url: raw_url.to_string(),
        platform,
        config,
        cookie_cache: cookie_cache.clone(),
        profile_dir,
    };
    let outcome = run_with_fallback(&mut runner, platform, &sources, cookie_cache.as_deref()).await;
    Ok(exit::for_outcome(outcome))
}
