//! The `auth` command: interactive browser login and cache management.

use std::fs;
use std::io;

use anyhow::Result;
use tracing::{error, info};

use crate::auth;
use crate::bridge;
use crate::exit;
use crate::platform::{Platform, platform_by_id};
use crate::state;

/// Logs in to a platform in a managed browser window and caches the
/// session, or clears the cached session with `clear`. Returns the process
/// exit code.
///
/// # Errors
///
/// Returns an error only for unexpected filesystem failures while clearing;
/// login problems map to exit codes.
pub async fn run_auth_command(platform_id: &str, clear: bool) -> Result<i32> {
    let Some(platform) = platform_by_id(platform_id) else {
        error!(
            platform = platform_id,
            "unknown platform; run `archiver platforms` for the supported list"
        );
        return Ok(exit::USAGE);
    };

    if clear {
        return clear_cached_session(platform);
    }

    // The whole login flow is blocking: browser launch, an operator Enter
    // wait, and the CDP round trip.
    Ok(tokio::task::spawn_blocking(move || interactive_auth(platform)).await?)
}

fn interactive_auth(platform: &'static Platform) -> i32 {
    let executable = match bridge::find_chrome_executable() {
        Ok(executable) => executable,
        Err(error) => {
            error!("{error}");
            return exit::COOKIE_PROBLEM;
        }
    };
    let profile_dir = match state::browser_profile_dir() {
        Ok(dir) => dir,
        Err(error) => {
            error!(error = %error, "cannot determine the managed browser profile directory");
            return exit::COOKIE_PROBLEM;
        }
    };
    if let Err(error) = fs::create_dir_all(&profile_dir) {
        error!(error = %error, path = %profile_dir.display(), "cannot create the managed browser profile directory");
        return exit::COOKIE_PROBLEM;
    }

    info!(browser = %executable.display(), "using browser");
    info!(profile = %profile_dir.display(), "using managed profile");

    let cookies = match bridge::interactive_login(&executable, &profile_dir, platform) {
        Ok(cookies) => cookies,
        Err(error) => {
            error!(error = %error, "login failed");
            return exit::AUTH_REQUIRED;
        }
    };

    let cache = match state::ensure_state_dir().and_then(|_| state::cookie_cache_path(platform)) {
        Ok(path) => path,
        Err(error) => {
            error!(error = %error, "cannot determine the cookie cache path");
            return exit::COOKIE_PROBLEM;
        }
    };
    if let Err(error) = auth::write_netscape_cookie_file(&cache, &cookies, |domain| {
        platform.allows_cookie_domain(domain)
    }) {
        error!(error = %error, "failed to save the session cookies");
        return exit::COOKIE_PROBLEM;
    }
    auth::restrict_permissions(&cache);

    info!(path = %cache.display(), "login session saved");
    exit::OK
}

fn clear_cached_session(platform: &Platform) -> Result<i32> {
    let cache = state::cookie_cache_path(platform)?;
    match fs::remove_file(&cache) {
        Ok(()) => {
            info!(path = %cache.display(), "removed cached login session");
            Ok(exit::OK)
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            info!("no cached login session found");
            Ok(exit::OK)
        }
        Err(error) => Err(error.into()),
    }
}
