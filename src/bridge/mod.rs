//! Browser-session authentication bridge.
//!
//! Launches a real browser with a tool-owned profile, discovers its
//! DevTools endpoint over HTTP, speaks raw WebSocket + CDP to it, and
//! extracts session cookies. The two entry points are
//! [`export_platform_cookies`] (headless extraction into a temp jar) and
//! [`interactive_login`] (headed login driven by the operator).

mod browser;
mod cdp;
mod devtools;
mod error;
mod wire;

pub use browser::{BrowserProcess, CHROME_PATH_ENV, LaunchOptions, find_chrome_executable, launch};
pub use error::BridgeError;

use std::io::{self, BufRead};
use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::info;

use crate::auth::{Cookie, looks_authenticated, restrict_permissions, write_netscape_cookie_file};
use crate::platform::Platform;

const READY_TIMEOUT: Duration = Duration::from_secs(15);
const EXTRACT_TARGET_TIMEOUT: Duration = Duration::from_secs(15);
const INTERACTIVE_TARGET_TIMEOUT: Duration = Duration::from_secs(5);
const WS_DIAL_TIMEOUT: Duration = Duration::from_secs(5);
/// Freshly started browsers need a moment before the profile cookie store
/// is fully initialized.
const COOKIE_STORE_SETTLE: Duration = Duration::from_millis(500);

/// Result of a CDP cookie extraction: the platform-filtered temp jar (which
/// removes itself on drop) plus the unfiltered in-memory cookie list.
pub struct CookieExport {
    pub jar: tempfile::TempPath,
    pub cookies: Vec<Cookie>,
}

/// Launches the browser on the given profile, extracts all cookies over
/// CDP, and stages the platform-filtered jar in a temp file. The browser is
/// killed on every exit path; the temp jar lives as long as the returned
/// handle.
///
/// # Errors
///
/// Propagates launcher, discovery, transport, and jar-write failures.
pub fn export_platform_cookies(
    executable: &Path,
    profile_dir: &Path,
    platform: &Platform,
    headless: bool,
) -> Result<CookieExport, BridgeError> {
    let mut browser = browser::launch(&LaunchOptions {
        executable,
        profile_dir,
        headless,
        open_url: platform.login_url,
        ready_timeout: READY_TIMEOUT,
    })?;

    let cookies = dump_cookies(browser.port(), EXTRACT_TARGET_TIMEOUT)?;
    browser.stop();

    let jar = stage_temp_jar(&cookies, platform)?;
    Ok(CookieExport { jar, cookies })
}

/// Opens a headed browser at the platform's login page, waits for the
/// operator to finish logging in (blocking Enter read, no timeout — by
/// design), then extracts and validates the session cookies.
///
/// # Errors
///
/// Returns [`BridgeError::NotAuthenticated`] when the extracted cookies
/// carry no login signal; propagates launcher/transport failures.
pub fn interactive_login(
    executable: &Path,
    profile_dir: &Path,
    platform: &Platform,
) -> Result<Vec<Cookie>, BridgeError> {
    let mut browser = browser::launch(&LaunchOptions {
        executable,
        profile_dir,
        headless: false,
        open_url: platform.login_url,
        ready_timeout: READY_TIMEOUT,
    })?;

    info!("a browser window is opening; log in to {} there", platform.name);
    info!("for gated content, also open the target video once after logging in");
    info!("press Enter here when you are done");
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);

    let cookies = dump_cookies(browser.port(), INTERACTIVE_TARGET_TIMEOUT)?;
    browser.stop();

    if !looks_authenticated(&cookies, platform) {
        return Err(BridgeError::NotAuthenticated);
    }
    Ok(cookies)
}

fn dump_cookies(port: u16, target_timeout: Duration) -> Result<Vec<Cookie>, BridgeError> {
    let ws_url = devtools::first_page_ws_url(port, target_timeout)?;
    thread::sleep(COOKIE_STORE_SETTLE);
    let connection = wire::WsConnection::dial(&ws_url, WS_DIAL_TIMEOUT)?;
    let mut session = cdp::CdpSession::new(connection);
    cdp::get_all_cookies(&mut session)
}

fn stage_temp_jar(
    cookies: &[Cookie],
    platform: &Platform,
) -> Result<tempfile::TempPath, BridgeError> {
    let file = tempfile::Builder::new()
        .prefix("archiver-cookies-")
        .suffix(".txt")
        .tempfile()?;
    let path = file.into_temp_path();
    write_netscape_cookie_file(&path, cookies, |domain| {
        platform.allows_cookie_domain(domain)
    })?;
    restrict_permissions(&path);
    Ok(path)
}
