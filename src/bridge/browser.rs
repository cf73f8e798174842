//! Browser executable discovery and process lifecycle.
//!
//! One browser process is launched per authentication attempt, with an
//! isolated tool-owned profile and a remote-debugging port, and is always
//! killed and waited when the attempt ends. [`BrowserProcess`] carries the
//! stop handle and repeats it in `Drop` so no exit path can leak a process.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tracing::{debug, info};

use super::devtools;
use super::error::BridgeError;

/// Explicit path to the browser executable, bypassing autodetection.
pub const CHROME_PATH_ENV: &str = "ARCHIVER_CHROME_PATH";

/// Locates a Chrome/Chromium executable.
///
/// # Errors
///
/// Returns [`BridgeError::BrowserNotFound`] when the override is unusable
/// or nothing is found.
pub fn find_chrome_executable() -> Result<PathBuf, BridgeError> {
    if let Ok(value) = env::var(CHROME_PATH_ENV) {
        let value = value.trim();
        if !value.is_empty() {
            let path = PathBuf::from(value);
            if is_runnable_file(&path) {
                return Ok(path);
            }
            return Err(BridgeError::BrowserNotFound(format!(
                "{CHROME_PATH_ENV} does not point at a runnable file: {value}"
            )));
        }
    }

    for candidate in platform_candidates() {
        if is_runnable_file(&candidate) {
            return Ok(candidate);
        }
    }
    for name in ["google-chrome", "google-chrome-stable", "chrome", "chromium"] {
        if let Some(path) = find_in_path(name) {
            return Ok(path);
        }
    }

    Err(BridgeError::BrowserNotFound(format!(
        "no Chrome executable found; set {CHROME_PATH_ENV} to the chrome binary"
    )))
}

#[cfg(target_os = "macos")]
fn platform_candidates() -> Vec<PathBuf> {
    vec![PathBuf::from(
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    )]
}

#[cfg(target_os = "windows")]
fn platform_candidates() -> Vec<PathBuf> {
    ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
        .iter()
        .filter_map(|key| env::var_os(key))
        .map(|base| {
            PathBuf::from(base)
                .join("Google")
                .join("Chrome")
                .join("Application")
                .join("chrome.exe")
        })
        .collect()
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_candidates() -> Vec<PathBuf> {
    Vec::new()
}

fn is_runnable_file(path: &Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    metadata.is_file() && is_executable(&metadata)
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

// Windows has no executable bit; existence is the only check.
#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    true
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_env = env::var_os("PATH")?;
    env::split_paths(&path_env)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_runnable_file(candidate))
}

/// Binds an ephemeral localhost port, frees it, and hands the number to the
/// browser. Another process could grab the port in between; accepted race.
pub fn pick_free_port() -> Result<u16, BridgeError> {
    let listener =
        std::net::TcpListener::bind(("127.0.0.1", 0)).map_err(BridgeError::PortAllocation)?;
    let port = listener
        .local_addr()
        .map_err(BridgeError::PortAllocation)?
        .port();
    drop(listener);
    Ok(port)
}

/// How a browser process should be launched.
pub struct LaunchOptions<'a> {
    pub executable: &'a Path,
    pub profile_dir: &'a Path,
    pub headless: bool,
    pub open_url: &'a str,
    pub ready_timeout: Duration,
}

/// A running browser with its debugging port. `stop()` kills and waits on
/// the process; dropping the handle does the same, so every exit path
/// (early error returns included) tears the process down exactly once.
#[derive(Debug)]
pub struct BrowserProcess {
    child: Child,
    port: u16,
    stopped: bool,
}

impl BrowserProcess {
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Kills and waits on the browser process. Safe to call more than once.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Err(error) = self.child.kill() {
            debug!(error = %error, "browser process already exited");
        }
        let _ = self.child.wait();
    }
}

impl Drop for BrowserProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts the browser with an isolated profile and a remote-debugging port,
/// and verifies DevTools readiness before returning. On readiness failure
/// the process is killed before the error propagates.
///
/// # Errors
///
/// Returns [`BridgeError::ProfileDirectory`], [`BridgeError::Spawn`] or
/// [`BridgeError::DevToolsTimeout`].
pub fn launch(options: &LaunchOptions<'_>) -> Result<BrowserProcess, BridgeError> {
    let port = pick_free_port()?;

    fs::create_dir_all(options.profile_dir).map_err(|source| BridgeError::ProfileDirectory {
        path: options.profile_dir.to_path_buf(),
        source,
    })?;

    let mut command = Command::new(options.executable);
    command
        .arg("--remote-debugging-address=127.0.0.1")
        .arg(format!("--remote-debugging-port={port}"))
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--disable-default-apps")
        .arg("--disable-extensions")
        .arg(format!("--user-data-dir={}", options.profile_dir.display()))
        .arg("--profile-directory=Default");
    if options.headless {
        command.arg("--headless=new").arg("--disable-gpu");
    }
    let open_url = options.open_url.trim();
    command.arg(if open_url.is_empty() { "about:blank" } else { open_url });
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let child = command.spawn().map_err(BridgeError::Spawn)?;
    let mut process = BrowserProcess {
        child,
        port,
        stopped: false,
    };
    info!(
        port,
        pid = process.id(),
        headless = options.headless,
        "launched browser with isolated profile"
    );

    if let Err(error) = devtools::wait_ready(port, options.ready_timeout) {
        process.stop();
        return Err(error);
    }
    Ok(process)
}
