//! Application state directory and persistent cookie-cache paths.
//!
//! State lives under `$XDG_CONFIG_HOME/archiver` (or `$HOME/.config/archiver`)
//! for the lifetime of the installation: the managed browser profile and one
//! Netscape cookie jar per platform. Created lazily, never auto-deleted.

use std::env;
use std::fs;
use std::path::PathBuf;

use crate::platform::Platform;

const STATE_DIR_NAME: &str = "archiver";

/// Errors for state-directory resolution.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// No suitable user config directory is available.
    #[error("unable to determine config directory (set XDG_CONFIG_HOME or HOME)")]
    ConfigDirUnavailable,
    /// Filesystem I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Resolves the application state directory without creating it.
pub fn app_state_dir() -> Result<PathBuf, StateError> {
    if let Some(base) = env::var_os("XDG_CONFIG_HOME") {
        let base = PathBuf::from(base);
        if base.is_absolute() {
            return Ok(base.join(STATE_DIR_NAME));
        }
    }
    if let Some(home) = env::var_os("HOME") {
        if !home.is_empty() {
            return Ok(PathBuf::from(home).join(".config").join(STATE_DIR_NAME));
        }
    }
    Err(StateError::ConfigDirUnavailable)
}

/// Resolves and creates the state directory, private on Unix.
pub fn ensure_state_dir() -> Result<PathBuf, StateError> {
    let dir = app_state_dir()?;
    fs::create_dir_all(&dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(&dir, fs::Permissions::from_mode(0o700));
    }
    Ok(dir)
}

/// Directory of the managed browser profile used for interactive login and
/// CDP cookie extraction. Long-lived so login sessions survive between runs.
pub fn browser_profile_dir() -> Result<PathBuf, StateError> {
    Ok(app_state_dir()?.join("chrome-profile"))
}

/// Path of the persistent cookie jar for one platform.
pub fn cookie_cache_path(platform: &Platform) -> Result<PathBuf, StateError> {
    Ok(app_state_dir()?.join(format!("{}-cookies.txt", platform.id)))
}
