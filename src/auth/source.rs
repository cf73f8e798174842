//! Credential source ordering and browser autodetection.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Pins the auth-source walk to a single browser.
pub const BROWSER_ENV: &str = "ARCHIVER_BROWSER";

/// A browser whose cookie store the downloader can read directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserId {
    Chrome,
    Firefox,
    Chromium,
    Edge,
}

impl BrowserId {
    /// Default priority: Chrome first (largest install base), Firefox second
    /// (its cookie store is rarely encrypted against third-party reads).
    pub const PRIORITY: [Self; 4] = [Self::Chrome, Self::Firefox, Self::Chromium, Self::Edge];

    /// Identifier understood by the downloader's cookies-from-browser flag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
            Self::Chromium => "chromium",
            Self::Edge => "edge",
        }
    }

    /// Parses a browser id, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "chrome" => Some(Self::Chrome),
            "firefox" => Some(Self::Firefox),
            "chromium" => Some(Self::Chromium),
            "edge" => Some(Self::Edge),
            _ => None,
        }
    }
}

impl fmt::Display for BrowserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential source for one download attempt.
///
/// Deliberately a closed enum: a future source kind (e.g. a device-code
/// flow) is a compile-checked extension, not a stringly-typed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Cookies read from an installed browser's own profile.
    Browser(BrowserId),
}

impl fmt::Display for AuthSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Browser(id) => write!(f, "browser cookies ({id})"),
        }
    }
}

/// Builds the ordered source list for one authentication walk.
///
/// `ARCHIVER_BROWSER` pins a single source; otherwise installed browsers are
/// detected from their on-disk profile directories and walked in priority
/// order. When nothing is detected the full priority list is tried anyway —
/// detection looks in well-known locations only and can miss real installs.
#[must_use]
pub fn build_auth_sources() -> Vec<AuthSource> {
    if let Ok(value) = env::var(BROWSER_ENV) {
        if let Some(id) = BrowserId::parse(&value) {
            return vec![AuthSource::Browser(id)];
        }
        if !value.trim().is_empty() {
            warn!(value = %value, "unrecognized {BROWSER_ENV} value; falling back to autodetection");
        }
    }
    auto_browser_order()
        .into_iter()
        .map(AuthSource::Browser)
        .collect()
}

fn auto_browser_order() -> Vec<BrowserId> {
    let available = detect_browsers();
    if available.len() == 1 {
        return available;
    }
    if available.is_empty() {
        return BrowserId::PRIORITY.to_vec();
    }
    BrowserId::PRIORITY
        .iter()
        .copied()
        .filter(|id| available.contains(id))
        .collect()
}

fn detect_browsers() -> Vec<BrowserId> {
    let Some(home) = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
    else {
        return Vec::new();
    };
    browser_profile_checks(&home)
        .into_iter()
        .filter(|(_, path)| path.is_dir())
        .map(|(id, _)| id)
        .collect()
}

#[cfg(target_os = "linux")]
fn browser_profile_checks(home: &Path) -> Vec<(BrowserId, PathBuf)> {
    vec![
        (BrowserId::Chrome, home.join(".config/google-chrome")),
        (BrowserId::Chromium, home.join(".config/chromium")),
        (BrowserId::Edge, home.join(".config/microsoft-edge")),
        (BrowserId::Firefox, home.join(".mozilla/firefox")),
    ]
}

#[cfg(target_os = "macos")]
fn browser_profile_checks(home: &Path) -> Vec<(BrowserId, PathBuf)> {
    let support = home.join("Library/Application Support");
    vec![
        (BrowserId::Chrome, support.join("Google/Chrome")),
        (BrowserId::Chromium, support.join("Chromium")),
        (BrowserId::Edge, support.join("Microsoft Edge")),
        (BrowserId::Firefox, support.join("Firefox")),
    ]
}

#[cfg(target_os = "windows")]
fn browser_profile_checks(home: &Path) -> Vec<(BrowserId, PathBuf)> {
    let _ = home;
    let mut checks = Vec::new();
    if let Some(local) = env::var_os("LOCALAPPDATA").map(PathBuf::from) {
        checks.push((BrowserId::Chrome, local.join("Google/Chrome/User Data")));
        checks.push((BrowserId::Chromium, local.join("Chromium/User Data")));
        checks.push((BrowserId::Edge, local.join("Microsoft/Edge/User Data")));
    }
    if let Some(roaming) = env::var_os("APPDATA").map(PathBuf::from) {
        checks.push((BrowserId::Firefox, roaming.join("Mozilla/Firefox")));
    }
    checks
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn browser_profile_checks(home: &Path) -> Vec<(BrowserId, PathBuf)> {
    let _ = home;
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_id_parse_is_case_insensitive() {
        assert_eq!(BrowserId::parse(" Chrome "), Some(BrowserId::Chrome));
        assert_eq!(BrowserId::parse("FIREFOX"), Some(BrowserId::Firefox));
        assert_eq!(BrowserId::parse("safari"), None);
        assert_eq!(BrowserId::parse(""), None);
    }

    #[test]
    fn test_priority_order_starts_with_chrome_then_firefox() {
        assert_eq!(
            BrowserId::PRIORITY,
            [
                BrowserId::Chrome,
                BrowserId::Firefox,
                BrowserId::Chromium,
                BrowserId::Edge
            ]
        );
    }

    #[test]
    fn test_auth_source_label_names_the_browser() {
        let source = AuthSource::Browser(BrowserId::Firefox);
        assert_eq!(source.to_string(), "browser cookies (firefox)");
    }
}
