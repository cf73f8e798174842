//! Per-platform configuration: match hosts, login URLs, cookie domains, and
//! the cookie names that signal a logged-in session.
//!
//! Adding a platform is meant to be a data change, not new control flow: the
//! registry is a static slice of [`Platform`] values, one file per site.

mod bilibili;
mod youtube;

pub use bilibili::BILIBILI;
pub use youtube::YOUTUBE;

use url::Url;

/// Read-only description of one supported video platform.
#[derive(Debug, Clone, Copy)]
pub struct Platform {
    pub id: &'static str,
    pub name: &'static str,
    /// Hostname suffixes used to detect the platform from a URL
    /// (e.g. `youtube.com`, `youtu.be`).
    pub match_hosts: &'static [&'static str],
    /// URL opened during `archiver auth <platform>`.
    pub login_url: &'static str,
    /// Cookie domains kept when persisting jars for this platform.
    /// An empty list disables filtering.
    pub cookie_domain_suffixes: &'static [&'static str],
    /// Cookie names whose presence with a non-empty value is the heuristic
    /// signal that a jar is authenticated.
    pub auth_cookie_names: &'static [&'static str],
}

impl Platform {
    /// Whether `url`'s host equals one of the match hosts or is a subdomain
    /// of one. Matching is case-insensitive.
    #[must_use]
    pub fn matches_url(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.trim().to_ascii_lowercase();
        if host.is_empty() {
            return false;
        }
        self.match_hosts.iter().any(|suffix| {
            let suffix = suffix.trim().to_ascii_lowercase();
            !suffix.is_empty() && (host == suffix || host.ends_with(&format!(".{suffix}")))
        })
    }

    /// Whether a cookie domain is kept for this platform. Suffix matching is
    /// case-insensitive and ignores a leading dot.
    #[must_use]
    pub fn allows_cookie_domain(&self, domain: &str) -> bool {
        if self.cookie_domain_suffixes.is_empty() {
            return true;
        }
        let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
        if domain.is_empty() {
            return false;
        }
        self.cookie_domain_suffixes.iter().any(|suffix| {
            let suffix = suffix.trim().to_ascii_lowercase();
            !suffix.is_empty() && (domain == suffix || domain.ends_with(&format!(".{suffix}")))
        })
    }

    /// Whether the platform declares any authenticated-cookie names at all.
    #[must_use]
    pub fn has_auth_signals(&self) -> bool {
        !self.auth_cookie_names.is_empty()
    }
}

const PLATFORMS: &[Platform] = &[YOUTUBE, BILIBILI];

/// All built-in platforms, in registration order.
#[must_use]
pub fn supported_platforms() -> &'static [Platform] {
    PLATFORMS
}

/// Looks up a platform by its id (case-insensitive).
#[must_use]
pub fn platform_by_id(id: &str) -> Option<&'static Platform> {
    let id = id.trim().to_ascii_lowercase();
    PLATFORMS.iter().find(|platform| platform.id == id)
}

/// Returns the best matching platform for the given URL, if any.
#[must_use]
pub fn platform_for_url(url: &Url) -> Option<&'static Platform> {
    PLATFORMS.iter().find(|platform| platform.matches_url(url))
}
