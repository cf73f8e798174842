//! Netscape cookie jar codec and the logged-in heuristic.
//!
//! Writes the tab-separated Netscape HTTP cookie format consumed by the
//! external downloader, parses it back (7 TAB-separated fields per line),
//! and decides whether a cookie set looks authenticated for a platform.

use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::platform::Platform;

/// A browser cookie as reported by CDP's `Network.getAllCookies`.
///
/// The value field is intentionally redacted in Debug output to prevent
/// accidental logging of sensitive session data.
#[derive(Clone, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value (sensitive — never log).
    value: String,
    /// The domain the cookie belongs to (e.g. `.google.com`).
    #[serde(default)]
    pub domain: String,
    /// The URL path scope for the cookie.
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Expiry as a Unix timestamp. The browser reports `-1` for session
    /// cookies; anything `<= 0` means "no fixed expiry".
    #[serde(default = "session_expiry")]
    pub expires: f64,
    /// Whether the cookie should only be sent over HTTPS.
    #[serde(default)]
    pub secure: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn session_expiry() -> f64 {
    -1.0
}

impl Cookie {
    /// Creates a new cookie value.
    #[must_use]
    pub fn new(
        name: String,
        value: String,
        domain: String,
        path: String,
        expires: f64,
        secure: bool,
    ) -> Self {
        Self {
            name,
            value,
            domain,
            path,
            expires,
            secure,
        }
    }

    /// Returns the cookie value.
    ///
    /// Cookie values are sensitive — avoid logging the return value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether this is a session cookie with no fixed expiry.
    #[must_use]
    pub fn is_session(&self) -> bool {
        self.expires <= 0.0
    }
}

// Custom Debug impl that redacts the cookie value.
impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("expires", &self.expires)
            .field("secure", &self.secure)
            .finish()
    }
}

/// Errors that can occur while reading or writing cookie jars.
#[derive(Debug, thiserror::Error)]
pub enum JarError {
    /// A line in the cookie file has an invalid format.
    #[error("line {line_number}: {reason}")]
    InvalidLine {
        /// 1-based line number in the cookie file.
        line_number: usize,
        /// Description of what was wrong.
        reason: String,
    },

    /// I/O error reading or writing the cookie file.
    #[error("cookie jar I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// No valid cookies found in a non-empty file.
    #[error("no valid cookies found in file ({malformed_count} lines failed to parse)")]
    NoCookiesFound {
        /// Number of malformed lines encountered.
        malformed_count: usize,
    },
}

/// Writes `cookies` to `path` in Netscape format, keeping only cookies whose
/// domain passes `allow_domain`. Cookies with a blank domain are dropped.
///
/// # Errors
///
/// Returns [`JarError::Io`] when the file cannot be created or written.
pub fn write_netscape_cookie_file(
    path: &Path,
    cookies: &[Cookie],
    allow_domain: impl Fn(&str) -> bool,
) -> Result<(), JarError> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# Netscape HTTP Cookie File")?;
    writeln!(writer, "# This file was generated by archiver. DO NOT EDIT.")?;

    for cookie in cookies {
        let domain = cookie.domain.trim();
        if domain.is_empty() || !allow_domain(domain) {
            continue;
        }
        let include_subdomains = if domain.starts_with('.') {
            "TRUE"
        } else {
            "FALSE"
        };
        let secure = if cookie.secure { "TRUE" } else { "FALSE" };

        // IMPORTANT: session cookies are reported with expires = -1. The
        // Netscape format requires an expires column, but "0" makes
        // downstream consumers treat the cookie as already expired and
        // silently drop it. The empty string is the correct encoding.
        let expires = if cookie.is_session() {
            String::new()
        } else {
            format!("{}", cookie.expires as i64)
        };

        // domain	flag	path	secure	expiration	name	value
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            domain, include_subdomains, cookie.path, secure, expires, cookie.name, cookie.value
        )?;
    }

    writer.flush()?;
    Ok(())
}

/// Result of parsing a cookie file: successfully parsed cookies plus
/// warnings about malformed lines.
#[derive(Debug)]
pub struct JarParse {
    /// Successfully parsed cookies.
    pub cookies: Vec<Cookie>,
    /// Warnings for malformed lines (line number and reason).
    pub warnings: Vec<(usize, String)>,
}

/// Parses a Netscape-format cookie file from a buffered reader.
///
/// Lines starting with `#` and blank lines are skipped; CRLF endings are
/// tolerated. An empty expires field denotes a session cookie.
///
/// # Errors
///
/// Returns [`JarError::Io`] on read failure, or [`JarError::NoCookiesFound`]
/// when a non-empty file yields zero valid cookies. Individual malformed
/// lines are collected as warnings (partial success).
pub fn parse_netscape_cookies(reader: impl BufRead) -> Result<JarParse, JarError> {
    let mut cookies = Vec::new();
    let mut warnings = Vec::new();
    let mut non_blank_lines = 0;

    for (idx, line_result) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line = line_result?;
        let line = line.trim_end();

        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        non_blank_lines += 1;

        match parse_cookie_line(line, line_number) {
            Ok(cookie) => {
                debug!(
                    line = line_number,
                    domain = %cookie.domain,
                    name = %cookie.name,
                    "parsed cookie"
                );
                cookies.push(cookie);
            }
            Err(e) => {
                warn!(line = line_number, reason = %e, "skipping malformed cookie line");
                warnings.push((line_number, e.to_string()));
            }
        }
    }

    if cookies.is_empty() && non_blank_lines > 0 {
        return Err(JarError::NoCookiesFound {
            malformed_count: warnings.len(),
        });
    }

    Ok(JarParse { cookies, warnings })
}

/// Parses a single cookie line into a [`Cookie`].
fn parse_cookie_line(line: &str, line_number: usize) -> Result<Cookie, JarError> {
    let fields: Vec<&str> = line.split('\t').collect();

    if fields.len() != 7 {
        return Err(JarError::InvalidLine {
            line_number,
            reason: format!("expected 7 TAB-separated fields, found {}", fields.len()),
        });
    }

    let domain = fields[0].to_string();
    let _tailmatch = parse_bool_field(fields[1], "tailmatch", line_number)?;
    let path = fields[2].to_string();
    let secure = parse_bool_field(fields[3], "secure", line_number)?;

    // An empty expires field is a session cookie.
    let expires = if fields[4].is_empty() {
        -1.0
    } else {
        fields[4]
            .parse::<u64>()
            .map_err(|_| JarError::InvalidLine {
                line_number,
                reason: format!(
                    "expires field must be empty or a non-negative integer, got '{}'",
                    fields[4]
                ),
            })? as f64
    };

    let name = fields[5].to_string();
    let value = fields[6].to_string();

    if domain.is_empty() {
        return Err(JarError::InvalidLine {
            line_number,
            reason: "domain field is empty".to_string(),
        });
    }
    if name.is_empty() {
        return Err(JarError::InvalidLine {
            line_number,
            reason: "cookie name field is empty".to_string(),
        });
    }

    Ok(Cookie::new(name, value, domain, path, expires, secure))
}

/// Parses a `TRUE`/`FALSE` string field.
fn parse_bool_field(value: &str, field_name: &str, line_number: usize) -> Result<bool, JarError> {
    match value {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        _ => Err(JarError::InvalidLine {
            line_number,
            reason: format!("{field_name} field must be TRUE or FALSE, got '{value}'"),
        }),
    }
}

/// Whether a cookie set looks authenticated for `platform`: at least one
/// cookie passing the platform's domain filter whose name is in the
/// platform's authenticated-cookie list with a non-empty value.
///
/// This is a conservative signal used to decide whether a freshly extracted
/// jar is trustworthy enough to overwrite the persistent cache.
#[must_use]
pub fn looks_authenticated(cookies: &[Cookie], platform: &Platform) -> bool {
    if platform.auth_cookie_names.is_empty() {
        return false;
    }
    cookies.iter().any(|cookie| {
        platform.allows_cookie_domain(&cookie.domain)
            && !cookie.value.is_empty()
            && platform.auth_cookie_names.contains(&cookie.name.as_str())
    })
}

/// Applies [`looks_authenticated`] to a jar file on disk.
///
/// # Errors
///
/// Returns [`JarError`] when the file cannot be read or holds no valid
/// cookie lines.
pub fn cookie_file_looks_authenticated(path: &Path, platform: &Platform) -> Result<bool, JarError> {
    let file = fs::File::open(path)?;
    let parsed = parse_netscape_cookies(BufReader::new(file))?;
    Ok(looks_authenticated(&parsed.cookies, platform))
}

/// Rewrites a jar file in place, keeping only cookies whose domain the
/// platform allows. The downloader dumps every domain it saw back into
/// `--cookies` files, so the cache is re-filtered after each run.
///
/// # Errors
///
/// Returns [`JarError::Io`] when the file cannot be read or rewritten.
pub fn filter_cookie_file(path: &Path, platform: &Platform) -> Result<(), JarError> {
    let file = fs::File::open(path)?;
    let cookies = match parse_netscape_cookies(BufReader::new(file)) {
        Ok(parsed) => parsed.cookies,
        Err(JarError::NoCookiesFound { .. }) => Vec::new(),
        Err(error) => return Err(error),
    };
    write_netscape_cookie_file(path, &cookies, |domain| platform.allows_cookie_domain(domain))
}

/// Copies `src` over `dst` atomically: the contents are staged in a
/// temporary file in `dst`'s directory and renamed into place, so a
/// concurrent reader never observes a half-written jar.
///
/// # Errors
///
/// Returns [`JarError::Io`] on any filesystem failure.
pub fn copy_file_atomic(src: &Path, dst: &Path) -> Result<(), JarError> {
    let parent = dst.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let contents = fs::read(src)?;
    let mut staged = tempfile::Builder::new()
        .prefix(".archiver-jar-")
        .tempfile_in(parent)?;
    staged.write_all(&contents)?;
    staged.flush()?;
    staged.persist(dst).map_err(|error| JarError::Io(error.error))?;
    Ok(())
}

/// Best-effort `chmod 600`; cookie jars hold live session tokens.
pub fn restrict_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}
