//! Multi-source authentication fallback.
//!
//! Walks the credential sources for one download: the persistent cookie
//! cache first, then each configured browser in priority order, with a CDP
//! in-browser export attempted after a failed Chrome source. Outcomes are
//! classified as retryable (another source may work) or terminal (stop
//! immediately). The actual downloader invocation sits behind
//! [`AttemptRunner`] so the walk is testable in isolation.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::jar;
use super::source::{AuthSource, BROWSER_ENV, BrowserId};
use crate::platform::Platform;

/// Outcome of one download attempt, as classified from the downloader run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// No authenticated session was available to this attempt; a different
    /// credential source may still work.
    AuthRequired,
    /// The credential source itself failed (locked or undecryptable cookie
    /// database, malformed jar); a different source may still work.
    CookieProblem,
    /// Terminal failure carrying the downloader's exit code; no credential
    /// source will change the result.
    Failed(i32),
}

impl AttemptOutcome {
    /// Whether the next credential source is worth trying.
    #[must_use]
    pub fn retryable(self) -> bool {
        matches!(self, Self::AuthRequired | Self::CookieProblem)
    }
}

/// Seam between the fallback walk and the downloader invocation.
#[async_trait]
pub trait AttemptRunner: Send {
    /// One attempt using the persistent cached jar.
    async fn run_with_cookie_file(&mut self, cookie_file: &Path) -> AttemptOutcome;

    /// One attempt using a browser's own cookie store. When `jar_out` is
    /// set, the downloader dumps the jar it ended up with to that path.
    async fn run_with_browser(
        &mut self,
        source: AuthSource,
        jar_out: Option<&Path>,
    ) -> AttemptOutcome;

    /// One attempt with cookies exported from inside a Chrome session over
    /// CDP. Recovers sessions the direct cookie-database read cannot reach
    /// (database locks, OS-level encryption).
    async fn run_with_cdp_export(&mut self) -> AttemptOutcome;
}

/// Runs the full fallback walk and returns the terminal outcome.
///
/// The persistent cache is only ever overwritten with a jar that passed the
/// authenticated heuristic; browser attempts dump into a temporary jar that
/// is removed afterwards regardless of outcome.
pub async fn run_with_fallback<R: AttemptRunner>(
    runner: &mut R,
    platform: &Platform,
    sources: &[AuthSource],
    cookie_cache: Option<&Path>,
) -> AttemptOutcome {
    // Fast path: a previously promoted cache needs no browser access at all.
    if let Some(cache) = existing_cache(cookie_cache) {
        info!("auth source: cached cookie jar");
        let outcome = runner.run_with_cookie_file(&cache).await;
        // The downloader dumps its whole jar back into the file; keep the
        // cache minimal.
        filter_best_effort(&cache, platform);
        if outcome == AttemptOutcome::Success {
            return outcome;
        }
        if !outcome.retryable() {
            return outcome;
        }
    }

    if sources.is_empty() {
        return AttemptOutcome::AuthRequired;
    }

    let mut last = AttemptOutcome::AuthRequired;
    for (index, source) in sources.iter().copied().enumerate() {
        info!(
            attempt = index + 1,
            total = sources.len(),
            source = %source,
            "trying auth source"
        );

        // Browser attempts never write the persistent cache directly: an
        // unauthenticated browser (e.g. Edge with no login) would clobber a
        // previously good cache. Dump to a temp jar and promote it only
        // after the authenticated check passes.
        let temp_jar = cookie_cache.and_then(temp_jar_beside);
        let mut outcome = runner.run_with_browser(source, temp_jar.as_deref()).await;

        if let (Some(temp), Some(cache)) = (temp_jar.as_deref(), cookie_cache) {
            promote_if_authenticated(temp, cache, platform);
        }
        drop(temp_jar); // removed regardless of outcome

        if let Some(cache) = existing_cache(cookie_cache) {
            filter_best_effort(&cache, platform);
        }

        if outcome == AttemptOutcome::Success {
            if index > 0 && env::var_os(BROWSER_ENV).is_none() {
                info!(
                    source = %source,
                    "switched auth source automatically; set {}=<browser> to pin it",
                    BROWSER_ENV
                );
            }
            return outcome;
        }

        // Chrome's cookie database is frequently unreadable from outside
        // (held lock, OS-level encryption). CDP asks the running browser
        // for its decrypted cookies instead, so try that before moving on
        // to the next browser.
        if source == AuthSource::Browser(BrowserId::Chrome) && outcome.retryable() {
            info!("chrome cookie store failed; trying a CDP export from a chrome session");
            let cdp_outcome = runner.run_with_cdp_export().await;
            match cdp_outcome {
                AttemptOutcome::Success => return cdp_outcome,
                AttemptOutcome::AuthRequired => {
                    info!(
                        "the CDP session is not logged in; run `archiver auth {}` first",
                        platform.id
                    );
                    outcome = AttemptOutcome::AuthRequired;
                }
                AttemptOutcome::CookieProblem => outcome = AttemptOutcome::CookieProblem,
                AttemptOutcome::Failed(_) => {}
            }
        }

        last = outcome;
        if outcome.retryable() && index < sources.len() - 1 {
            info!("auth source failed; trying the next one");
            continue;
        }
        break;
    }

    if last.retryable() {
        info!(
            "no working session found; log in to {} in a browser and retry",
            platform.name
        );
        info!(
            "if you are logged in elsewhere, pin the browser: {}=firefox archiver get <url>",
            BROWSER_ENV
        );
        info!("or run `archiver auth {}` once to prepare a managed session", platform.id);
        return AttemptOutcome::AuthRequired;
    }
    last
}

fn existing_cache(cookie_cache: Option<&Path>) -> Option<PathBuf> {
    let cache = cookie_cache?;
    cache.is_file().then(|| cache.to_path_buf())
}

fn filter_best_effort(cache: &Path, platform: &Platform) {
    if let Err(error) = jar::filter_cookie_file(cache, platform) {
        warn!(error = %error, "failed to filter cookie jar; continuing");
    }
}

/// Creates the temp jar in the cache's own directory so the promotion
/// rename stays on one filesystem.
fn temp_jar_beside(cache: &Path) -> Option<tempfile::TempPath> {
    let dir = cache.parent()?;
    if let Err(error) = fs::create_dir_all(dir) {
        warn!(error = %error, "cannot prepare cache directory; continuing without cache update");
        return None;
    }
    match tempfile::Builder::new()
        .prefix("archiver-cookies-")
        .suffix(".txt")
        .tempfile_in(dir)
    {
        Ok(file) => Some(file.into_temp_path()),
        Err(error) => {
            warn!(error = %error, "cannot create temp cookie jar; continuing without cache update");
            None
        }
    }
}

fn promote_if_authenticated(temp: &Path, cache: &Path, platform: &Platform) {
    if let Err(error) = jar::filter_cookie_file(temp, platform) {
        warn!(error = %error, "failed to filter temp cookie jar; cache left untouched");
        return;
    }
    match jar::cookie_file_looks_authenticated(temp, platform) {
        Ok(true) => {
            if let Err(error) = jar::copy_file_atomic(temp, cache) {
                warn!(error = %error, "failed to update cookie cache; continuing");
            } else {
                jar::restrict_permissions(cache);
                debug!(path = %cache.display(), "cookie cache refreshed from authenticated jar");
            }
        }
        Ok(false) => debug!("temp jar carries no login signal; cache left untouched"),
        Err(error) => warn!(error = %error, "could not inspect temp cookie jar"),
    }
}
