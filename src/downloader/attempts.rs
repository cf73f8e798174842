//! The real [`AttemptRunner`]: wires the fallback walk to yt-dlp and the
//! browser bridge.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use super::{DownloadConfig, Downloader, base_args, browser_args, classify_output, cookie_file_args, run};
use crate::auth::{self, AttemptOutcome, AttemptRunner, AuthSource};
use crate::bridge::{self, BridgeError, CookieExport};
use crate::platform::Platform;

/// Everything one `get` run needs to execute download attempts.
pub struct DownloadAttempt {
    pub downloader: Downloader,
    pub url: String,
    pub platform: &'static Platform,
    pub config: DownloadConfig,
    pub cookie_cache: Option<PathBuf>,
    /// Managed profile used by the CDP export path.
    pub profile_dir: PathBuf,
}

impl DownloadAttempt {
    async fn execute(&self, mut args: Vec<String>, extra: &[String]) -> AttemptOutcome {
        args.extend_from_slice(extra);
        match run(&self.downloader, &args, &self.url).await {
            Ok((code, stderr)) => classify_output(code, &stderr, self.platform),
            Err(error) => {
                warn!(error = %error, "failed to invoke the downloader");
                AttemptOutcome::Failed(-1)
            }
        }
    }
}

#[async_trait]
impl AttemptRunner for DownloadAttempt {
    async fn run_with_cookie_file(&mut self, cookie_file: &Path) -> AttemptOutcome {
        let extra = cookie_file_args(cookie_file);
        self.execute(base_args(&self.config), &extra).await
    }

    async fn run_with_browser(
        &mut self,
        source: AuthSource,
        jar_out: Option<&Path>,
    ) -> AttemptOutcome {
        let mut extra = browser_args(source).to_vec();
        if let Some(jar_out) = jar_out {
            extra.extend(cookie_file_args(jar_out));
        }
        self.execute(base_args(&self.config), &extra).await
    }

    async fn run_with_cdp_export(&mut self) -> AttemptOutcome {
        let platform = self.platform;
        let profile_dir = self.profile_dir.clone();
        let export = tokio::task::spawn_blocking(
            move || -> Result<CookieExport, BridgeError> {
                let executable = bridge::find_chrome_executable()?;
                bridge::export_platform_cookies(&executable, &profile_dir, platform, true)
            },
        )
        .await;

        let export = match export {
            Ok(Ok(export)) => export,
            Ok(Err(error)) => {
                warn!(error = %error, "could not export cookies from chrome");
                return AttemptOutcome::CookieProblem;
            }
            Err(error) => {
                warn!(error = %error, "cookie export task failed");
                return AttemptOutcome::CookieProblem;
            }
        };

        if !auth::looks_authenticated(&export.cookies, self.platform) {
            // A stronger signal than inferring from downloader output: the
            // browser session itself holds no auth cookies.
            return AttemptOutcome::AuthRequired;
        }

        // Refresh the persistent cache so subsequent runs can skip the
        // browser entirely.
        if let Some(cache) = self.cookie_cache.clone() {
            if let Err(error) = auth::copy_file_atomic(&export.jar, &cache) {
                warn!(error = %error, "failed to refresh cookie cache; continuing");
            } else {
                auth::restrict_permissions(&cache);
            }
        }

        let extra = cookie_file_args(&export.jar);
        self.execute(base_args(&self.config), &extra).await
        // export.jar drops here; the temp jar is removed regardless of outcome
    }
}
