//! Integration tests for the authentication fallback walk: source ordering,
//! the Chrome→CDP detour, terminal short-circuits, and cache promotion
//! gating. The downloader is replaced with a scripted runner.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use archiver_core::auth::{
    AttemptOutcome, AttemptRunner, AuthSource, BrowserId, run_with_fallback,
};
use archiver_core::platform::YOUTUBE;

/// Replays a fixed outcome sequence and records every call it receives.
struct ScriptedRunner {
    script: VecDeque<AttemptOutcome>,
    calls: Vec<String>,
    /// Jar contents written into `jar_out` on browser attempts, simulating
    /// the downloader dumping its cookie jar.
    browser_jar_payload: Option<&'static str>,
}

impl ScriptedRunner {
    fn new(script: Vec<AttemptOutcome>) -> Self {
        Self {
            script: script.into(),
            calls: Vec::new(),
            browser_jar_payload: None,
        }
    }

    fn next_outcome(&mut self) -> AttemptOutcome {
        self.script
            .pop_front()
            .expect("runner called more often than scripted")
    }
}

#[async_trait]
impl AttemptRunner for ScriptedRunner {
    async fn run_with_cookie_file(&mut self, _cookie_file: &Path) -> AttemptOutcome {
        self.calls.push("cache".to_string());
        self.next_outcome()
    }

    async fn run_with_browser(
        &mut self,
        source: AuthSource,
        jar_out: Option<&Path>,
    ) -> AttemptOutcome {
        let AuthSource::Browser(id) = source;
        self.calls.push(format!("browser:{}", id.as_str()));
        if let (Some(path), Some(payload)) = (jar_out, self.browser_jar_payload) {
            fs::write(path, payload).unwrap();
        }
        self.next_outcome()
    }

    async fn run_with_cdp_export(&mut self) -> AttemptOutcome {
        self.calls.push("cdp".to_string());
        self.next_outcome()
    }
}

fn chrome_then_firefox() -> Vec<AuthSource> {
    vec![
        AuthSource::Browser(BrowserId::Chrome),
        AuthSource::Browser(BrowserId::Firefox),
    ]
}

const AUTHENTICATED_JAR: &str = "\
# Netscape HTTP Cookie File
.google.com\tTRUE\t/\tTRUE\t\tSAPISID\tsession-token
";

const UNAUTHENTICATED_JAR: &str = "\
# Netscape HTTP Cookie File
.google.com\tTRUE\t/\tTRUE\t\tPREF\tirrelevant
";

fn cache_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("youtube-cookies.txt")
}

#[tokio::test]
async fn chrome_failure_triggers_cdp_before_firefox() {
    let mut runner = ScriptedRunner::new(vec![
        AttemptOutcome::AuthRequired, // chrome
        AttemptOutcome::AuthRequired, // cdp
        AttemptOutcome::AuthRequired, // firefox
    ]);

    let outcome =
        run_with_fallback(&mut runner, &YOUTUBE, &chrome_then_firefox(), None).await;

    assert_eq!(outcome, AttemptOutcome::AuthRequired);
    assert_eq!(runner.calls, ["browser:chrome", "cdp", "browser:firefox"]);
}

#[tokio::test]
async fn cdp_success_short_circuits_the_walk() {
    let mut runner = ScriptedRunner::new(vec![
        AttemptOutcome::CookieProblem, // chrome
        AttemptOutcome::Success,       // cdp
    ]);

    let outcome =
        run_with_fallback(&mut runner, &YOUTUBE, &chrome_then_firefox(), None).await;

    assert_eq!(outcome, AttemptOutcome::Success);
    assert_eq!(runner.calls, ["browser:chrome", "cdp"]);
}

#[tokio::test]
async fn terminal_failure_stops_the_walk_immediately() {
    let mut runner = ScriptedRunner::new(vec![AttemptOutcome::Failed(40)]);

    let outcome =
        run_with_fallback(&mut runner, &YOUTUBE, &chrome_then_firefox(), None).await;

    assert_eq!(outcome, AttemptOutcome::Failed(40));
    assert_eq!(runner.calls, ["browser:chrome"], "firefox must not be tried");
}

#[tokio::test]
async fn existing_cache_is_tried_first_and_success_skips_browsers() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_path(&dir);
    fs::write(&cache, AUTHENTICATED_JAR).unwrap();

    let mut runner = ScriptedRunner::new(vec![AttemptOutcome::Success]);
    let outcome = run_with_fallback(
        &mut runner,
        &YOUTUBE,
        &chrome_then_firefox(),
        Some(&cache),
    )
    .await;

    assert_eq!(outcome, AttemptOutcome::Success);
    assert_eq!(runner.calls, ["cache"]);
}

#[tokio::test]
async fn cache_failure_falls_through_to_browser_sources() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_path(&dir);
    fs::write(&cache, AUTHENTICATED_JAR).unwrap();

    let mut runner = ScriptedRunner::new(vec![
        AttemptOutcome::AuthRequired, // cache
        AttemptOutcome::Success,      // chrome
    ]);
    let outcome = run_with_fallback(
        &mut runner,
        &YOUTUBE,
        &chrome_then_firefox(),
        Some(&cache),
    )
    .await;

    assert_eq!(outcome, AttemptOutcome::Success);
    assert_eq!(runner.calls, ["cache", "browser:chrome"]);
}

#[tokio::test]
async fn terminal_cache_failure_skips_browser_sources() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_path(&dir);
    fs::write(&cache, AUTHENTICATED_JAR).unwrap();

    let mut runner = ScriptedRunner::new(vec![AttemptOutcome::Failed(40)]);
    let outcome = run_with_fallback(
        &mut runner,
        &YOUTUBE,
        &chrome_then_firefox(),
        Some(&cache),
    )
    .await;

    assert_eq!(outcome, AttemptOutcome::Failed(40));
    assert_eq!(runner.calls, ["cache"]);
}

#[tokio::test]
async fn empty_source_list_yields_auth_required() {
    let mut runner = ScriptedRunner::new(vec![]);
    let outcome = run_with_fallback(&mut runner, &YOUTUBE, &[], None).await;
    assert_eq!(outcome, AttemptOutcome::AuthRequired);
    assert!(runner.calls.is_empty());
}

#[tokio::test]
async fn authenticated_browser_jar_is_promoted_to_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_path(&dir);

    let mut runner = ScriptedRunner::new(vec![AttemptOutcome::AuthRequired]);
    runner.browser_jar_payload = Some(AUTHENTICATED_JAR);

    let sources = [AuthSource::Browser(BrowserId::Firefox)];
    let outcome = run_with_fallback(&mut runner, &YOUTUBE, &sources, Some(&cache)).await;

    assert_eq!(outcome, AttemptOutcome::AuthRequired);
    let promoted = fs::read_to_string(&cache).unwrap();
    assert!(promoted.contains("SAPISID"), "cache must hold the promoted jar");

    // The temp jar beside the cache is gone.
    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .filter(|name| name.to_string_lossy().starts_with("archiver-cookies-"))
        .collect();
    assert!(leftovers.is_empty(), "temp jars must be removed: {leftovers:?}");
}

#[tokio::test]
async fn unauthenticated_browser_jar_must_not_clobber_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_path(&dir);
    fs::write(&cache, AUTHENTICATED_JAR).unwrap();

    // First outcome feeds the cached-jar fast path, second the browser walk.
    let mut runner = ScriptedRunner::new(vec![
        AttemptOutcome::AuthRequired,
        AttemptOutcome::AuthRequired,
    ]);
    runner.browser_jar_payload = Some(UNAUTHENTICATED_JAR);

    let sources = [AuthSource::Browser(BrowserId::Firefox)];
    run_with_fallback(&mut runner, &YOUTUBE, &sources, Some(&cache)).await;

    let kept = fs::read_to_string(&cache).unwrap();
    assert!(
        kept.contains("SAPISID"),
        "an unauthenticated jar must not overwrite a good cache"
    );
    assert!(!kept.contains("PREF"));
}

#[tokio::test]
async fn all_sources_retryable_yields_auth_required() {
    let mut runner = ScriptedRunner::new(vec![
        AttemptOutcome::CookieProblem, // chrome
        AttemptOutcome::CookieProblem, // cdp
        AttemptOutcome::CookieProblem, // firefox
    ]);

    let outcome =
        run_with_fallback(&mut runner, &YOUTUBE, &chrome_then_firefox(), None).await;

    // Exhaustion with only retryable failures is "authentication required"
    // outwardly, even when the last failure was a cookie problem.
    assert_eq!(outcome, AttemptOutcome::AuthRequired);
}
