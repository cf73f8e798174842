//! Process exit codes consumed by wrapping tooling.
//!
//! The values are part of the external contract: callers distinguish "log in
//! and retry" from "the cookie source itself is broken" by exit code alone.

use crate::auth::AttemptOutcome;

pub const OK: i32 = 0;
pub const USAGE: i32 = 2;
/// No authenticated session was found after exhausting all sources.
pub const AUTH_REQUIRED: i32 = 20;
/// A source-specific, potentially recoverable cookie/session problem.
pub const COOKIE_PROBLEM: i32 = 21;
pub const DOWNLOADER_MISSING: i32 = 32;
pub const DOWNLOAD_FAILED: i32 = 40;

/// Maps the orchestrator's terminal outcome onto a process exit code.
#[must_use]
pub fn for_outcome(outcome: AttemptOutcome) -> i32 {
    match outcome {
        AttemptOutcome::Success => OK,
        AttemptOutcome::AuthRequired => AUTH_REQUIRED,
        AttemptOutcome::CookieProblem => COOKIE_PROBLEM,
        AttemptOutcome::Failed(_) => DOWNLOAD_FAILED,
    }
}
