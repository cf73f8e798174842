//! Authentication: cookie jars, credential sources, and the fallback walk.

mod jar;
mod orchestrator;
mod source;

pub use jar::{
    Cookie, JarError, JarParse, cookie_file_looks_authenticated, copy_file_atomic,
    filter_cookie_file, looks_authenticated, parse_netscape_cookies, restrict_permissions,
    write_netscape_cookie_file,
};
pub use orchestrator::{AttemptOutcome, AttemptRunner, run_with_fallback};
pub use source::{AuthSource, BROWSER_ENV, BrowserId, build_auth_sources};
