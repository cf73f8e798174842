//! Error taxonomy for the browser-session authentication bridge.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::auth::JarError;

/// Errors surfaced by the bridge.
///
/// Nothing here is retried at this layer; the fallback orchestrator is the
/// only place that decides whether another credential source is worth
/// trying. `BrowserNotFound` and `ProfileDirectory` are terminal for the
/// whole walk — no other source substitutes for a missing executable or an
/// unwritable profile path.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No usable browser executable was found.
    #[error("{0}")]
    BrowserNotFound(String),

    /// The managed profile directory could not be created.
    #[error("cannot prepare browser profile directory {}: {source}", path.display())]
    ProfileDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Binding an ephemeral local port for the debugging endpoint failed.
    #[error("failed to allocate a local debugging port: {0}")]
    PortAllocation(#[source] std::io::Error),

    /// The browser process could not be started.
    #[error("failed to start the browser process: {0}")]
    Spawn(#[source] std::io::Error),

    /// A bounded DevTools poll elapsed without the expected response.
    #[error("{what} not available within {timeout:?}")]
    DevToolsTimeout {
        what: &'static str,
        timeout: Duration,
    },

    /// The DevTools endpoint handed out an unusable WebSocket URL.
    #[error("invalid websocket URL '{url}': {reason}")]
    InvalidWsUrl { url: String, reason: String },

    /// The HTTP upgrade was refused or malformed.
    #[error("websocket handshake failed: {0}")]
    Handshake(String),

    /// A frame violated the protocol or exceeded the size cap.
    #[error("websocket frame error: {0}")]
    FrameProtocol(String),

    /// The browser answered a CDP call with an error payload.
    #[error("{method}: {message}")]
    CdpProtocol { method: String, message: String },

    /// Cookies were extracted but carry no login signal for the platform
    /// (not logged in, or verification incomplete).
    #[error("no valid login cookies found (not logged in, or verification incomplete)")]
    NotAuthenticated,

    /// Writing or reading an exported cookie jar failed.
    #[error("cookie jar error: {0}")]
    CookieFile(#[from] JarError),

    /// The DevTools HTTP client failed outside the poll loop.
    #[error("devtools http client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Raw socket I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A CDP payload could not be encoded or decoded.
    #[error("malformed CDP payload: {0}")]
    Json(#[from] serde_json::Error),
}
