//! DevTools HTTP control-surface polling: readiness and target discovery.

use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::debug;

use super::error::BridgeError;

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const HTTP_TIMEOUT: Duration = Duration::from_secs(1);

/// One inspectable browser context, as listed by `/json/list`.
#[derive(Debug, Deserialize)]
struct DevToolsTarget {
    #[serde(rename = "type", default)]
    target_type: String,
    #[serde(default)]
    url: String,
    #[serde(rename = "webSocketDebuggerUrl", default)]
    web_socket_debugger_url: String,
}

fn control_client() -> Result<reqwest::blocking::Client, BridgeError> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()?)
}

/// Polls `/json/version` until the endpoint answers 200 or the deadline
/// passes.
///
/// # Errors
///
/// Returns [`BridgeError::DevToolsTimeout`] when the deadline elapses.
pub fn wait_ready(port: u16, timeout: Duration) -> Result<(), BridgeError> {
    let client = control_client()?;
    let url = format!("http://127.0.0.1:{port}/json/version");
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        match client.get(&url).send() {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                debug!(port, "devtools endpoint is ready");
                return Ok(());
            }
            Ok(_) | Err(_) => {}
        }
        thread::sleep(POLL_INTERVAL);
    }
    Err(BridgeError::DevToolsTimeout {
        what: "browser devtools endpoint",
        timeout,
    })
}

/// Polls `/json/list` until a `page`-type target with a WebSocket debugger
/// URL appears, and returns that URL.
///
/// # Errors
///
/// Returns [`BridgeError::DevToolsTimeout`] when no eligible target appears
/// within the deadline.
pub fn first_page_ws_url(port: u16, timeout: Duration) -> Result<String, BridgeError> {
    let client = control_client()?;
    let url = format!("http://127.0.0.1:{port}/json/list");
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        let Ok(response) = client.get(&url).send() else {
            thread::sleep(POLL_INTERVAL);
            continue;
        };
        if response.status() != reqwest::StatusCode::OK {
            thread::sleep(POLL_INTERVAL);
            continue;
        }
        let Ok(targets) = response.json::<Vec<DevToolsTarget>>() else {
            thread::sleep(POLL_INTERVAL);
            continue;
        };
        for target in targets {
            if target.target_type == "page" && !target.web_socket_debugger_url.trim().is_empty() {
                debug!(url = %target.url, "selected devtools page target");
                return Ok(target.web_socket_debugger_url);
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
    Err(BridgeError::DevToolsTimeout {
        what: "devtools page target",
        timeout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_wait_ready_returns_once_version_endpoint_answers_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let port = server.address().port();
        let result =
            tokio::task::spawn_blocking(move || wait_ready(port, Duration::from_secs(3)))
                .await
                .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_ready_times_out_on_non_200_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let port = server.address().port();
        let result =
            tokio::task::spawn_blocking(move || wait_ready(port, Duration::from_millis(500)))
                .await
                .unwrap();
        assert!(
            matches!(result, Err(BridgeError::DevToolsTimeout { .. })),
            "got: {result:?}"
        );
    }

    #[tokio::test]
    async fn test_first_page_ws_url_skips_ineligible_targets() {
        let server = MockServer::start().await;
        let targets = serde_json::json!([
            {
                "type": "background_page",
                "url": "chrome-extension://abc",
                "webSocketDebuggerUrl": "ws://127.0.0.1:1/devtools/page/bg"
            },
            {
                "type": "page",
                "url": "https://example.com/no-debugger",
                "webSocketDebuggerUrl": ""
            },
            {
                "type": "page",
                "url": "https://example.com",
                "webSocketDebuggerUrl": "ws://127.0.0.1:1/devtools/page/ok"
            }
        ]);
        Mock::given(method("GET"))
            .and(path("/json/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(targets))
            .mount(&server)
            .await;

        let port = server.address().port();
        let result = tokio::task::spawn_blocking(move || {
            first_page_ws_url(port, Duration::from_secs(3))
        })
        .await
        .unwrap();
        assert_eq!(result.unwrap(), "ws://127.0.0.1:1/devtools/page/ok");
    }

    #[tokio::test]
    async fn test_first_page_ws_url_times_out_without_page_targets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let port = server.address().port();
        let result = tokio::task::spawn_blocking(move || {
            first_page_ws_url(port, Duration::from_millis(500))
        })
        .await
        .unwrap();
        assert!(
            matches!(result, Err(BridgeError::DevToolsTimeout { .. })),
            "got: {result:?}"
        );
    }
}
