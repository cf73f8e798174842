//! Chrome DevTools Protocol session: request/response correlation over one
//! WebSocket connection.
//!
//! CDP interleaves asynchronous event notifications with call replies on the
//! same socket. Correlation is by call id only: envelopes whose id is absent
//! or different from the awaited one are events and get skipped, never
//! misread as the result.

use serde::Deserialize;
use serde_json::Value;

use super::error::BridgeError;
use super::wire::WsConnection;
use crate::auth::Cookie;

/// One CDP session. Call ids are assigned from a per-session monotonic
/// counter owned by the session, not by any global state.
pub struct CdpSession {
    connection: WsConnection,
    next_id: u64,
}

#[derive(Debug, Deserialize)]
struct CdpEnvelope {
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<CdpErrorBody>,
}

#[derive(Debug, Deserialize)]
struct CdpErrorBody {
    #[serde(default)]
    message: String,
}

impl CdpSession {
    #[must_use]
    pub fn new(connection: WsConnection) -> Self {
        Self {
            connection,
            next_id: 1,
        }
    }

    /// Issues one CDP call and blocks until the reply with the matching id
    /// arrives. There is no per-call deadline: a browser that stops
    /// responding blocks the attempt (accepted operational risk).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::CdpProtocol`] when the reply carries an error
    /// payload; transport failures propagate from the connection.
    pub fn call(&mut self, method: &str, params: Option<Value>) -> Result<Value, BridgeError> {
        let id = self.next_id;
        self.next_id += 1;

        let mut request = serde_json::json!({ "id": id, "method": method });
        if let Some(params) = params {
            request["params"] = params;
        }
        self.connection.write_text(&serde_json::to_vec(&request)?)?;

        loop {
            let frame = self.connection.read_message()?;
            // Unparseable frames are skipped like unrelated events.
            let Ok(envelope) = serde_json::from_slice::<CdpEnvelope>(&frame) else {
                continue;
            };
            if envelope.id != Some(id) {
                continue;
            }
            if let Some(error) = envelope.error {
                return Err(BridgeError::CdpProtocol {
                    method: method.to_string(),
                    message: error.message,
                });
            }
            return Ok(envelope.result.unwrap_or(Value::Null));
        }
    }
}

/// Fetches every cookie the browser holds, across all its storage.
///
/// # Errors
///
/// Propagates transport and protocol failures from the session.
pub fn get_all_cookies(session: &mut CdpSession) -> Result<Vec<Cookie>, BridgeError> {
    session.call("Network.enable", None)?;
    let result = session.call("Network.getAllCookies", None)?;

    #[derive(Deserialize)]
    struct CookieList {
        #[serde(default)]
        cookies: Vec<Cookie>,
    }
    let list: CookieList = serde_json::from_value(result)?;
    Ok(list.cookies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::wire::testserver;
    use crate::bridge::wire::OP_TEXT;
    use std::time::Duration;

    const DIAL_TIMEOUT: Duration = Duration::from_secs(2);

    fn session_for(url: &str) -> CdpSession {
        CdpSession::new(WsConnection::dial(url, DIAL_TIMEOUT).unwrap())
    }

    #[test]
    fn test_call_skips_event_envelopes_until_matching_id() {
        let (server, url) = testserver::spawn(|mut stream| {
            testserver::accept_handshake(&mut stream);
            let (_, request) = testserver::read_client_frame(&mut stream);
            let request: serde_json::Value = serde_json::from_slice(&request).unwrap();
            assert_eq!(request["method"], "Network.enable");
            let id = request["id"].as_u64().unwrap();

            // An unrelated event (no id) must be skipped, then a reply with
            // a non-matching id, then the real reply.
            testserver::write_server_frame(
                &mut stream,
                OP_TEXT,
                br#"{"method":"Network.requestWillBeSent","params":{}}"#,
            );
            testserver::write_server_frame(
                &mut stream,
                OP_TEXT,
                br#"{"id":9999,"result":{"wrong":true}}"#,
            );
            let reply = format!(r#"{{"id":{id},"result":{{"ok":true}}}}"#);
            testserver::write_server_frame(&mut stream, OP_TEXT, reply.as_bytes());
        });

        let mut session = session_for(&url);
        let result = session.call("Network.enable", None).unwrap();
        assert_eq!(result["ok"], true);
        server.join().unwrap();
    }

    #[test]
    fn test_call_surfaces_cdp_error_payloads() {
        let (server, url) = testserver::spawn(|mut stream| {
            testserver::accept_handshake(&mut stream);
            let (_, request) = testserver::read_client_frame(&mut stream);
            let request: serde_json::Value = serde_json::from_slice(&request).unwrap();
            let id = request["id"].as_u64().unwrap();
            let reply = format!(r#"{{"id":{id},"error":{{"message":"method missing"}}}}"#);
            testserver::write_server_frame(&mut stream, OP_TEXT, reply.as_bytes());
        });

        let mut session = session_for(&url);
        let error = session.call("Network.bogus", None).unwrap_err();
        match error {
            BridgeError::CdpProtocol { method, message } => {
                assert_eq!(method, "Network.bogus");
                assert_eq!(message, "method missing");
            }
            other => panic!("expected CdpProtocol, got: {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_call_ids_are_monotonic_and_unparseable_frames_are_skipped() {
        let (server, url) = testserver::spawn(|mut stream| {
            testserver::accept_handshake(&mut stream);

            let (_, first) = testserver::read_client_frame(&mut stream);
            let first: serde_json::Value = serde_json::from_slice(&first).unwrap();
            assert_eq!(first["id"].as_u64().unwrap(), 1);
            testserver::write_server_frame(&mut stream, OP_TEXT, b"this is not json");
            testserver::write_server_frame(&mut stream, OP_TEXT, br#"{"id":1,"result":{}}"#);

            let (_, second) = testserver::read_client_frame(&mut stream);
            let second: serde_json::Value = serde_json::from_slice(&second).unwrap();
            assert_eq!(second["id"].as_u64().unwrap(), 2);
            testserver::write_server_frame(&mut stream, OP_TEXT, br#"{"id":2,"result":{}}"#);
        });

        let mut session = session_for(&url);
        session.call("Network.enable", None).unwrap();
        session.call("Network.getAllCookies", None).unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_get_all_cookies_decodes_the_cookie_list() {
        let (server, url) = testserver::spawn(|mut stream| {
            testserver::accept_handshake(&mut stream);

            let (_, enable) = testserver::read_client_frame(&mut stream);
            let enable: serde_json::Value = serde_json::from_slice(&enable).unwrap();
            assert_eq!(enable["method"], "Network.enable");
            testserver::write_server_frame(&mut stream, OP_TEXT, br#"{"id":1,"result":{}}"#);

            let (_, get) = testserver::read_client_frame(&mut stream);
            let get: serde_json::Value = serde_json::from_slice(&get).unwrap();
            assert_eq!(get["method"], "Network.getAllCookies");
            testserver::write_server_frame(
                &mut stream,
                OP_TEXT,
                br#"{"id":2,"result":{"cookies":[
                    {"name":"SAPISID","value":"x","domain":".google.com","path":"/","expires":-1,"secure":true},
                    {"name":"PREF","value":"y","domain":".youtube.com","path":"/","expires":1900000000,"secure":false}
                ]}}"#,
            );
        });

        let mut session = session_for(&url);
        let cookies = get_all_cookies(&mut session).unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "SAPISID");
        assert!(cookies[0].is_session());
        assert!(!cookies[1].is_session());
        server.join().unwrap();
    }
}
