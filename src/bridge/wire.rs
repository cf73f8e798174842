//! Minimal RFC 6455 WebSocket client over a raw TCP socket.
//!
//! Deliberately hand-rolled: the bridge speaks exactly one dialect (text
//! frames to a local DevTools endpoint), and owning the framing keeps this
//! core free of any WebSocket/CDP dependency. The implementation is the
//! explicit state machine the RFC describes: header parse, length-class
//! resolution, optional mask-key read, payload read, optional unmask.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use base64::Engine;
use rand::RngCore;

use super::error::BridgeError;

pub const OP_TEXT: u8 = 0x1;
pub const OP_CLOSE: u8 = 0x8;
pub const OP_PING: u8 = 0x9;
pub const OP_PONG: u8 = 0xA;

/// Upper bound on a declared payload length. DevTools cookie dumps are a
/// few hundred KiB at most; anything larger is a broken peer.
const MAX_PAYLOAD: u64 = 10 * 1024 * 1024;

/// One client-side WebSocket connection. Closing is implicit in drop.
#[derive(Debug)]
pub struct WsConnection {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl WsConnection {
    /// Dials `raw_url` (scheme `ws`) and performs the HTTP upgrade
    /// handshake.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidWsUrl`] for unusable URLs,
    /// [`BridgeError::Handshake`] when the server answers anything but
    /// `101`, and [`BridgeError::Io`] for socket failures.
    pub fn dial(raw_url: &str, timeout: Duration) -> Result<Self, BridgeError> {
        let parsed = url::Url::parse(raw_url).map_err(|error| BridgeError::InvalidWsUrl {
            url: raw_url.to_string(),
            reason: error.to_string(),
        })?;
        if parsed.scheme() != "ws" {
            return Err(BridgeError::InvalidWsUrl {
                url: raw_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| BridgeError::InvalidWsUrl {
                url: raw_url.to_string(),
                reason: "missing host".to_string(),
            })?
            .to_string();
        let port = parsed.port().unwrap_or(80);

        let addr = (host.as_str(), port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| BridgeError::InvalidWsUrl {
                url: raw_url.to_string(),
                reason: "host resolved to no address".to_string(),
            })?;
        let mut writer = TcpStream::connect_timeout(&addr, timeout)?;
        let mut reader = BufReader::new(writer.try_clone()?);

        let mut key_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut key_bytes);
        let sec_key = base64::engine::general_purpose::STANDARD.encode(key_bytes);

        let mut request_uri = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            request_uri.push('?');
            request_uri.push_str(query);
        }
        let request = format!(
            "GET {request_uri} HTTP/1.1\r\n\
             Host: {host}:{port}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {sec_key}\r\n\
             Sec-WebSocket-Version: 13\r\n\
             \r\n"
        );
        writer.write_all(request.as_bytes())?;

        let mut status_line = String::new();
        reader.read_line(&mut status_line)?;
        if !status_line.contains(" 101 ") {
            return Err(BridgeError::Handshake(status_line.trim().to_string()));
        }
        // Drain response headers to the blank line.
        loop {
            let mut line = String::new();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                return Err(BridgeError::Handshake(
                    "connection closed before end of handshake headers".to_string(),
                ));
            }
            if line == "\r\n" || line == "\n" {
                break;
            }
        }

        Ok(Self { writer, reader })
    }

    /// Sends one masked text frame.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Io`] on socket failure.
    pub fn write_text(&mut self, payload: &[u8]) -> Result<(), BridgeError> {
        self.write_frame(OP_TEXT, payload)
    }

    fn write_frame(&mut self, opcode: u8, payload: &[u8]) -> Result<(), BridgeError> {
        // FIN always set; the bridge never fragments. Client-to-server
        // frames must be masked.
        let mut header = vec![0x80 | (opcode & 0x0f), 0x80];
        match payload.len() {
            n if n <= 125 => header[1] |= n as u8,
            n if n <= 65535 => {
                header[1] |= 126;
                header.extend_from_slice(&(n as u16).to_be_bytes());
            }
            n => {
                header[1] |= 127;
                header.extend_from_slice(&(n as u64).to_be_bytes());
            }
        }

        let mut mask_key = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut mask_key);
        header.extend_from_slice(&mask_key);

        let mut masked = payload.to_vec();
        for (i, byte) in masked.iter_mut().enumerate() {
            *byte ^= mask_key[i % 4];
        }

        self.writer.write_all(&header)?;
        self.writer.write_all(&masked)?;
        Ok(())
    }

    /// Reads frames until a text payload arrives. Pings are answered with
    /// pongs, pongs are consumed, a close frame ends the stream, and any
    /// other opcode is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::FrameProtocol`] for oversized frames and
    /// [`BridgeError::Io`] (with `UnexpectedEof` for a peer close) for
    /// socket failures.
    pub fn read_message(&mut self) -> Result<Vec<u8>, BridgeError> {
        loop {
            let (opcode, payload) = self.read_frame()?;
            match opcode {
                OP_TEXT => return Ok(payload),
                OP_PING => self.write_frame(OP_PONG, &payload)?,
                OP_PONG => {}
                OP_CLOSE => {
                    return Err(BridgeError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "websocket closed by peer",
                    )));
                }
                _ => {} // ignore other frames
            }
        }
    }

    fn read_frame(&mut self) -> Result<(u8, Vec<u8>), BridgeError> {
        let mut head = [0u8; 2];
        self.reader.read_exact(&mut head)?;
        let opcode = head[0] & 0x0f;
        let masked = head[1] & 0x80 != 0;

        let mut length = u64::from(head[1] & 0x7f);
        if length == 126 {
            let mut ext = [0u8; 2];
            self.reader.read_exact(&mut ext)?;
            length = u64::from(u16::from_be_bytes(ext));
        } else if length == 127 {
            let mut ext = [0u8; 8];
            self.reader.read_exact(&mut ext)?;
            length = u64::from_be_bytes(ext);
        }
        if length > MAX_PAYLOAD {
            return Err(BridgeError::FrameProtocol(format!(
                "declared payload of {length} bytes exceeds the {MAX_PAYLOAD} byte limit"
            )));
        }

        // Servers normally send unmasked frames; honor the mask bit either
        // way rather than assuming.
        let mut mask_key = [0u8; 4];
        if masked {
            self.reader.read_exact(&mut mask_key)?;
        }

        let mut payload = vec![0u8; length as usize];
        self.reader.read_exact(&mut payload)?;
        if masked {
            for (i, byte) in payload.iter_mut().enumerate() {
                *byte ^= mask_key[i % 4];
            }
        }

        Ok((opcode, payload))
    }
}

/// In-process fake WebSocket server for the wire and CDP tests: accepts one
/// connection, answers the upgrade handshake, then hands the raw stream to
/// the test scenario.
#[cfg(test)]
pub(crate) mod testserver {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::JoinHandle;

    pub(crate) fn spawn(
        session: impl FnOnce(TcpStream) + Send + 'static,
    ) -> (JoinHandle<()>, String) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            session(stream);
        });
        (handle, format!("ws://127.0.0.1:{port}/devtools/page/test"))
    }

    /// Server side of the upgrade handshake; asserts the client sent the
    /// required headers.
    pub(crate) fn accept_handshake(stream: &mut TcpStream) {
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        assert!(request_line.starts_with("GET "), "unexpected request line: {request_line}");

        let mut saw_key = false;
        let mut saw_upgrade = false;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let lower = line.to_ascii_lowercase();
            if lower.starts_with("sec-websocket-key:") {
                saw_key = true;
            }
            if lower.starts_with("upgrade:") && lower.contains("websocket") {
                saw_upgrade = true;
            }
            if line == "\r\n" || line == "\n" {
                break;
            }
        }
        assert!(saw_key, "client handshake must carry Sec-WebSocket-Key");
        assert!(saw_upgrade, "client handshake must carry Upgrade: websocket");

        stream
            .write_all(
                b"HTTP/1.1 101 Switching Protocols\r\n\
                  Upgrade: websocket\r\n\
                  Connection: Upgrade\r\n\
                  \r\n",
            )
            .unwrap();
    }

    /// Reads one client frame, asserting the mask bit is set, and returns
    /// the opcode with the unmasked payload.
    pub(crate) fn read_client_frame(stream: &mut TcpStream) -> (u8, Vec<u8>) {
        let mut head = [0u8; 2];
        stream.read_exact(&mut head).unwrap();
        let opcode = head[0] & 0x0f;
        assert!(head[1] & 0x80 != 0, "client frames must set the mask bit");

        let mut length = u64::from(head[1] & 0x7f);
        if length == 126 {
            let mut ext = [0u8; 2];
            stream.read_exact(&mut ext).unwrap();
            length = u64::from(u16::from_be_bytes(ext));
        } else if length == 127 {
            let mut ext = [0u8; 8];
            stream.read_exact(&mut ext).unwrap();
            length = u64::from_be_bytes(ext);
        }

        let mut mask_key = [0u8; 4];
        stream.read_exact(&mut mask_key).unwrap();
        let mut payload = vec![0u8; usize::try_from(length).unwrap()];
        stream.read_exact(&mut payload).unwrap();
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= mask_key[i % 4];
        }
        (opcode, payload)
    }

    /// Writes an unmasked server frame (the normal server behavior).
    pub(crate) fn write_server_frame(stream: &mut TcpStream, opcode: u8, payload: &[u8]) {
        let mut header = vec![0x80 | opcode, 0u8];
        match payload.len() {
            n if n <= 125 => header[1] |= n as u8,
            n if n <= 65535 => {
                header[1] |= 126;
                header.extend_from_slice(&(n as u16).to_be_bytes());
            }
            n => {
                header[1] |= 127;
                header.extend_from_slice(&(n as u64).to_be_bytes());
            }
        }
        stream.write_all(&header).unwrap();
        stream.write_all(payload).unwrap();
    }

    /// Writes a masked server frame (unusual, but legal to receive).
    pub(crate) fn write_masked_server_frame(stream: &mut TcpStream, opcode: u8, payload: &[u8]) {
        let mask_key = [0x11u8, 0x22, 0x33, 0x44];
        let mut header = vec![0x80 | opcode, 0x80];
        match payload.len() {
            n if n <= 125 => header[1] |= n as u8,
            n if n <= 65535 => {
                header[1] |= 126;
                header.extend_from_slice(&(n as u16).to_be_bytes());
            }
            n => {
                header[1] |= 127;
                header.extend_from_slice(&(n as u64).to_be_bytes());
            }
        }
        header.extend_from_slice(&mask_key);
        let mut masked = payload.to_vec();
        for (i, byte) in masked.iter_mut().enumerate() {
            *byte ^= mask_key[i % 4];
        }
        stream.write_all(&header).unwrap();
        stream.write_all(&masked).unwrap();
    }
}
