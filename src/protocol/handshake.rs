//! HTTP Upgrade handshake (RFC 6455 section 4).
//!
//! The client sends a `GET` with a random `Sec-WebSocket-Key`; the server must
//! answer `101 Switching Protocols` with `Sec-WebSocket-Accept` set to
//! `base64(sha1(key + WEBSOCKET_GUID))`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};

use super::error::HandshakeError;

/// GUID appended to the client key before hashing
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Protocol version sent in `Sec-WebSocket-Version`
pub const WEBSOCKET_VERSION: u8 = 13;

/// Upper bound on the response header block
pub const MAX_RESPONSE_HEADER_SIZE: usize = 16 * 1024;

/// Generate a fresh `Sec-WebSocket-Key` (16 random bytes, base64).
pub fn generate_key() -> String {
    let nonce: [u8; 16] = rand::random();
    STANDARD.encode(nonce)
}

/// Compute the expected `Sec-WebSocket-Accept` for a key.
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Position just past the `\r\n\r\n` terminating an HTTP header block.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

/// Client upgrade request.
#[derive(Debug, Clone)]
pub struct UpgradeRequest {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Request path, `/gremlin` for Gremlin Server
    pub path: String,
    /// Whether the stream is TLS (only affects the origin scheme)
    pub ssl: bool,
    /// `Sec-WebSocket-Key`
    pub key: String,
}

impl UpgradeRequest {
    /// New request with a freshly generated key.
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>, ssl: bool) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.into(),
            ssl,
            key: generate_key(),
        }
    }

    /// Render the request bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let scheme = if self.ssl { "https" } else { "http" };
        format!(
            "GET {path} HTTP/1.1\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {key}\r\n\
             Host: {host}\r\n\
             Sec-WebSocket-Origin: {scheme}://{host}:{port}\r\n\
             Sec-WebSocket-Version: {version}\r\n\r\n",
            path = self.path,
            key = self.key,
            host = self.host,
            scheme = scheme,
            port = self.port,
            version = WEBSOCKET_VERSION,
        )
        .into_bytes()
    }

    /// Check a parsed response against this request's key.
    pub fn validate(&self, response: &UpgradeResponse) -> Result<(), HandshakeError> {
        if response.status != 101 {
            return Err(HandshakeError::UnexpectedStatus(response.status));
        }

        let actual = response
            .header("Sec-WebSocket-Accept")
            .ok_or(HandshakeError::MissingAccept)?;
        let expected = compute_accept_key(&self.key);
        if actual != expected {
            return Err(HandshakeError::AcceptMismatch {
                expected,
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

/// Parsed server upgrade response.
#[derive(Debug, Clone)]
pub struct UpgradeResponse {
    /// HTTP status code
    pub status: u16,
    /// Header name/value pairs in arrival order
    pub headers: Vec<(String, String)>,
}

impl UpgradeResponse {
    /// Parse a complete header block (status line + headers).
    pub fn parse(block: &[u8]) -> Result<Self, HandshakeError> {
        let text = String::from_utf8_lossy(block);
        let mut lines = text.split("\r\n");

        let status_line = lines.next().unwrap_or_default();
        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        if !version.starts_with("HTTP/") {
            return Err(HandshakeError::MalformedResponse(status_line.to_string()));
        }
        let status = parts
            .next()
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| HandshakeError::MalformedResponse(status_line.to_string()))?;

        let headers = lines
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let (name, value) = line.split_once(':')?;
                Some((name.trim().to_string(), value.trim().to_string()))
            })
            .collect();

        Ok(Self { status, headers })
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
