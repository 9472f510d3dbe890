//! WebSocket protocol error types.

use std::fmt;
use std::io;
use std::time::Duration;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// WebSocket transport errors.
#[derive(Debug)]
pub enum ProtocolError {
    /// I/O error
    Io(io::Error),

    /// Upgrade handshake error
    Handshake(HandshakeError),

    /// Payload length does not fit the 63-bit extended length field
    FrameTooLarge(u64),

    /// Frame exceeds the configured decode limit
    MessageTooLarge {
        /// Declared or accumulated size
        size: u64,
        /// Configured limit
        max: usize,
    },

    /// Opcode outside the RFC 6455 set
    InvalidOpcode(u8),

    /// Frame sequence that violates RFC 6455 (e.g. stray continuation)
    InvalidFrame(String),

    /// Read did not complete within the configured timeout
    Timeout(Duration),

    /// Peer closed the stream or sent a close frame
    ConnectionClosed,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Io(e) => write!(f, "I/O error: {}", e),
            ProtocolError::Handshake(e) => write!(f, "Handshake error: {}", e),
            ProtocolError::FrameTooLarge(len) => {
                write!(f, "Frame payload of {} bytes cannot be encoded", len)
            }
            ProtocolError::MessageTooLarge { size, max } => {
                write!(f, "Frame too large: {} bytes (max: {})", size, max)
            }
            ProtocolError::InvalidOpcode(op) => write!(f, "Invalid opcode: 0x{:X}", op),
            ProtocolError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            ProtocolError::Timeout(limit) => write!(f, "Read timed out after {:?}", limit),
            ProtocolError::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Io(e) => Some(e),
            ProtocolError::Handshake(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        ProtocolError::Io(err)
    }
}

impl From<HandshakeError> for ProtocolError {
    fn from(err: HandshakeError) -> Self {
        ProtocolError::Handshake(err)
    }
}

/// HTTP Upgrade handshake errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Response did not start with an HTTP status line
    MalformedResponse(String),

    /// Server answered with something other than 101 Switching Protocols
    UnexpectedStatus(u16),

    /// `Sec-WebSocket-Accept` header missing
    MissingAccept,

    /// `Sec-WebSocket-Accept` did not match the key we sent
    AcceptMismatch {
        /// Key derived from the request
        expected: String,
        /// Key the server sent
        actual: String,
    },

    /// Response header block exceeded the read limit
    HeaderTooLarge(usize),
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::MalformedResponse(line) => {
                write!(f, "Malformed upgrade response: {:?}", line)
            }
            HandshakeError::UnexpectedStatus(code) => {
                write!(f, "Server refused upgrade with status {}", code)
            }
            HandshakeError::MissingAccept => write!(f, "Missing Sec-WebSocket-Accept header"),
            HandshakeError::AcceptMismatch { expected, actual } => write!(
                f,
                "Server key does not match (expected {}, got {})",
                expected, actual
            ),
            HandshakeError::HeaderTooLarge(max) => {
                write!(f, "Upgrade response header exceeds {} bytes", max)
            }
        }
    }
}

impl std::error::Error for HandshakeError {}
