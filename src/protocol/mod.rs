//! WebSocket transport for Gremlin Server.
//!
//! This module contains everything below the request/response message layer:
//!
//! - [`frame`]: RFC 6455 frame encoding/decoding with client masking
//! - [`handshake`]: HTTP Upgrade request and `Sec-WebSocket-Accept` validation
//! - [`envelope`]: the mime-type header that prefixes every serialized request
//! - [`stream`]: a buffered WebSocket stream over any async transport

pub mod envelope;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod stream;

pub use error::{HandshakeError, ProtocolError, ProtocolResult};
pub use frame::{apply_mask, Frame, FrameCodec, Opcode, Role};
pub use handshake::{compute_accept_key, UpgradeRequest, UpgradeResponse};
pub use stream::{StreamState, WebSocketStream};
