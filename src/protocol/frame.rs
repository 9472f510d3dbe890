//! WebSocket frame codec for tokio_util.
//!
//! Implements RFC 6455 base framing: a header byte carrying FIN and the opcode,
//! a length byte carrying the mask flag and a 7-bit length (or an indicator for a
//! 16/64-bit big-endian extension), an optional 4-byte mask, then the payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{ProtocolError, ProtocolResult};

/// FIN bit in the first header byte
pub const FIN_BIT: u8 = 0x80;

/// Mask bit in the second header byte
pub const MASK_BIT: u8 = 0x80;

/// Largest length that fits the 7-bit field
pub const MAX_INLINE_LEN: usize = 125;

/// Length indicator for a 16-bit extension
pub const LEN_16_MARKER: u8 = 126;

/// Length indicator for a 64-bit extension
pub const LEN_64_MARKER: u8 = 127;

/// Default decode limit (64MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Continuation of a fragmented message
    Continuation = 0x0,
    /// UTF-8 text
    Text = 0x1,
    /// Binary
    Binary = 0x2,
    /// Close
    Close = 0x8,
    /// Ping
    Ping = 0x9,
    /// Pong
    Pong = 0xA,
}

impl Opcode {
    /// Parse from the low nibble of the first header byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Opcode::Continuation),
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    /// Control frames may not be fragmented.
    pub fn is_control(self) -> bool {
        (self as u8) & 0x8 != 0
    }
}

/// Which end of the connection we are. Clients mask, servers don't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Client-to-server frames are masked
    Client,
    /// Server-to-client frames are sent in the clear
    Server,
}

/// A single WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag
    pub fin: bool,
    /// Opcode
    pub opcode: Opcode,
    /// Unmasked payload
    pub payload: Bytes,
}

impl Frame {
    /// Create a final frame.
    pub fn new(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            opcode,
            payload: payload.into(),
        }
    }

    /// Binary data frame.
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Binary, payload)
    }

    /// Text data frame.
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Text, payload)
    }

    /// Empty close frame.
    pub fn close() -> Self {
        Self::new(Opcode::Close, Bytes::new())
    }

    /// Pong echoing a ping payload.
    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Pong, payload)
    }

    /// First header byte as it goes on the wire.
    pub fn header_byte(&self) -> u8 {
        let fin = if self.fin { FIN_BIT } else { 0 };
        fin | self.opcode as u8
    }
}

/// XOR `data` in place with the 4-byte mask, cycling the key.
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// WebSocket frame codec.
#[derive(Debug)]
pub struct FrameCodec {
    /// Encoding side
    role: Role,
    /// Maximum payload accepted on decode
    max_frame_size: usize,
}

impl FrameCodec {
    /// Codec for the given role with the default size limit.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Client codec (masks outgoing frames).
    pub fn client() -> Self {
        Self::new(Role::Client)
    }

    /// Server codec (used by the test server).
    pub fn server() -> Self {
        Self::new(Role::Server)
    }

    /// Set the decode limit.
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Role of this codec.
    pub fn role(&self) -> Role {
        self.role
    }

    fn write_header(len: usize, masked: bool, dst: &mut BytesMut) -> ProtocolResult<()> {
        let mask_bit = if masked { MASK_BIT } else { 0 };

        if len <= MAX_INLINE_LEN {
            dst.put_u8(mask_bit | len as u8);
        } else if len <= u16::MAX as usize {
            dst.put_u8(mask_bit | LEN_16_MARKER);
            dst.put_u16(len as u16);
        } else {
            let len = len as u64;
            // RFC 6455 5.2: the most significant bit MUST be 0
            if len & (1 << 63) != 0 {
                return Err(ProtocolError::FrameTooLarge(len));
            }
            dst.put_u8(mask_bit | LEN_64_MARKER);
            dst.put_u64(len);
        }
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::client()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 2 {
            return Ok(None);
        }

        let first = src[0];
        let second = src[1];

        let fin = first & FIN_BIT != 0;
        let opcode = Opcode::from_u8(first & 0x0F)
            .ok_or(ProtocolError::InvalidOpcode(first & 0x0F))?;
        let masked = second & MASK_BIT != 0;

        let (ext_len, payload_len) = match second & 0x7F {
            LEN_16_MARKER => {
                if src.len() < 4 {
                    return Ok(None);
                }
                (2, u16::from_be_bytes([src[2], src[3]]) as u64)
            }
            LEN_64_MARKER => {
                if src.len() < 10 {
                    return Ok(None);
                }
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&src[2..10]);
                let len = u64::from_be_bytes(raw);
                if len & (1 << 63) != 0 {
                    return Err(ProtocolError::FrameTooLarge(len));
                }
                (8, len)
            }
            len => (0, len as u64),
        };

        if payload_len > self.max_frame_size as u64 {
            return Err(ProtocolError::MessageTooLarge {
                size: payload_len,
                max: self.max_frame_size,
            });
        }
        let payload_len = payload_len as usize;

        let mask_len = if masked { 4 } else { 0 };
        let header_len = 2 + ext_len + mask_len;
        if src.len() < header_len + payload_len {
            src.reserve(header_len + payload_len - src.len());
            return Ok(None);
        }

        src.advance(2 + ext_len);
        let mask = if masked {
            let mut key = [0u8; 4];
            src.copy_to_slice(&mut key);
            Some(key)
        } else {
            None
        };

        let mut payload = src.split_to(payload_len);
        if let Some(key) = mask {
            apply_mask(&mut payload, key);
        }

        Ok(Some(Frame {
            fin,
            opcode,
            payload: payload.freeze(),
        }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let masked = self.role == Role::Client;
        let len = item.payload.len();

        dst.reserve(2 + 8 + 4 + len);
        dst.put_u8(item.header_byte());
        Self::write_header(len, masked, dst)?;

        if masked {
            let key: [u8; 4] = rand::random();
            dst.put_slice(&key);
            let start = dst.len();
            dst.put_slice(&item.payload);
            apply_mask(&mut dst[start..], key);
        } else {
            dst.put_slice(&item.payload);
        }

        Ok(())
    }
}
