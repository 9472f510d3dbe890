//! Buffered WebSocket stream over any async byte transport.
//!
//! Owns the transport, performs the upgrade handshake, and turns the byte
//! stream into whole data messages (reassembling fragments and answering pings).

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use super::error::HandshakeError;
use super::frame::{Frame, FrameCodec, Opcode, DEFAULT_MAX_FRAME_SIZE};
use super::handshake::{find_header_end, UpgradeRequest, UpgradeResponse, MAX_RESPONSE_HEADER_SIZE};
use super::{ProtocolError, ProtocolResult};

/// WebSocket stream state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Transport connected, not upgraded
    Connected,
    /// Upgrade completed, frames may flow
    Open,
    /// Closed locally or by the peer
    Closed,
}

/// Client-side WebSocket stream.
pub struct WebSocketStream<S> {
    /// Underlying transport (TCP, TLS, in-memory)
    stream: S,
    /// Frame codec (client role)
    codec: FrameCodec,
    /// Read buffer
    read_buffer: BytesMut,
    /// Write buffer
    write_buffer: BytesMut,
    /// Per-read deadline
    read_timeout: Option<Duration>,
    /// Reassembled message limit
    max_message_size: usize,
    /// State
    state: StreamState,
}

impl<S> WebSocketStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a connected transport.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            codec: FrameCodec::client(),
            read_buffer: BytesMut::with_capacity(8192),
            write_buffer: BytesMut::with_capacity(8192),
            read_timeout: None,
            max_message_size: DEFAULT_MAX_FRAME_SIZE,
            state: StreamState::Connected,
        }
    }

    /// Set the per-read deadline.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the frame and reassembled message size limit.
    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.codec = FrameCodec::client().with_max_frame_size(max);
        self.max_message_size = max;
        self
    }

    /// Current state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Whether frames may be exchanged.
    pub fn is_open(&self) -> bool {
        self.state == StreamState::Open
    }

    /// Perform the HTTP Upgrade.
    ///
    /// Bytes received after the header block are kept for frame decoding.
    pub async fn handshake(&mut self, request: &UpgradeRequest) -> ProtocolResult<()> {
        if self.state != StreamState::Connected {
            return Err(ProtocolError::InvalidFrame(format!(
                "Cannot handshake in state {:?}",
                self.state
            )));
        }

        self.stream.write_all(&request.to_bytes()).await?;
        self.stream.flush().await?;

        let header_end = loop {
            if let Some(end) = find_header_end(&self.read_buffer) {
                break end;
            }
            if self.read_buffer.len() > MAX_RESPONSE_HEADER_SIZE {
                self.state = StreamState::Closed;
                return Err(HandshakeError::HeaderTooLarge(MAX_RESPONSE_HEADER_SIZE).into());
            }
            self.fill_buffer().await?;
        };

        let header = self.read_buffer.split_to(header_end);
        let response = UpgradeResponse::parse(&header)?;
        if let Err(e) = request.validate(&response) {
            self.state = StreamState::Closed;
            return Err(e.into());
        }

        tracing::debug!(host = %request.host, port = request.port, "websocket upgrade complete");
        self.state = StreamState::Open;
        Ok(())
    }

    /// Write a single frame.
    pub async fn send_frame(&mut self, frame: Frame) -> ProtocolResult<()> {
        if self.state != StreamState::Open {
            return Err(ProtocolError::ConnectionClosed);
        }

        tracing::trace!(opcode = ?frame.opcode, len = frame.payload.len(), "send frame");
        self.write_buffer.clear();
        self.codec.encode(frame, &mut self.write_buffer)?;

        self.stream.write_all(&self.write_buffer).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read a single frame.
    pub async fn recv_frame(&mut self) -> ProtocolResult<Frame> {
        if self.state != StreamState::Open {
            return Err(ProtocolError::ConnectionClosed);
        }

        loop {
            if let Some(frame) = self.codec.decode(&mut self.read_buffer)? {
                tracing::trace!(opcode = ?frame.opcode, len = frame.payload.len(), "recv frame");
                return Ok(frame);
            }
            self.fill_buffer().await?;
        }
    }

    /// Read the next complete data message.
    ///
    /// Pings are answered, pongs dropped, fragments joined. A close frame from
    /// the peer ends the stream.
    pub async fn recv_message(&mut self) -> ProtocolResult<Frame> {
        let mut partial: Option<(Opcode, BytesMut)> = None;

        loop {
            let frame = self.recv_frame().await?;
            match frame.opcode {
                Opcode::Ping => self.send_frame(Frame::pong(frame.payload)).await?,
                Opcode::Pong => {}
                Opcode::Close => {
                    tracing::warn!("server sent close frame");
                    self.state = StreamState::Closed;
                    return Err(ProtocolError::ConnectionClosed);
                }
                Opcode::Text | Opcode::Binary => {
                    if partial.is_some() {
                        return Err(ProtocolError::InvalidFrame(
                            "data frame inside fragmented message".to_string(),
                        ));
                    }
                    if frame.fin {
                        return Ok(frame);
                    }
                    partial = Some((frame.opcode, BytesMut::from(&frame.payload[..])));
                }
                Opcode::Continuation => {
                    let (opcode, mut buf) = partial.take().ok_or_else(|| {
                        ProtocolError::InvalidFrame("continuation without initial frame".to_string())
                    })?;
                    buf.extend_from_slice(&frame.payload);
                    if buf.len() > self.max_message_size {
                        return Err(ProtocolError::MessageTooLarge {
                            size: buf.len() as u64,
                            max: self.max_message_size,
                        });
                    }
                    if frame.fin {
                        return Ok(Frame::new(opcode, buf.freeze()));
                    }
                    partial = Some((opcode, buf));
                }
            }
        }
    }

    /// Send a close frame and shut the transport down.
    ///
    /// The transport is shut down even if the close frame cannot be written;
    /// the write error is returned afterwards.
    pub async fn close(&mut self) -> ProtocolResult<()> {
        let sent = if self.state == StreamState::Open {
            self.send_frame(Frame::close()).await
        } else {
            Ok(())
        };

        self.state = StreamState::Closed;
        let _ = self.stream.shutdown().await;
        sent
    }

    /// Mark the stream unusable without touching the transport.
    pub fn abort(&mut self) {
        self.state = StreamState::Closed;
    }

    async fn fill_buffer(&mut self) -> ProtocolResult<()> {
        if self.read_buffer.capacity() - self.read_buffer.len() < 1024 {
            self.read_buffer.reserve(8192);
        }

        let read = self.stream.read_buf(&mut self.read_buffer);
        let n = match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| ProtocolError::Timeout(limit))??,
            None => read.await?,
        };

        if n == 0 {
            self.state = StreamState::Closed;
            return Err(ProtocolError::ConnectionClosed);
        }
        Ok(())
    }
}

impl<S> std::fmt::Debug for WebSocketStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketStream")
            .field("state", &self.state)
            .field("buffered", &self.read_buffer.len())
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}
