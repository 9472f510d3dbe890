//! Mock Server
//!
//! 테스트용 인메모리 Gremlin 서버. `tokio::io::duplex` 위에서 업그레이드를
//! 수락하고, 마스킹된 클라이언트 프레임을 읽어 요청을 해석하며, 스크립트된
//! GraphSON3 응답을 돌려줍니다.

use bytes::BytesMut;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_util::codec::{Decoder, Encoder};

use super::types::{Map, MapKey, Value};
use crate::protocol::frame::{Frame, FrameCodec, Opcode};
use crate::protocol::handshake::{compute_accept_key, find_header_end};
use crate::protocol::envelope;
use crate::serializer::graphson::{GraphSon3, MIME_TYPE};
use crate::serializer::Serializer;

/// 클라이언트 측 스트림과 서버 쌍 생성
pub(crate) fn pair() -> (DuplexStream, MockServer) {
    let (client, server) = duplex(64 * 1024);
    (client, MockServer::new(server))
}

/// 수신한 요청
#[derive(Debug, Clone)]
pub(crate) struct Request {
    /// 요청 envelope 의 MIME 타입
    pub mime: String,
    /// 역직렬화된 요청 문서
    pub body: Value,
}

impl Request {
    pub fn request_id(&self) -> String {
        self.body
            .get("requestId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    pub fn op(&self) -> &str {
        self.body.get("op").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn processor(&self) -> &str {
        self.body.get("processor").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.body.get("args").and_then(|args| args.get(name))
    }

    pub fn gremlin(&self) -> Option<&str> {
        self.arg("gremlin").and_then(Value::as_str)
    }
}

/// 스크립트 서버
pub(crate) struct MockServer {
    stream: DuplexStream,
    codec: FrameCodec,
    buffer: BytesMut,
}

impl MockServer {
    fn new(stream: DuplexStream) -> Self {
        Self {
            stream,
            codec: FrameCodec::server(),
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// 업그레이드 요청을 읽고 101 로 응답
    pub async fn accept(&mut self) {
        let end = loop {
            if let Some(end) = find_header_end(&self.buffer) {
                break end;
            }
            let n = self.stream.read_buf(&mut self.buffer).await.unwrap();
            assert!(n > 0, "client closed before upgrade");
        };
        let header = self.buffer.split_to(end);
        let text = String::from_utf8_lossy(&header);
        assert!(text.starts_with("GET "), "not an upgrade request: {}", text);

        let key = text
            .split("\r\n")
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("Sec-WebSocket-Key"))
            .map(|(_, value)| value.trim().to_string())
            .unwrap();

        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n\r\n",
            compute_accept_key(&key)
        );
        self.stream.write_all(response.as_bytes()).await.unwrap();
    }

    /// 다음 프레임 (클라이언트가 끊으면 `None`)
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buffer).unwrap() {
                return Some(frame);
            }
            match self.stream.read_buf(&mut self.buffer).await {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }

    /// 다음 요청 프레임 해석
    pub async fn recv_request(&mut self) -> Request {
        let frame = self.recv_frame().await.expect("client disconnected");
        assert_eq!(frame.opcode, Opcode::Binary);
        let (mime, body) = envelope::unpack(&frame.payload).unwrap();
        Request {
            mime: mime.to_string(),
            body: GraphSon3::new().deserialize(body).unwrap(),
        }
    }

    /// 프레임 전송
    pub async fn send_frame(&mut self, frame: Frame) {
        let mut out = BytesMut::new();
        self.codec.encode(frame, &mut out).unwrap();
        self.stream.write_all(&out).await.unwrap();
    }

    /// 응답 전송 (envelope 헤더 없이)
    pub async fn respond(&mut self, request_id: &str, code: u16, data: Value) {
        self.respond_with(request_id, code, "", Map::new(), data).await;
    }

    /// 메시지와 속성을 지정해 응답 전송
    pub async fn respond_with(
        &mut self,
        request_id: &str,
        code: u16,
        message: &str,
        attributes: Map,
        data: Value,
    ) {
        let body = response_body(request_id, code, message, attributes, data);
        self.send_frame(Frame::binary(body)).await;
    }

    /// envelope 헤더를 붙여 응답 전송
    pub async fn respond_enveloped(&mut self, request_id: &str, code: u16, data: Value) {
        let body = response_body(request_id, code, "", Map::new(), data);
        let payload = envelope::pack(MIME_TYPE, &body).unwrap();
        self.send_frame(Frame::binary(payload)).await;
    }
}

/// GraphSON3 응답 문서 생성
pub(crate) fn response_body(
    request_id: &str,
    code: u16,
    message: &str,
    attributes: Map,
    data: Value,
) -> Vec<u8> {
    let mut status = Map::new();
    status.insert("message".into(), Value::from(message));
    status.insert("code".into(), Value::Int(i64::from(code)));
    status.insert("attributes".into(), Value::Map(attributes));

    let mut result = Map::new();
    result.insert("data".into(), data);
    result.insert("meta".into(), Value::empty_map());

    let mut document = Map::new();
    document.insert(MapKey::from("requestId"), Value::from(request_id));
    document.insert(MapKey::from("status"), Value::Map(status));
    document.insert(MapKey::from("result"), Value::Map(result));

    GraphSon3::new().serialize(&Value::Map(document)).unwrap()
}
