//! Request Message
//!
//! 요청 메시지 템플릿과 직렬화기 레지스트리

use std::sync::Arc;

use bytes::Bytes;
use indexmap::IndexMap;
use uuid::Uuid;

use super::error::DriverResult;
use super::types::{Map, MapKey, Value};
use crate::protocol::envelope;
use crate::serializer::{Serializer, SerializerRegistry};

/// 요청 인자 맵
pub type Args = IndexMap<String, Value>;

/// 기본 op
pub const DEFAULT_OP: &str = "eval";

// ============================================================================
// RequestMessage - 직렬화 대상 요청
// ============================================================================

/// 직렬화 대상 요청
///
/// 전송 직전에 [`Message`] 템플릿에서 만들어지며 요청마다 새 UUID 를 가집니다.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMessage {
    /// 요청 ID
    pub request_id: Uuid,
    /// 프로세서 ("" 또는 "session")
    pub processor: String,
    /// op
    pub op: String,
    /// 인자
    pub args: Args,
}

impl RequestMessage {
    /// 새 요청 생성
    pub fn new(op: impl Into<String>, processor: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            processor: processor.into(),
            op: op.into(),
            args: Args::new(),
        }
    }

    /// `{requestId, processor, op, args}` 맵으로 변환
    pub fn to_value(&self) -> Value {
        let args: Map = self
            .args
            .iter()
            .map(|(k, v)| (MapKey::from(k.as_str()), v.clone()))
            .collect();

        let mut map = Map::with_capacity(4);
        map.insert("requestId".into(), Value::String(self.request_id.to_string()));
        map.insert("processor".into(), Value::String(self.processor.clone()));
        map.insert("op".into(), Value::String(self.op.clone()));
        map.insert("args".into(), Value::Map(args));
        Value::Map(map)
    }
}

// ============================================================================
// Message - 요청 템플릿
// ============================================================================

/// 요청 템플릿
///
/// 쿼리, op, 프로세서, 인자를 담고 있으며 전송 후 [`Message::clear`] 로
/// 초기화됩니다. 직렬화기 레지스트리는 초기화되지 않습니다.
#[derive(Debug, Clone)]
pub struct Message {
    /// Gremlin 쿼리
    pub gremlin: Option<String>,
    /// op
    pub op: String,
    /// 프로세서
    pub processor: String,
    /// 추가 인자
    args: Args,
    /// 마지막으로 만든 요청 ID
    request_id: Option<Uuid>,
    /// 직렬화기 레지스트리
    serializers: SerializerRegistry,
}

impl Message {
    /// 빈 템플릿 생성
    pub fn new() -> Self {
        Self::with_registry(SerializerRegistry::new())
    }

    /// 레지스트리를 지정해 생성
    pub fn with_registry(serializers: SerializerRegistry) -> Self {
        Self {
            gremlin: None,
            op: DEFAULT_OP.to_string(),
            processor: String::new(),
            args: Args::new(),
            request_id: None,
            serializers,
        }
    }

    /// 인자 병합 (같은 키는 덮어씀)
    pub fn set_arguments(&mut self, args: Args) {
        self.args.extend(args);
    }

    /// 단일 인자 설정
    pub fn set_argument(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.args.insert(key.into(), value.into());
    }

    /// 인자 조회
    pub fn argument(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }

    /// 전체 인자
    pub fn args(&self) -> &Args {
        &self.args
    }

    /// `bindings` 인자에 값 바인딩
    pub fn bind_value(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let bindings = self
            .args
            .entry("bindings".to_string())
            .or_insert_with(Value::empty_map);
        if !matches!(bindings, Value::Map(_)) {
            *bindings = Value::empty_map();
        }
        if let Value::Map(map) = bindings {
            map.insert(MapKey::String(name.into()), value.into());
        }
    }

    /// 템플릿 초기화 (레지스트리는 유지)
    pub fn clear(&mut self) {
        self.gremlin = None;
        self.op = DEFAULT_OP.to_string();
        self.processor.clear();
        self.args.clear();
        self.request_id = None;
    }

    /// 직렬화기 등록
    pub fn register_serializer(&mut self, serializer: Arc<dyn Serializer>, default: bool) {
        self.serializers.register(serializer, default);
    }

    /// MIME 타입으로 직렬화기 조회 ("" 이면 기본값)
    pub fn serializer(&self, mime_type: &str) -> DriverResult<&dyn Serializer> {
        self.serializers.get(mime_type)
    }

    /// 레지스트리
    pub fn registry(&self) -> &SerializerRegistry {
        &self.serializers
    }

    /// 마지막 요청 ID
    pub fn request_id(&self) -> Option<Uuid> {
        self.request_id
    }

    /// 새 요청 ID 로 요청 생성
    pub fn to_request(&mut self) -> RequestMessage {
        let request_id = Uuid::new_v4();
        self.request_id = Some(request_id);

        let mut args = Args::with_capacity(self.args.len() + 1);
        if let Some(gremlin) = &self.gremlin {
            args.insert("gremlin".to_string(), Value::String(gremlin.clone()));
        }
        for (key, value) in &self.args {
            args.insert(key.clone(), value.clone());
        }

        RequestMessage {
            request_id,
            processor: self.processor.clone(),
            op: self.op.clone(),
            args,
        }
    }

    /// 기본 직렬화기로 envelope 바이트 생성
    pub fn build_message(&mut self) -> DriverResult<Bytes> {
        let request = self.to_request();
        let serializer = self.serializers.default_serializer()?;
        let body = serializer.serialize_request(&request)?;
        Ok(envelope::pack(serializer.mime_type(), &body)?)
    }

    /// 응답 페이로드 파싱
    ///
    /// `binary` 이면 페이로드 앞의 MIME 헤더로 직렬화기를 고르고, 아니면
    /// 기본 직렬화기를 사용합니다.
    pub fn parse(&self, payload: &[u8], binary: bool) -> DriverResult<Value> {
        if binary {
            let (mime_type, body) = envelope::unpack(payload)?;
            Ok(self.serializers.get(mime_type)?.deserialize(body)?)
        } else {
            Ok(self.serializers.default_serializer()?.deserialize(payload)?)
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverError;
    use crate::serializer::{GraphSon3, JsonSerializer};
    use serde_json::Value as Json;

    fn graphson_message() -> Message {
        let mut message = Message::new();
        message.register_serializer(Arc::new(GraphSon3::new()), true);
        message.register_serializer(Arc::new(JsonSerializer::new()), false);
        message
    }

    #[test]
    fn test_defaults() {
        let message = Message::new();
        assert_eq!(message.op, "eval");
        assert_eq!(message.processor, "");
        assert!(message.gremlin.is_none());
        assert!(message.args().is_empty());
        assert!(message.request_id().is_none());
    }

    #[test]
    fn test_set_arguments_merges() {
        let mut message = Message::new();
        message.set_argument("a", 1);
        let mut args = Args::new();
        args.insert("a".to_string(), Value::Int(2));
        args.insert("b".to_string(), Value::from("x"));
        message.set_arguments(args);

        assert_eq!(message.argument("a"), Some(&Value::Int(2)));
        assert_eq!(message.argument("b"), Some(&Value::from("x")));
    }

    #[test]
    fn test_bind_value() {
        let mut message = Message::new();
        message.bind_value("name", "marko");
        message.bind_value("age", 29);

        let bindings = message.argument("bindings").unwrap();
        assert_eq!(bindings.get("name"), Some(&Value::from("marko")));
        assert_eq!(bindings.get("age"), Some(&Value::Int(29)));
    }

    #[test]
    fn test_clear_keeps_serializers() {
        let mut message = graphson_message();
        message.gremlin = Some("g.V()".to_string());
        message.op = "close".to_string();
        message.processor = "session".to_string();
        message.bind_value("x", 1);
        message.build_message().unwrap();

        message.clear();
        assert!(message.gremlin.is_none());
        assert_eq!(message.op, "eval");
        assert_eq!(message.processor, "");
        assert!(message.args().is_empty());
        assert!(message.request_id().is_none());
        assert_eq!(message.registry().len(), 2);
    }

    #[test]
    fn test_build_without_default_serializer() {
        let mut message = Message::new();
        assert!(matches!(
            message.build_message(),
            Err(DriverError::NoDefaultSerializer)
        ));
    }

    #[test]
    fn test_build_message_envelope() {
        let mut message = graphson_message();
        message.gremlin = Some("g.V(x)".to_string());
        message.bind_value("x", 1);

        let bytes = message.build_message().unwrap();
        let (mime, body) = envelope::unpack(&bytes).unwrap();
        assert_eq!(mime, "application/vnd.gremlin-v3.0+json");

        let json: Json = serde_json::from_slice(body).unwrap();
        assert_eq!(
            json["requestId"],
            Json::from(message.request_id().unwrap().to_string())
        );
        assert_eq!(json["op"], Json::from("eval"));
        // args is a g:Map with gremlin first
        assert_eq!(json["args"]["@value"][0], Json::from("gremlin"));
        assert_eq!(json["args"]["@value"][1], Json::from("g.V(x)"));
    }

    #[test]
    fn test_fresh_request_id_per_build() {
        let mut message = graphson_message();
        message.build_message().unwrap();
        let first = message.request_id();
        message.build_message().unwrap();
        assert_ne!(first, message.request_id());
    }

    #[test]
    fn test_parse_default_and_binary() {
        let message = graphson_message();

        let text = br#"{"status":{"code":{"@type":"g:Int32","@value":200}}}"#;
        let value = message.parse(text, false).unwrap();
        assert_eq!(value.get("status").and_then(|s| s.get("code")), Some(&Value::Int(200)));

        let payload = envelope::pack("application/json", br#"{"n":1}"#).unwrap();
        let value = message.parse(&payload, true).unwrap();
        assert_eq!(value.get("n"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_parse_unknown_mime() {
        let message = graphson_message();
        let payload = envelope::pack("application/x-msgpack", b"\x80").unwrap();
        assert!(matches!(
            message.parse(&payload, true),
            Err(DriverError::NoSerializer { .. })
        ));
    }
}
