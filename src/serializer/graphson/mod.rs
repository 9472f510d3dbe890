//! GraphSON 3.0 serializer.
//!
//! GraphSON is JSON in which every value that JSON cannot express natively is
//! wrapped as `{"@type": <tag>, "@value": <payload>}`. Strings, booleans and null
//! travel untagged; numbers, collections and graph elements are tagged.
//!
//! ## Encoding
//!
//! | Native | Wire |
//! |--------|------|
//! | `Int` | `g:Int64` (`g:Int32` on 32-bit hosts) |
//! | `Float` | `g:Double` |
//! | `List`, or `Map` keyed `0..n-1` | `g:List` |
//! | any other `Map` | `g:Map`, flat `[k, v, ...]` |
//!
//! ## Decoding
//!
//! Graph elements decode to maps: vertices and edges gain a synthetic `type`
//! field, paths become `{labels, objects}`, and trees become maps keyed by node id
//! whose entries are `{key: node, value: subtree}`.

pub mod decoder;
pub mod encoder;

use serde_json::Value as Json;

use crate::driver::message::RequestMessage;
use crate::driver::types::Value;
use crate::serializer::{Serializer, SerializerResult};

pub use decoder::deconvert;
pub use encoder::{convert, NATIVE_INT_TYPE};

/// MIME type for GraphSON 3.0
pub const MIME_TYPE: &str = "application/vnd.gremlin-v3.0+json";

/// Tag key
pub const TYPE_KEY: &str = "@type";

/// Payload key
pub const VALUE_KEY: &str = "@value";

/// GraphSON 3.0 type tags.
pub mod tags {
    /// 32-bit integer
    pub const INT32: &str = "g:Int32";
    /// 64-bit integer
    pub const INT64: &str = "g:Int64";
    /// Single-precision float
    pub const FLOAT: &str = "g:Float";
    /// Double-precision float
    pub const DOUBLE: &str = "g:Double";
    /// Milliseconds since the epoch
    pub const DATE: &str = "g:Date";
    /// Milliseconds since the epoch
    pub const TIMESTAMP: &str = "g:Timestamp";
    /// UUID string
    pub const UUID: &str = "g:UUID";
    /// Ordered list
    pub const LIST: &str = "g:List";
    /// Set, decoded as a list
    pub const SET: &str = "g:Set";
    /// Flat key/value pair list
    pub const MAP: &str = "g:Map";
    /// Graph vertex
    pub const VERTEX: &str = "g:Vertex";
    /// Graph edge
    pub const EDGE: &str = "g:Edge";
    /// Edge property
    pub const PROPERTY: &str = "g:Property";
    /// Vertex property
    pub const VERTEX_PROPERTY: &str = "g:VertexProperty";
    /// Traversal path
    pub const PATH: &str = "g:Path";
    /// Traversal tree
    pub const TREE: &str = "g:Tree";
    /// Value/bulk pairs
    pub const BULK_SET: &str = "g:BulkSet";
    /// Token enum (`id`, `label`, ...)
    pub const T: &str = "g:T";
    /// Edge direction (`OUT`, `IN`, `BOTH`)
    pub const DIRECTION: &str = "g:Direction";
}

/// GraphSON 3.0 serializer.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphSon3;

impl GraphSon3 {
    /// Create a serializer.
    pub fn new() -> Self {
        Self
    }

    /// Native value to tagged JSON.
    pub fn convert(&self, value: &Value) -> SerializerResult<Json> {
        encoder::convert(value)
    }

    /// Tagged JSON to native value.
    pub fn deconvert(&self, json: &Json) -> SerializerResult<Value> {
        decoder::deconvert(json)
    }
}

impl Serializer for GraphSon3 {
    fn name(&self) -> &str {
        "GRAPHSON3"
    }

    fn mime_type(&self) -> &str {
        MIME_TYPE
    }

    fn serialize(&self, value: &Value) -> SerializerResult<Vec<u8>> {
        Ok(serde_json::to_vec(&encoder::convert(value)?)?)
    }

    fn deserialize(&self, data: &[u8]) -> SerializerResult<Value> {
        let json: Json = serde_json::from_slice(data)?;
        decoder::deconvert(&json)
    }

    fn serialize_request(&self, request: &RequestMessage) -> SerializerResult<Vec<u8>> {
        Ok(serde_json::to_vec(&encoder::convert_request(request)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::types::{Map, MapKey};

    fn roundtrip(value: Value) {
        let ser = GraphSon3::new();
        assert_eq!(ser.deconvert(&ser.convert(&value).unwrap()).unwrap(), value);

        let bytes = ser.serialize(&value).unwrap();
        assert_eq!(ser.deserialize(&bytes).unwrap(), value);
    }

    #[test]
    fn test_roundtrip_scalars() {
        roundtrip(Value::Null);
        roundtrip(Value::Bool(true));
        roundtrip(Value::Int(i64::MAX));
        roundtrip(Value::Int(-42));
        roundtrip(Value::Float(5.3));
        roundtrip(Value::from("héllo"));
    }

    #[test]
    fn test_roundtrip_collections() {
        roundtrip(Value::List(vec![]));
        roundtrip(Value::from(vec![Value::Int(1), Value::from("a"), Value::Null]));

        let mut map = Map::new();
        map.insert(MapKey::Int(2), Value::from("x"));
        map.insert(MapKey::Int(7), Value::from(vec![1.5, 2.5]));
        map.insert("name".into(), Value::Bool(false));
        let mut outer = Map::new();
        outer.insert("inner".into(), Value::Map(map));
        outer.insert("empty".into(), Value::empty_map());
        roundtrip(Value::Map(outer));
    }

    #[test]
    fn test_serializer_identity() {
        let ser = GraphSon3::new();
        assert_eq!(ser.name(), "GRAPHSON3");
        assert_eq!(ser.mime_type(), "application/vnd.gremlin-v3.0+json");
    }

    #[test]
    fn test_serialize_request_bytes() {
        let mut request = RequestMessage::new("eval", "session");
        request.args.insert("gremlin".to_string(), Value::from("g.V().count()"));

        let bytes = GraphSon3::new().serialize_request(&request).unwrap();
        let json: Json = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["processor"], Json::from("session"));
        assert_eq!(json["args"][TYPE_KEY], Json::from(tags::MAP));
    }

    #[test]
    fn test_deserialize_response_document() {
        let body = br#"{
            "requestId": "41d2e28a-20a4-4ab0-b379-d810dede3786",
            "status": {"message": "", "code": 200, "attributes": {"@type": "g:Map", "@value": []}},
            "result": {"data": {"@type": "g:List", "@value": [{"@type": "g:Int64", "@value": 6}]},
                       "meta": {"@type": "g:Map", "@value": []}}
        }"#;
        let value = GraphSon3::new().deserialize(body).unwrap();
        assert_eq!(
            value.get("status").and_then(|s| s.get("code")),
            Some(&Value::Int(200))
        );
        assert_eq!(
            value.get("result").and_then(|r| r.get("data")),
            Some(&Value::from(vec![6]))
        );
    }

    #[test]
    fn test_invalid_json() {
        assert!(GraphSon3::new().deserialize(b"{not json").is_err());
    }
}
