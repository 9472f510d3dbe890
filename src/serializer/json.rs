//! Plain JSON serializer (`application/json`).
//!
//! No type tags: integers and floats are told apart by their JSON form and
//! map keys always come back as strings.

use crate::driver::types::Value;
use crate::serializer::{Serializer, SerializerResult};

/// MIME type for untagged JSON
pub const MIME_TYPE: &str = "application/json";

/// Untagged JSON serializer.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    /// Create a serializer.
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for JsonSerializer {
    fn name(&self) -> &str {
        "JSON"
    }

    fn mime_type(&self) -> &str {
        MIME_TYPE
    }

    fn serialize(&self, value: &Value) -> SerializerResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn deserialize(&self, data: &[u8]) -> SerializerResult<Value> {
        Ok(serde_json::from_slice(data)?)
    }
}
