//! Pluggable request/response serializers.
//!
//! A [`Serializer`] turns a native [`Value`] into the bytes of a request body and
//! back. Every serializer is identified by the MIME type it writes into the
//! envelope header. The [`SerializerRegistry`] owned by each message template
//! holds the registered serializers and knows which one is the default.
//!
//! Two implementations ship with the crate:
//!
//! - [`GraphSon3`]: type-tagged GraphSON 3.0 (`application/vnd.gremlin-v3.0+json`)
//! - [`JsonSerializer`]: untagged JSON (`application/json`)

pub mod graphson;
pub mod json;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::driver::message::RequestMessage;
use crate::driver::types::Value;
use crate::driver::{DriverError, DriverResult};

pub use graphson::GraphSon3;
pub use json::JsonSerializer;

/// Serializer errors.
#[derive(Error, Debug)]
pub enum SerializerError {
    /// Value outside the closed type set
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// Wire document does not follow the format rules
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// JSON parse or write failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for serializer operations.
pub type SerializerResult<T> = Result<T, SerializerError>;

/// Request/response body serializer.
pub trait Serializer: Send + Sync + fmt::Debug {
    /// Short name, e.g. `"GRAPHSON3"`.
    fn name(&self) -> &str;

    /// MIME type written into the envelope header.
    fn mime_type(&self) -> &str;

    /// Serialize a value.
    fn serialize(&self, value: &Value) -> SerializerResult<Vec<u8>>;

    /// Deserialize a response body.
    fn deserialize(&self, data: &[u8]) -> SerializerResult<Value>;

    /// Serialize a request message.
    ///
    /// The default treats the request as its plain field map.
    fn serialize_request(&self, request: &RequestMessage) -> SerializerResult<Vec<u8>> {
        self.serialize(&request.to_value())
    }
}

/// Serializers keyed by MIME type, one of them the default.
#[derive(Debug, Clone, Default)]
pub struct SerializerRegistry {
    serializers: Vec<Arc<dyn Serializer>>,
    default: Option<usize>,
}

impl SerializerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a serializer, replacing any previous one with the same MIME type.
    ///
    /// When `default` is set the serializer becomes the only default.
    pub fn register(&mut self, serializer: Arc<dyn Serializer>, default: bool) {
        let index = match self
            .serializers
            .iter()
            .position(|s| s.mime_type() == serializer.mime_type())
        {
            Some(index) => {
                self.serializers[index] = serializer;
                index
            }
            None => {
                self.serializers.push(serializer);
                self.serializers.len() - 1
            }
        };

        if default {
            self.default = Some(index);
        }
    }

    /// The default serializer.
    pub fn default_serializer(&self) -> DriverResult<&dyn Serializer> {
        self.default
            .and_then(|index| self.serializers.get(index))
            .map(|s| &**s)
            .ok_or(DriverError::NoDefaultSerializer)
    }

    /// Look up by MIME type. An empty MIME type returns the default.
    pub fn get(&self, mime_type: &str) -> DriverResult<&dyn Serializer> {
        if mime_type.is_empty() {
            return self.default_serializer();
        }
        self.serializers
            .iter()
            .find(|s| s.mime_type() == mime_type)
            .map(|s| &**s)
            .ok_or_else(|| DriverError::no_serializer(mime_type))
    }

    /// Registered MIME types in registration order.
    pub fn mime_types(&self) -> impl Iterator<Item = &str> {
        self.serializers.iter().map(|s| s.mime_type())
    }

    /// Number of registered serializers.
    pub fn len(&self) -> usize {
        self.serializers.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.serializers.is_empty()
    }
}
