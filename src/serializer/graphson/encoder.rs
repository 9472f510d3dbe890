//! GraphSON 3.0 encoder: native values to tagged JSON.

use serde_json::{Map as JsonMap, Number, Value as Json};

use super::{tags, TYPE_KEY, VALUE_KEY};
use crate::driver::message::RequestMessage;
use crate::driver::types::{Map, MapKey, Value};
use crate::serializer::{SerializerError, SerializerResult};

/// Integer tag for this host's native integer width.
#[cfg(target_pointer_width = "32")]
pub const NATIVE_INT_TYPE: &str = tags::INT32;

/// Integer tag for this host's native integer width.
#[cfg(not(target_pointer_width = "32"))]
pub const NATIVE_INT_TYPE: &str = tags::INT64;

/// Wrap a payload as `{"@type": tag, "@value": value}`.
pub fn typed(tag: &str, value: Json) -> Json {
    let mut obj = JsonMap::with_capacity(2);
    obj.insert(TYPE_KEY.to_string(), Json::String(tag.to_string()));
    obj.insert(VALUE_KEY.to_string(), value);
    Json::Object(obj)
}

/// Convert any supported value.
pub fn convert(value: &Value) -> SerializerResult<Json> {
    match value {
        Value::Null => Ok(Json::Null),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::String(s) => Ok(Json::String(s.clone())),
        Value::Int(i) => Ok(convert_integer(*i)),
        Value::Float(f) => convert_double(*f),
        Value::List(items) => convert_list(items),
        Value::Map(map) if is_sequential(map) => convert_list(map.values()),
        Value::Map(map) => convert_map(map),
    }
}

/// Integer, tagged by native width rather than magnitude.
pub fn convert_integer(value: i64) -> Json {
    typed(NATIVE_INT_TYPE, Json::Number(value.into()))
}

/// Double. Non-finite values have no JSON number form.
pub fn convert_double(value: f64) -> SerializerResult<Json> {
    let number = Number::from_f64(value).ok_or_else(|| {
        SerializerError::UnsupportedType(format!("non-finite double {}", value))
    })?;
    Ok(typed(tags::DOUBLE, Json::Number(number)))
}

/// `g:List` from any sequence of values.
pub fn convert_list<'a, I>(items: I) -> SerializerResult<Json>
where
    I: IntoIterator<Item = &'a Value>,
{
    let items = items
        .into_iter()
        .map(convert)
        .collect::<SerializerResult<Vec<_>>>()?;
    Ok(typed(tags::LIST, Json::Array(items)))
}

/// `g:Map` as a flat `[k0, v0, k1, v1, ...]` array in iteration order.
pub fn convert_map(map: &Map) -> SerializerResult<Json> {
    let mut flat = Vec::with_capacity(map.len() * 2);
    for (key, value) in map {
        flat.push(convert_key(key));
        flat.push(convert(value)?);
    }
    Ok(typed(tags::MAP, Json::Array(flat)))
}

/// Request message: the top-level object stays untagged, its fields are converted.
pub fn convert_request(request: &RequestMessage) -> SerializerResult<Json> {
    let fields = match request.to_value() {
        Value::Map(fields) => fields,
        other => {
            return Err(SerializerError::UnsupportedType(format!(
                "request must be a map, got {}",
                other.type_name()
            )))
        }
    };

    let mut obj = JsonMap::with_capacity(fields.len());
    for (key, value) in &fields {
        obj.insert(key.to_string(), convert(value)?);
    }
    Ok(Json::Object(obj))
}

fn convert_key(key: &MapKey) -> Json {
    match key {
        MapKey::String(s) => Json::String(s.clone()),
        MapKey::Int(i) => convert_integer(*i),
    }
}

/// Non-empty map whose keys are exactly `0..n-1` in order.
pub fn is_sequential(map: &Map) -> bool {
    !map.is_empty()
        && map
            .keys()
            .enumerate()
            .all(|(i, key)| key.as_int() == Some(i as i64))
}
