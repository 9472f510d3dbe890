//! GraphSON 3.0 decoder: tagged JSON to native values.
//!
//! Dispatch is on the `@type` tag. Untagged JSON is walked recursively so that
//! tagged values nested inside plain objects and arrays are decoded too.

use serde_json::{Map as JsonMap, Number, Value as Json};

use super::{tags, TYPE_KEY, VALUE_KEY};
use crate::driver::types::{Map, MapKey, Value};
use crate::serializer::{SerializerError, SerializerResult};

/// Decode any GraphSON document.
pub fn deconvert(json: &Json) -> SerializerResult<Value> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::String(s) => Ok(Value::String(s.clone())),
        Json::Number(n) => Ok(number(n)),
        Json::Array(items) => deconvert_list(items),
        Json::Object(obj) => match obj.get(TYPE_KEY) {
            Some(Json::String(tag)) => {
                deconvert_typed(tag, obj.get(VALUE_KEY).unwrap_or(&Json::Null))
            }
            _ => deconvert_object(obj).map(Value::Map),
        },
    }
}

/// Decode a tagged payload.
pub fn deconvert_typed(tag: &str, value: &Json) -> SerializerResult<Value> {
    match tag {
        tags::INT32 | tags::INT64 | tags::DATE | tags::TIMESTAMP => {
            integer(tag, value).map(Value::Int)
        }
        tags::DOUBLE | tags::FLOAT => double(tag, value).map(Value::Float),
        tags::UUID | tags::T | tags::DIRECTION => match value {
            Json::String(s) => Ok(Value::String(s.clone())),
            other => Err(invalid(tag, "a string", other)),
        },
        tags::LIST | tags::SET => deconvert_list(array(tag, value)?),
        tags::MAP => deconvert_map(array(tag, value)?).map(Value::Map),
        tags::VERTEX => deconvert_element(object(tag, value)?, "vertex").map(Value::Map),
        tags::EDGE => deconvert_element(object(tag, value)?, "edge").map(Value::Map),
        tags::PROPERTY | tags::VERTEX_PROPERTY => {
            deconvert_object(object(tag, value)?).map(Value::Map)
        }
        tags::PATH => deconvert_path(object(tag, value)?).map(Value::Map),
        tags::TREE => deconvert_tree(array(tag, value)?).map(Value::Map),
        tags::BULK_SET => deconvert_bulk_set(array(tag, value)?),
        other => Err(SerializerError::UnsupportedType(format!(
            "Unsupported GraphSON type {}",
            other
        ))),
    }
}

/// `g:List` / `g:Set` and untagged arrays.
pub fn deconvert_list(items: &[Json]) -> SerializerResult<Value> {
    items
        .iter()
        .map(deconvert)
        .collect::<SerializerResult<Vec<_>>>()
        .map(Value::List)
}

/// `g:Map`: a flat `[k0, v0, k1, v1, ...]` array.
pub fn deconvert_map(items: &[Json]) -> SerializerResult<Map> {
    if items.len() % 2 != 0 {
        return Err(SerializerError::InvalidFormat(format!(
            "g:Map requires an even number of elements, got {}",
            items.len()
        )));
    }

    let mut map = Map::with_capacity(items.len() / 2);
    for pair in items.chunks_exact(2) {
        let key = map_key(deconvert(&pair[0])?)?;
        map.insert(key, deconvert(&pair[1])?);
    }
    Ok(map)
}

/// `g:Vertex` / `g:Edge`: every field decoded, plus a synthetic `type`.
pub fn deconvert_element(obj: &JsonMap<String, Json>, kind: &str) -> SerializerResult<Map> {
    let mut map = deconvert_object(obj)?;
    map.insert("type".into(), Value::from(kind));
    Ok(map)
}

/// `g:Path`: `{labels, objects}`.
pub fn deconvert_path(obj: &JsonMap<String, Json>) -> SerializerResult<Map> {
    let mut map = Map::with_capacity(2);
    for field in ["labels", "objects"] {
        let value = match obj.get(field) {
            Some(json) => deconvert(json)?,
            None => Value::List(Vec::new()),
        };
        map.insert(field.into(), value);
    }
    Ok(map)
}

/// `g:Tree` entries: `[{key, value: <nested g:Tree>}, ...]`.
///
/// The result is keyed by each node's id. Siblings with the same id are merged,
/// their subtrees combined recursively.
pub fn deconvert_tree(entries: &[Json]) -> SerializerResult<Map> {
    let mut tree = Map::with_capacity(entries.len());

    for entry in entries {
        let entry = object(tags::TREE, entry)?;
        let key = deconvert(entry.get("key").unwrap_or(&Json::Null))?;
        let children = match entry.get("value") {
            Some(value) => subtree(value)?,
            None => Map::new(),
        };
        let id = tree_node_id(&key)?;

        let mut node = Map::with_capacity(2);
        node.insert("key".into(), key);
        node.insert("value".into(), Value::Map(children));
        merge_tree_node(&mut tree, id, node);
    }

    Ok(tree)
}

/// Upper bound on the number of elements a `g:BulkSet` may expand to.
pub const MAX_BULK_SET_LEN: usize = 1 << 24;

/// `g:BulkSet`: `[value, bulk, value, bulk, ...]` expanded into a list.
///
/// The expanded length is bounded by [`MAX_BULK_SET_LEN`].
pub fn deconvert_bulk_set(items: &[Json]) -> SerializerResult<Value> {
    if items.len() % 2 != 0 {
        return Err(SerializerError::InvalidFormat(format!(
            "g:BulkSet requires an even number of elements, got {}",
            items.len()
        )));
    }

    let mut list = Vec::new();
    for pair in items.chunks_exact(2) {
        let value = deconvert(&pair[0])?;
        let bulk = match deconvert(&pair[1])? {
            Value::Int(n) => usize::try_from(n).map_err(|_| {
                SerializerError::InvalidFormat(format!(
                    "g:BulkSet bulk must be a non-negative integer, got {}",
                    n
                ))
            })?,
            other => {
                return Err(SerializerError::InvalidFormat(format!(
                    "g:BulkSet bulk must be a non-negative integer, got {}",
                    other
                )))
            }
        };
        if list.len().saturating_add(bulk) > MAX_BULK_SET_LEN {
            return Err(SerializerError::InvalidFormat(format!(
                "g:BulkSet expands past {} elements",
                MAX_BULK_SET_LEN
            )));
        }
        list.extend(std::iter::repeat(value).take(bulk));
    }
    Ok(Value::List(list))
}

fn subtree(json: &Json) -> SerializerResult<Map> {
    match json {
        Json::Null => Ok(Map::new()),
        Json::Array(entries) => deconvert_tree(entries),
        Json::Object(obj) => match obj.get(TYPE_KEY).and_then(Json::as_str) {
            Some(tags::TREE) => deconvert_tree(array(tags::TREE, obj.get(VALUE_KEY).unwrap_or(&Json::Null))?),
            Some(tags::LIST) => {
                let mut merged = Map::new();
                for item in array(tags::LIST, obj.get(VALUE_KEY).unwrap_or(&Json::Null))? {
                    for (id, node) in subtree(item)? {
                        if let Value::Map(node) = node {
                            merge_tree_node(&mut merged, id, node);
                        }
                    }
                }
                Ok(merged)
            }
            _ => Err(invalid(tags::TREE, "a nested tree", json)),
        },
        other => Err(invalid(tags::TREE, "a nested tree", other)),
    }
}

fn merge_tree_node(tree: &mut Map, id: MapKey, mut node: Map) {
    if !matches!(tree.get(&id), Some(Value::Map(_))) {
        tree.insert(id, Value::Map(node));
        return;
    }
    let Some(Value::Map(existing)) = tree.get_mut(&id) else {
        return;
    };

    let incoming = match node.shift_remove(&MapKey::from("value")) {
        Some(Value::Map(children)) => children,
        _ => Map::new(),
    };
    if let Some(key) = node.shift_remove(&MapKey::from("key")) {
        existing.insert("key".into(), key);
    }
    match existing.get_mut(&MapKey::from("value")) {
        Some(Value::Map(children)) => {
            for (child_id, child) in incoming {
                if let Value::Map(child) = child {
                    merge_tree_node(children, child_id, child);
                }
            }
        }
        _ => {
            existing.insert("value".into(), Value::Map(incoming));
        }
    }
}

fn tree_node_id(key: &Value) -> SerializerResult<MapKey> {
    match key {
        Value::Map(map) => match map.get(&MapKey::from("id")) {
            Some(id) => map_key(id.clone()),
            // properties carry no id
            None => Ok(MapKey::String(key.to_string())),
        },
        scalar => map_key(scalar.clone()),
    }
}

fn deconvert_object(obj: &JsonMap<String, Json>) -> SerializerResult<Map> {
    let mut map = Map::with_capacity(obj.len());
    for (key, value) in obj {
        map.insert(MapKey::String(key.clone()), deconvert(value)?);
    }
    Ok(map)
}

fn map_key(key: Value) -> SerializerResult<MapKey> {
    match key {
        Value::String(s) => Ok(MapKey::String(s)),
        Value::Int(i) => Ok(MapKey::Int(i)),
        Value::Float(f) if f.is_finite() => Ok(MapKey::Int(f.trunc() as i64)),
        other => Err(SerializerError::InvalidFormat(format!(
            "map key must be a string or number, got {}",
            other.type_name()
        ))),
    }
}

fn number(n: &Number) -> Value {
    match n.as_i64() {
        Some(i) => Value::Int(i),
        None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
    }
}

fn integer(tag: &str, value: &Json) -> SerializerResult<i64> {
    match value {
        Json::Number(n) => match n.as_i64() {
            Some(i) => Ok(i),
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 => Ok(f as i64),
                _ => Err(invalid(tag, "an integer", value)),
            },
        },
        other => Err(invalid(tag, "an integer", other)),
    }
}

fn double(tag: &str, value: &Json) -> SerializerResult<f64> {
    match value {
        Json::Number(n) => n.as_f64().ok_or_else(|| invalid(tag, "a number", value)),
        Json::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            _ => Err(invalid(tag, "a number", value)),
        },
        other => Err(invalid(tag, "a number", other)),
    }
}

fn array<'a>(tag: &str, value: &'a Json) -> SerializerResult<&'a [Json]> {
    match value {
        Json::Array(items) => Ok(items),
        other => Err(invalid(tag, "an array", other)),
    }
}

fn object<'a>(tag: &str, value: &'a Json) -> SerializerResult<&'a JsonMap<String, Json>> {
    match value {
        Json::Object(obj) => Ok(obj),
        other => Err(invalid(tag, "an object", other)),
    }
}

fn invalid(tag: &str, expected: &str, got: &Json) -> SerializerError {
    SerializerError::InvalidFormat(format!("{} expects {}, got {}", tag, expected, got))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn int64(n: i64) -> Json {
        json!({"@type": "g:Int64", "@value": n})
    }

    fn vertex(id: i64, label: &str) -> Json {
        json!({"@type": "g:Vertex", "@value": {"id": int64(id), "label": label}})
    }

    fn map_of(pairs: Vec<(&str, Value)>) -> Value {
        pairs.into_iter().collect()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(deconvert(&json!("s")).unwrap(), Value::from("s"));
        assert_eq!(deconvert(&json!(false)).unwrap(), Value::Bool(false));
        assert_eq!(deconvert(&Json::Null).unwrap(), Value::Null);
        assert_eq!(deconvert(&int64(5)).unwrap(), Value::Int(5));
        assert_eq!(
            deconvert(&json!({"@type": "g:Int32", "@value": 7})).unwrap(),
            Value::Int(7)
        );
        assert_eq!(
            deconvert(&json!({"@type": "g:Double", "@value": 5.3})).unwrap(),
            Value::Float(5.3)
        );
        assert_eq!(
            deconvert(&json!({"@type": "g:Float", "@value": 2.5})).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(
            deconvert(&json!({"@type": "g:Date", "@value": 1481750076295i64})).unwrap(),
            Value::Int(1481750076295)
        );
        assert_eq!(
            deconvert(&json!({"@type": "g:Timestamp", "@value": 1481750076295i64})).unwrap(),
            Value::Int(1481750076295)
        );
        assert_eq!(
            deconvert(&json!({"@type": "g:UUID", "@value": "41d2e28a-20a4-4ab0-b379-d810dede3786"}))
                .unwrap(),
            Value::from("41d2e28a-20a4-4ab0-b379-d810dede3786")
        );
    }

    #[test]
    fn test_double_special_values() {
        let v = deconvert(&json!({"@type": "g:Double", "@value": "NaN"})).unwrap();
        assert!(v.as_float().unwrap().is_nan());
        assert_eq!(
            deconvert(&json!({"@type": "g:Double", "@value": "-Infinity"})).unwrap(),
            Value::Float(f64::NEG_INFINITY)
        );
    }

    #[test]
    fn test_list_and_set() {
        let list = json!({"@type": "g:List", "@value": [int64(1), "a", {"@type": "g:Set", "@value": [true]}]});
        assert_eq!(
            deconvert(&list).unwrap(),
            Value::List(vec![
                Value::Int(1),
                Value::from("a"),
                Value::List(vec![Value::Bool(true)])
            ])
        );
    }

    #[test]
    fn test_map() {
        let map = json!({"@type": "g:Map", "@value": [
            int64(0), "lala",
            int64(33), int64(21),
            "key", {"@type": "g:List", "@value": ["x"]}
        ]});
        let decoded = deconvert(&map).unwrap();
        let decoded = decoded.as_map().unwrap();

        let keys: Vec<_> = decoded.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![MapKey::Int(0), MapKey::Int(33), MapKey::from("key")]
        );
        assert_eq!(decoded[&MapKey::Int(33)], Value::Int(21));
        assert_eq!(decoded[&MapKey::from("key")], Value::from(vec!["x"]));
    }

    #[test]
    fn test_map_odd_length_rejected() {
        let map = json!({"@type": "g:Map", "@value": ["a", 1, "b"]});
        assert!(matches!(
            deconvert(&map),
            Err(SerializerError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_map_non_scalar_key_rejected() {
        let list_key = json!({"@type": "g:Map", "@value": [{"@type": "g:List", "@value": []}, "v"]});
        assert!(matches!(
            deconvert(&list_key),
            Err(SerializerError::InvalidFormat(_))
        ));

        let bool_key = json!({"@type": "g:Map", "@value": [true, "v"]});
        assert!(deconvert(&bool_key).is_err());

        let null_key = json!({"@type": "g:Map", "@value": [null, "v"]});
        assert!(deconvert(&null_key).is_err());
    }

    #[test]
    fn test_unsupported_tag() {
        let value = json!({"@type": "g:Unknown", "@value": 1});
        assert!(matches!(
            deconvert(&value),
            Err(SerializerError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_wrong_payload_shape() {
        let value = json!({"@type": "g:List", "@value": "nope"});
        assert!(matches!(
            deconvert(&value),
            Err(SerializerError::InvalidFormat(_))
        ));
        let value = json!({"@type": "g:Int64", "@value": "5"});
        assert!(deconvert(&value).is_err());
    }

    #[test]
    fn test_vertex_with_properties() {
        let json = json!({"@type": "g:Vertex", "@value": {
            "id": int64(1),
            "label": "person",
            "properties": {
                "name": [{"@type": "g:VertexProperty", "@value": {
                    "id": int64(0),
                    "value": "marko",
                    "label": "name"
                }}],
                "age": [{"@type": "g:VertexProperty", "@value": {
                    "id": int64(2),
                    "value": {"@type": "g:Int32", "@value": 29},
                    "label": "age"
                }}]
            }
        }});

        let vertex = deconvert(&json).unwrap();
        assert_eq!(vertex.get("id"), Some(&Value::Int(1)));
        assert_eq!(vertex.get("label"), Some(&Value::from("person")));
        assert_eq!(vertex.get("type"), Some(&Value::from("vertex")));

        let age = &vertex.get("properties").and_then(|p| p.get("age")).unwrap()
            .as_list()
            .unwrap()[0];
        assert_eq!(
            age,
            &map_of(vec![
                ("id", Value::Int(2)),
                ("value", Value::Int(29)),
                ("label", Value::from("age")),
            ])
        );
    }

    #[test]
    fn test_edge() {
        let json = json!({"@type": "g:Edge", "@value": {
            "id": int64(13),
            "label": "develops",
            "inVLabel": "software",
            "outVLabel": "person",
            "inV": int64(10),
            "outV": int64(1),
            "properties": {"since": {"@type": "g:Property", "@value": {
                "key": "since",
                "value": {"@type": "g:Int32", "@value": 2009}
            }}}
        }});

        let edge = deconvert(&json).unwrap();
        assert_eq!(edge.get("type"), Some(&Value::from("edge")));
        assert_eq!(edge.get("inV"), Some(&Value::Int(10)));
        assert_eq!(
            edge.get("properties").and_then(|p| p.get("since")),
            Some(&map_of(vec![
                ("key", Value::from("since")),
                ("value", Value::Int(2009)),
            ]))
        );
    }

    #[test]
    fn test_path() {
        let json = json!({"@type": "g:Path", "@value": {
            "labels": {"@type": "g:List", "@value": [
                {"@type": "g:Set", "@value": ["a"]},
                {"@type": "g:Set", "@value": []}
            ]},
            "objects": {"@type": "g:List", "@value": [vertex(1, "person"), "lop"]}
        }});

        let path = deconvert(&json).unwrap();
        let labels = path.get("labels").and_then(Value::as_list).unwrap();
        assert_eq!(labels[0], Value::from(vec!["a"]));
        let objects = path.get("objects").and_then(Value::as_list).unwrap();
        assert_eq!(objects[0].get("type"), Some(&Value::from("vertex")));
        assert_eq!(objects[1], Value::from("lop"));
    }

    #[test]
    fn test_tree() {
        let leaf = |id: i64| json!({"key": vertex(id, "software"), "value": {"@type": "g:Tree", "@value": []}});
        let json = json!({"@type": "g:List", "@value": [{"@type": "g:Tree", "@value": [
            {"key": vertex(1, "person"), "value": {"@type": "g:Tree", "@value": [leaf(3), leaf(5)]}}
        ]}]});

        let decoded = deconvert(&json).unwrap();
        let trees = decoded.as_list().unwrap();
        assert_eq!(trees.len(), 1);

        let root = trees[0].get(1).unwrap();
        assert_eq!(root.get("key").and_then(|k| k.get("label")), Some(&Value::from("person")));

        let children = root.get("value").and_then(Value::as_map).unwrap();
        assert_eq!(children.len(), 2);
        let child = &children[&MapKey::Int(3)];
        assert_eq!(child.get("key").and_then(|k| k.get("id")), Some(&Value::Int(3)));
        assert_eq!(child.get("value"), Some(&Value::empty_map()));
    }

    #[test]
    fn test_tree_merges_siblings_with_same_id() {
        let branch = |child: i64| {
            json!({"key": vertex(1, "person"), "value": {"@type": "g:Tree", "@value": [
                {"key": vertex(child, "software"), "value": {"@type": "g:Tree", "@value": []}}
            ]}})
        };
        let json = json!({"@type": "g:Tree", "@value": [branch(3), branch(5)]});

        let tree = deconvert(&json).unwrap();
        let tree = tree.as_map().unwrap();
        assert_eq!(tree.len(), 1);

        let children = tree[&MapKey::Int(1)].get("value").and_then(Value::as_map).unwrap();
        let ids: Vec<_> = children.keys().cloned().collect();
        assert_eq!(ids, vec![MapKey::Int(3), MapKey::Int(5)]);
    }

    #[test]
    fn test_tree_scalar_keys() {
        let json = json!({"@type": "g:Tree", "@value": [
            {"key": "marko", "value": {"@type": "g:Tree", "@value": [
                {"key": int64(29), "value": {"@type": "g:Tree", "@value": []}}
            ]}}
        ]});
        let tree = deconvert(&json).unwrap();
        let age = tree
            .get("marko")
            .and_then(|n| n.get("value"))
            .and_then(|c| c.get(29))
            .unwrap();
        assert_eq!(age.get("key"), Some(&Value::Int(29)));
    }

    #[test]
    fn test_bulk_set() {
        let json = json!({"@type": "g:BulkSet", "@value": ["marko", int64(2), "josh", int64(1)]});
        assert_eq!(
            deconvert(&json).unwrap(),
            Value::from(vec!["marko", "marko", "josh"])
        );
    }

    #[test]
    fn test_bulk_set_rejects_oversized_bulk() {
        let json = json!({"@type": "g:BulkSet", "@value": ["x", int64(4_000_000_000)]});
        assert!(matches!(
            deconvert(&json),
            Err(SerializerError::InvalidFormat(_))
        ));

        let half = (MAX_BULK_SET_LEN / 2 + 1) as i64;
        let json = json!({"@type": "g:BulkSet", "@value": ["x", int64(half), "y", int64(half)]});
        assert!(matches!(
            deconvert(&json),
            Err(SerializerError::InvalidFormat(_))
        ));

        let json = json!({"@type": "g:BulkSet", "@value": ["x", int64(-1)]});
        assert!(matches!(
            deconvert(&json),
            Err(SerializerError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_tree_property_keys() {
        let property = |value: f64| {
            json!({"@type": "g:Property", "@value": {"key": "weight", "value": {"@type": "g:Double", "@value": value}}})
        };
        let json = json!({"@type": "g:Tree", "@value": [
            {"key": property(0.5), "value": {"@type": "g:Tree", "@value": []}},
            {"key": property(1.0), "value": {"@type": "g:Tree", "@value": []}},
            {"key": property(0.5), "value": {"@type": "g:Tree", "@value": []}}
        ]});

        let tree = deconvert(&json).unwrap();
        let tree = tree.as_map().unwrap();
        assert_eq!(tree.len(), 2);
        let weights: Vec<_> = tree
            .values()
            .filter_map(|node| node.get("key").and_then(|k| k.get("value")))
            .cloned()
            .collect();
        assert_eq!(weights, vec![Value::Float(0.5), Value::Float(1.0)]);
    }

    #[test]
    fn test_untagged_object_is_walked() {
        let json = json!({"status": {"code": 200}, "data": {"@type": "g:List", "@value": [int64(1)]}});
        let decoded = deconvert(&json).unwrap();
        assert_eq!(decoded.get("status").and_then(|s| s.get("code")), Some(&Value::Int(200)));
        assert_eq!(decoded.get("data"), Some(&Value::from(vec![1])));
    }
}
