use bson::oid::ObjectId;
use bson::{Bson, Document};
use std::collections::BTreeMap;

// ============================================================================
// Wire Values - typed intermediate form of untyped wire documents
// ============================================================================
//
// Both BSON and JSON decoders produce a WireMap. Field coercions (see
// coerce.rs) are then applied against these variants instead of inspecting
// types at run time.
//
// ============================================================================

/// Numeric value as it was found on the wire, before any width coercion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireNumber {
    Int(i64),
    UInt(u64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Null,
    Bool(bool),
    Number(WireNumber),
    String(String),
    ObjectId(ObjectId),
    Document(WireMap),
    Array(Vec<WireValue>),
    /// A BSON type no field of this system can hold (binary, regex, ...).
    Unsupported(&'static str),
}

impl WireValue {
    /// Short name of the variant, used in type-assertion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            WireValue::Null => "null",
            WireValue::Bool(_) => "bool",
            WireValue::Number(WireNumber::Int(_)) | WireValue::Number(WireNumber::UInt(_)) => {
                "integer"
            }
            WireValue::Number(WireNumber::Float(_)) => "float",
            WireValue::String(_) => "string",
            WireValue::ObjectId(_) => "objectId",
            WireValue::Document(_) => "document",
            WireValue::Array(_) => "array",
            WireValue::Unsupported(name) => name,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null)
    }
}

impl From<Bson> for WireValue {
    fn from(value: Bson) -> Self {
        match value {
            Bson::Null | Bson::Undefined => WireValue::Null,
            Bson::Boolean(b) => WireValue::Bool(b),
            Bson::Int32(i) => WireValue::Number(WireNumber::Int(i64::from(i))),
            Bson::Int64(i) => WireValue::Number(WireNumber::Int(i)),
            Bson::Double(f) => WireValue::Number(WireNumber::Float(f)),
            Bson::String(s) => WireValue::String(s),
            Bson::ObjectId(oid) => WireValue::ObjectId(oid),
            Bson::Document(doc) => WireValue::Document(WireMap::from_bson(doc)),
            Bson::Array(items) => {
                WireValue::Array(items.into_iter().map(WireValue::from).collect())
            }
            Bson::Binary(_) => WireValue::Unsupported("binary"),
            Bson::DateTime(_) => WireValue::Unsupported("datetime"),
            Bson::Timestamp(_) => WireValue::Unsupported("timestamp"),
            Bson::RegularExpression(_) => WireValue::Unsupported("regex"),
            Bson::Decimal128(_) => WireValue::Unsupported("decimal128"),
            _ => WireValue::Unsupported("unsupported"),
        }
    }
}

impl From<serde_json::Value> for WireValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => WireValue::Null,
            Value::Bool(b) => WireValue::Bool(b),
            Value::Number(n) => {
                let number = if let Some(i) = n.as_i64() {
                    WireNumber::Int(i)
                } else if let Some(u) = n.as_u64() {
                    WireNumber::UInt(u)
                } else {
                    WireNumber::Float(n.as_f64().unwrap_or(f64::NAN))
                };
                WireValue::Number(number)
            }
            Value::String(s) => WireValue::String(s),
            Value::Array(items) => {
                WireValue::Array(items.into_iter().map(WireValue::from).collect())
            }
            Value::Object(map) => WireValue::Document(WireMap::from_json(map)),
        }
    }
}

/// String-keyed document of wire values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireMap {
    entries: BTreeMap<String, WireValue>,
}

impl WireMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bson(doc: Document) -> Self {
        doc.into_iter().map(|(k, v)| (k, WireValue::from(v))).collect()
    }

    pub fn from_json(map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.into_iter().map(|(k, v)| (k, WireValue::from(v))).collect()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: WireValue) -> Option<WireValue> {
        self.entries.insert(key.into(), value)
    }

    /// Value stored under `key`, treating an explicit null the same as a
    /// missing key.
    pub fn present(&self, key: &str) -> Option<&WireValue> {
        self.entries.get(key).filter(|v| !v.is_null())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &WireValue)> {
        self.entries.iter()
    }
}

impl FromIterator<(String, WireValue)> for WireMap {
    fn from_iter<I: IntoIterator<Item = (String, WireValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde_json::json;

    #[test]
    fn test_bson_numbers_widen() {
        let map = WireMap::from_bson(doc! { "a": 7_i32, "b": 8_i64, "c": 1.5 });
        assert_eq!(map.present("a"), Some(&WireValue::Number(WireNumber::Int(7))));
        assert_eq!(map.present("b"), Some(&WireValue::Number(WireNumber::Int(8))));
        assert_eq!(map.present("c"), Some(&WireValue::Number(WireNumber::Float(1.5))));
    }

    #[test]
    fn test_json_numbers_keep_their_shape() {
        let serde_json::Value::Object(obj) = json!({
            "int": -3,
            "big": u64::MAX,
            "float": 2.25,
        }) else {
            panic!("expected object");
        };
        let map = WireMap::from_json(obj);

        assert_eq!(map.present("int"), Some(&WireValue::Number(WireNumber::Int(-3))));
        assert_eq!(map.present("big"), Some(&WireValue::Number(WireNumber::UInt(u64::MAX))));
        assert_eq!(map.present("float"), Some(&WireValue::Number(WireNumber::Float(2.25))));
    }

    #[test]
    fn test_null_counts_as_absent() {
        let map = WireMap::from_bson(doc! { "lot": Bson::Null });
        assert_eq!(map.len(), 1);
        assert!(map.present("lot").is_none());
        assert!(map.present("missing").is_none());
    }

    #[test]
    fn test_nested_documents_and_unsupported_types() {
        let map = WireMap::from_bson(doc! {
            "inner": { "x": "y" },
            "when": bson::DateTime::now(),
        });

        match map.present("inner") {
            Some(WireValue::Document(inner)) => {
                assert_eq!(inner.present("x"), Some(&WireValue::String("y".to_string())));
            }
            other => panic!("expected nested document, got {:?}", other),
        }
        assert_eq!(map.present("when").map(WireValue::type_name), Some("datetime"));
    }
}
