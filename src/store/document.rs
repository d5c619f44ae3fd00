use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::error::StoreError;

/// A schemaless document: a flat JSON object keyed by camelCase field names.
/// All typed entities cross this boundary through explicit converters.
pub type Document = serde_json::Map<String, Value>;

/// Serializes a typed entity into a [`Document`].
pub fn to_document<T: Serialize>(collection: &str, value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::decode(
            collection,
            format!("expected a JSON object, got {other}"),
        )),
        Err(e) => Err(StoreError::decode(collection, e)),
    }
}

/// Deserializes a [`Document`] into a typed entity.
pub fn from_document<T: DeserializeOwned>(
    collection: &str,
    doc: &Document,
) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(doc.clone())).map_err(|e| StoreError::decode(collection, e))
}

// ============================================================================
// Tolerant field readers
// ============================================================================
//
// Externally-written documents are not trusted to match our serializers
// exactly. These readers accept the reasonable encodings of each type and
// return None for anything else; the caller decides between defaulting and
// rejecting the whole document.

pub fn get_str<'a>(doc: &'a Document, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str)
}

pub fn get_string(doc: &Document, field: &str) -> Option<String> {
    get_str(doc, field).map(str::to_string)
}

pub fn get_bool(doc: &Document, field: &str) -> Option<bool> {
    doc.get(field).and_then(Value::as_bool)
}

/// Accepts a JSON number or a numeric string.
pub fn get_decimal(doc: &Document, field: &str) -> Option<Decimal> {
    match doc.get(field)? {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn get_uuid(doc: &Document, field: &str) -> Option<Uuid> {
    get_str(doc, field).and_then(|s| Uuid::parse_str(s).ok())
}

/// Accepts an RFC 3339 timestamp string.
pub fn get_datetime(doc: &Document, field: &str) -> Option<DateTime<Utc>> {
    get_str(doc, field)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fixture must be an object"),
        }
    }

    #[test]
    fn decimal_reader_accepts_numbers_and_strings() {
        let d = doc(json!({ "a": 0.15, "b": "0.15", "c": 7, "d": true }));
        assert_eq!(get_decimal(&d, "a"), Some(Decimal::new(15, 2)));
        assert_eq!(get_decimal(&d, "b"), Some(Decimal::new(15, 2)));
        assert_eq!(get_decimal(&d, "c"), Some(Decimal::from(7)));
        assert_eq!(get_decimal(&d, "d"), None);
        assert_eq!(get_decimal(&d, "missing"), None);
    }

    #[test]
    fn datetime_reader_parses_rfc3339() {
        let d = doc(json!({ "at": "2025-06-01T10:30:00Z", "bad": "yesterday" }));
        let at = get_datetime(&d, "at").unwrap();
        assert_eq!(at.to_rfc3339(), "2025-06-01T10:30:00+00:00");
        assert_eq!(get_datetime(&d, "bad"), None);
    }

    #[test]
    fn uuid_reader_rejects_garbage() {
        let id = Uuid::new_v4();
        let d = doc(json!({ "id": id.to_string(), "bad": "not-a-uuid" }));
        assert_eq!(get_uuid(&d, "id"), Some(id));
        assert_eq!(get_uuid(&d, "bad"), None);
    }

    #[test]
    fn to_document_rejects_non_objects() {
        assert!(to_document("things", &42u32).is_err());
        let map = to_document("things", &json!({ "x": 1 })).unwrap();
        assert_eq!(map.get("x"), Some(&json!(1)));
    }
}
