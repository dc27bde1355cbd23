//! Schema-less document representation and JSON conversion.
//!
//! Documents are plain [`bson::Document`]s: an ordered mapping from string keys to
//! BSON values. The only distinguished field is [`ID_FIELD`], which holds the
//! document's identity. Identities generated by the gateway are [`ObjectId`]s.
//!
//! The [`DocumentExt`] trait converts documents to and from `serde_json` values the
//! way HTTP clients expect to see them: object ids as 24 character hex strings and
//! dates as RFC 3339 timestamps.

use bson::{Bson, Document, oid::ObjectId};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Name of the identity field carried by every stored document.
pub const ID_FIELD: &str = "_id";

/// Parses a client supplied identifier into an [`ObjectId`].
///
/// Only strings of exactly 24 hexadecimal characters are accepted.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidId`] for any other input.
pub fn parse_object_id(id: &str) -> DocumentStoreResult<ObjectId> {
    if id.len() != 24 || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DocumentStoreError::InvalidId(id.to_string()));
    }

    ObjectId::parse_str(id).map_err(|_| DocumentStoreError::InvalidId(id.to_string()))
}

/// Extension trait providing identity and JSON conversion helpers for documents.
pub trait DocumentExt: Sized {
    /// Returns the document's identity, if it has one.
    fn id(&self) -> Option<&Bson>;

    /// Returns the document's identity, assigning a fresh [`ObjectId`] first if it has none.
    ///
    /// A freshly assigned identity is placed in front of the other fields.
    fn ensure_id(&mut self) -> Bson;

    /// Converts this document to a JSON object.
    fn to_json(&self) -> Value;

    /// Creates a document from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the value is not a JSON object,
    /// or [`DocumentStoreError::Serialization`] if an extended JSON wrapper is malformed.
    fn from_json(value: Value) -> DocumentStoreResult<Self>;
}

impl DocumentExt for Document {
    fn id(&self) -> Option<&Bson> {
        self.get(ID_FIELD)
    }

    fn ensure_id(&mut self) -> Bson {
        if let Some(id) = self.get(ID_FIELD) {
            return id.clone();
        }

        let id = Bson::ObjectId(ObjectId::new());
        let mut with_id = Document::new();
        with_id.insert(ID_FIELD, id.clone());
        for (key, value) in std::mem::take(self) {
            with_id.insert(key, value);
        }
        *self = with_id;

        id
    }

    fn to_json(&self) -> Value {
        Value::Object(
            self.iter()
                .map(|(k, v)| (k.clone(), bson_to_json(v)))
                .collect::<Map<_, _>>(),
        )
    }

    fn from_json(value: Value) -> DocumentStoreResult<Self> {
        match value {
            Value::Object(map) => object_to_document(map),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "expected a JSON object, found {}",
                json_type_name(&other)
            ))),
        }
    }
}

/// Converts a BSON value into the JSON representation returned to HTTP clients.
pub fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(n) => Value::from(*n),
        Bson::Int64(n) => Value::from(*n),
        Bson::Double(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s.clone()),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Value::String(
            dt.to_chrono()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(doc) => doc.to_json(),
        other => other.clone().into_relaxed_extjson(),
    }
}

/// Converts a JSON value received from an HTTP client into BSON.
///
/// Integers that fit in 32 bits become `Int32`, other integers `Int64`, and every
/// other number a `Double`. Objects of the form `{"$oid": "<hex>"}` and
/// `{"$date": "<rfc3339>"}` become object ids and dates respectively.
///
/// # Errors
///
/// Returns [`DocumentStoreError::Serialization`] if an `$oid` or `$date` wrapper
/// holds a malformed value.
pub fn json_to_bson(value: Value) -> DocumentStoreResult<Bson> {
    Ok(match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(b),
        Value::Number(n) => number_to_bson(&n),
        Value::String(s) => Bson::String(s),
        Value::Array(items) => Bson::Array(
            items
                .into_iter()
                .map(json_to_bson)
                .collect::<DocumentStoreResult<Vec<_>>>()?,
        ),
        Value::Object(map) => match extended_scalar(&map)? {
            Some(scalar) => scalar,
            None => Bson::Document(object_to_document(map)?),
        },
    })
}

fn object_to_document(map: Map<String, Value>) -> DocumentStoreResult<Document> {
    map.into_iter()
        .map(|(k, v)| json_to_bson(v).map(|b| (k, b)))
        .collect()
}

fn number_to_bson(n: &Number) -> Bson {
    if let Some(i) = n.as_i64() {
        match i32::try_from(i) {
            Ok(small) => Bson::Int32(small),
            Err(_) => Bson::Int64(i),
        }
    } else {
        Bson::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn extended_scalar(map: &Map<String, Value>) -> DocumentStoreResult<Option<Bson>> {
    if map.len() != 1 {
        return Ok(None);
    }

    match map.iter().next() {
        Some((key, Value::String(hex))) if key == "$oid" => parse_object_id(hex)
            .map(|oid| Some(Bson::ObjectId(oid)))
            .map_err(|_| DocumentStoreError::Serialization(format!("invalid $oid value: {hex}"))),
        Some((key, Value::String(date))) if key == "$date" => DateTime::parse_from_rfc3339(date)
            .map(|dt| {
                Some(Bson::DateTime(bson::DateTime::from_chrono(
                    dt.with_timezone(&Utc),
                )))
            })
            .map_err(|e| DocumentStoreError::Serialization(format!("invalid $date value: {e}"))),
        _ => Ok(None),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde_json::json;

    #[test]
    fn accepts_only_24_hex_identifiers() {
        assert!(parse_object_id("507f1f77bcf86cd799439011").is_ok());
        assert!(parse_object_id("507F1F77BCF86CD799439011").is_ok());

        for bad in ["", "123", "aaaaaaaaaaaa", "507f1f77bcf86cd79943901z", "507f1f77bcf86cd7994390111"] {
            assert!(matches!(parse_object_id(bad), Err(DocumentStoreError::InvalidId(_))), "{bad}");
        }
    }

    #[test]
    fn ensure_id_prepends_a_fresh_object_id() {
        let mut doc = doc! { "name": "Alice" };
        let id = doc.ensure_id();

        assert!(matches!(id, Bson::ObjectId(_)));
        assert_eq!(doc.keys().next().map(String::as_str), Some(ID_FIELD));
        assert_eq!(doc.get_str("name").ok(), Some("Alice"));
    }

    #[test]
    fn ensure_id_keeps_a_supplied_identity() {
        let mut doc = doc! { "_id": "custom", "name": "Alice" };

        assert_eq!(doc.ensure_id(), Bson::String("custom".into()));
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn json_numbers_pick_the_narrowest_bson_type() {
        let doc = Document::from_json(json!({ "small": 7, "big": 5_000_000_000_i64, "real": 1.5 })).unwrap();

        assert_eq!(doc.get("small"), Some(&Bson::Int32(7)));
        assert_eq!(doc.get("big"), Some(&Bson::Int64(5_000_000_000)));
        assert_eq!(doc.get("real"), Some(&Bson::Double(1.5)));
    }

    #[test]
    fn extended_wrappers_become_native_values() {
        let doc = Document::from_json(json!({
            "ref": { "$oid": "507f1f77bcf86cd799439011" },
            "at": { "$date": "2024-03-01T12:00:00Z" },
            "nested": { "$oid": "x", "other": 1 },
        }))
        .unwrap();

        assert!(matches!(doc.get("ref"), Some(Bson::ObjectId(_))));
        assert!(matches!(doc.get("at"), Some(Bson::DateTime(_))));
        assert!(matches!(doc.get("nested"), Some(Bson::Document(_))));
    }

    #[test]
    fn malformed_oid_wrapper_is_rejected() {
        let err = Document::from_json(json!({ "ref": { "$oid": "nope" } })).unwrap_err();
        assert!(matches!(err, DocumentStoreError::Serialization(_)));
    }

    #[test]
    fn non_objects_are_not_documents() {
        let err = Document::from_json(json!([1, 2])).unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    }

    #[test]
    fn to_json_renders_ids_and_dates_as_strings() {
        let oid = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        let at = bson::DateTime::from_millis(0);
        let doc = doc! { "_id": oid, "at": at, "tags": ["a", 1], "score": 2.5 };

        assert_eq!(
            doc.to_json(),
            json!({
                "_id": "507f1f77bcf86cd799439011",
                "at": "1970-01-01T00:00:00.000Z",
                "tags": ["a", 1],
                "score": 2.5,
            })
        );
    }

    #[test]
    fn exotic_values_render_as_relaxed_extended_json() {
        let price: bson::Decimal128 = "19.99".parse().unwrap();
        let blob = bson::Binary {
            subtype: bson::spec::BinarySubtype::Generic,
            bytes: vec![1, 2, 3],
        };
        let doc = doc! { "blob": blob, "price": price, "count": 5_000_000_000_i64 };

        assert_eq!(
            doc.to_json(),
            json!({
                "blob": { "$binary": { "base64": "AQID", "subType": "00" } },
                "price": { "$numberDecimal": price.to_string() },
                "count": 5_000_000_000_i64,
            })
        );
    }

    #[test]
    fn field_order_survives_conversion() {
        let doc = Document::from_json(json!({ "z": 1, "a": 2, "m": 3 })).unwrap();
        let keys: Vec<_> = doc.to_json().as_object().unwrap().keys().cloned().collect();

        assert_eq!(keys, vec!["z", "a", "m"]);
    }
}
