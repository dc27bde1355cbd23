//! Request body extraction.

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// A request body decoded into a JSON value.
///
/// JSON bodies (`application/json` or any `application/*+json`) are parsed as they are.
/// Form bodies (`application/x-www-form-urlencoded`) become an object of strings, with
/// bracketed keys building nested objects (`a[b]=1`) and lists (`a[]=1&a[]=2`). A
/// repeated key collects its values into a list. An empty body, a body of any other
/// content type, or a request without a content type reads as `{}`.
///
/// Bodies that cannot be read or decoded are rejected with [`ApiError::BodyParse`].
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody(pub Value);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Ignored,
}

fn body_kind(headers: &HeaderMap) -> BodyKind {
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return BodyKind::Ignored;
    };

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "application/json" => BodyKind::Json,
        "application/x-www-form-urlencoded" => BodyKind::Form,
        other if other.starts_with("application/") && other.ends_with("+json") => BodyKind::Json,
        _ => BodyKind::Ignored,
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl<S: Send + Sync> FromRequest<S> for RequestBody {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let kind = body_kind(req.headers());
        if kind == BodyKind::Ignored {
            return Ok(RequestBody(empty_object()));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => ApiError::BodyParse("request entity too large".to_string()),
                _ => ApiError::BodyParse(rejection.body_text()),
            })?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(RequestBody(empty_object()));
        }

        match kind {
            BodyKind::Form => decode_form(&bytes).map(RequestBody),
            _ => serde_json::from_slice(&bytes)
                .map(RequestBody)
                .map_err(|e| ApiError::BodyParse(e.to_string())),
        }
    }
}

/// Decodes a URL-encoded form into a JSON object.
fn decode_form(bytes: &[u8]) -> Result<Value, ApiError> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(bytes).map_err(|e| ApiError::BodyParse(e.to_string()))?;

    let mut root = Map::new();
    for (key, value) in pairs {
        insert_pair(&mut root, &key_path(&key), value);
    }

    Ok(Value::Object(root))
}

/// Splits `a[b][c]` into `["a", "b", "c"]`. Keys without a well formed bracket suffix
/// are taken literally.
fn key_path(key: &str) -> Vec<&str> {
    match key.find('[') {
        Some(open) if open > 0 && key.ends_with(']') => {
            let mut path = vec![&key[..open]];
            path.extend(key[open + 1..key.len() - 1].split("]["));
            path
        }
        _ => vec![key],
    }
}

fn insert_pair(target: &mut Map<String, Value>, path: &[&str], value: String) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };

    match rest {
        [] => append(target, head, Value::String(value), false),
        [""] => append(target, head, Value::String(value), true),
        _ => {
            let child = target
                .entry(head.to_string())
                .or_insert_with(empty_object);

            // A plain value already sits where a nested object is asked for.
            if let Value::Object(child) = child {
                insert_pair(child, rest, value);
            }
        }
    }
}

fn append(target: &mut Map<String, Value>, key: &str, value: Value, as_list: bool) {
    match target.get_mut(key) {
        None if as_list => {
            target.insert(key.to_string(), Value::Array(vec![value]));
        }
        None => {
            target.insert(key.to_string(), value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}
