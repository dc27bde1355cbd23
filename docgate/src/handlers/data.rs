//! Generic collection handlers mounted under `/api/data`.
//!
//! Collections are addressed by name and need no prior declaration; documents are
//! addressed by their ObjectId in hex form.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query as QueryParams, State},
    http::StatusCode,
};
use bson::Document;
use serde_json::{Map, Value};

use docgate_core::{
    document::{DocumentExt, bson_to_json, json_to_bson, parse_object_id},
    error::DocumentStoreError,
    page::TotalScope,
    query::{Query, Sort, SortDirection},
};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::RequestBody,
    response::{
        BulkCreatedResponse, CreatedResponse, DeletedResponse, DocumentResponse, ListResponse,
        UpdatedResponse,
    },
};

const DEFAULT_LIMIT: i64 = 100;
const DEFAULT_SKIP: u64 = 0;
const DEFAULT_SORT_FIELD: &str = "_id";

/// Parses the leading integer of a query parameter (`"10abc"` is 10, `"abc"` is nothing).
fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Query string of the list route.
#[derive(Debug, Clone, PartialEq)]
struct ListParams {
    limit: i64,
    skip: u64,
    sort: Sort,
}

impl ListParams {
    fn from_query(params: &HashMap<String, String>) -> Self {
        let limit = params
            .get("limit")
            .and_then(|v| parse_leading_int(v))
            .unwrap_or(DEFAULT_LIMIT);
        let skip = params
            .get("skip")
            .and_then(|v| parse_leading_int(v))
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(DEFAULT_SKIP);
        let field = params
            .get("sort")
            .map(String::as_str)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_SORT_FIELD);
        let direction = match params.get("order").map(String::as_str) {
            Some("desc") | None => SortDirection::Desc,
            Some(_) => SortDirection::Asc,
        };

        Self { limit, skip, sort: Sort::new(field, direction) }
    }

    fn into_query(self) -> Query {
        Query::builder()
            .sorts(vec![self.sort])
            .skip(self.skip)
            .limit(self.limit)
            .build()
    }
}

fn parse_id(id: &str) -> ApiResult<bson::oid::ObjectId> {
    parse_object_id(id).map_err(|_| ApiError::InvalidId)
}

/// Converts a JSON object into a document; `what` names the value in errors.
fn to_document(value: Value, what: &'static str) -> ApiResult<Document> {
    Document::from_json(value).map_err(|e| match e {
        DocumentStoreError::Serialization(message) => ApiError::InvalidValue(message),
        _ => ApiError::ExpectedObject(what),
    })
}

/// Like [`to_document`], but a missing or `null` value yields `None`.
fn optional_document(value: Option<Value>, what: &'static str) -> ApiResult<Option<Document>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => to_document(value, what).map(Some),
    }
}

fn option_number(options: &Map<String, Value>, name: &str) -> ApiResult<Option<i64>> {
    match options.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .map(Some)
            .ok_or_else(|| ApiError::InvalidOption(format!("{name} is out of range"))),
        Some(_) => Err(ApiError::InvalidOption(format!("{name} must be a number"))),
    }
}

/// Turns a query route body (`{filter?, projection?, options?}`) into a find specification.
fn parse_query_body(body: Value) -> ApiResult<Query> {
    let Value::Object(mut body) = body else {
        return Err(ApiError::ExpectedObject("Request body"));
    };

    let mut builder = Query::builder()
        .filter(optional_document(body.remove("filter"), "filter")?.unwrap_or_default());

    if let Some(projection) = optional_document(body.remove("projection"), "projection")? {
        builder = builder.projection(projection);
    }

    let options = match body.remove("options") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(options)) => options,
        Some(_) => return Err(ApiError::ExpectedObject("options")),
    };

    if let Some(sort) = options.get("sort").filter(|s| !s.is_null()) {
        let spec = json_to_bson(sort.clone()).map_err(|e| ApiError::InvalidSort(e.to_string()))?;
        let sorts = Sort::parse_spec(&spec).map_err(|e| match e {
            DocumentStoreError::InvalidQuery(message) => ApiError::InvalidSort(message),
            other => ApiError::InvalidSort(other.to_string()),
        })?;
        builder = builder.sorts(sorts);
    }
    if let Some(skip) = option_number(&options, "skip")? {
        let skip = u64::try_from(skip)
            .map_err(|_| ApiError::InvalidOption("skip must not be negative".to_string()))?;
        builder = builder.skip(skip);
    }
    if let Some(limit) = option_number(&options, "limit")? {
        builder = builder.limit(limit);
    }

    Ok(builder.build())
}

/// `GET /api/data/{collection}`
///
/// `total` counts the whole collection, not just the documents the page was cut from.
pub async fn list(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    QueryParams(params): QueryParams<HashMap<String, String>>,
) -> ApiResult<Json<ListResponse>> {
    let query = ListParams::from_query(&params).into_query();

    let store = state.store().await?;
    let page = state
        .run("find", &collection, store.collection(&collection).find_page(query, TotalScope::Collection))
        .await?;

    Ok(Json(ListResponse::new(
        page.items.iter().map(DocumentExt::to_json).collect(),
        page.total,
    )))
}

/// `GET /api/data/{collection}/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<Json<DocumentResponse>> {
    let id = parse_id(&id)?;

    let store = state.store().await?;
    let document = state
        .run("findOne", &collection, store.collection(&collection).find_by_id(id))
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(DocumentResponse::new(document.to_json())))
}

/// `POST /api/data/{collection}`
pub async fn create(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    RequestBody(body): RequestBody,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let document = to_document(body, "Request body")?;

    let store = state.store().await?;
    let (id, stored) = state
        .run("insertOne", &collection, store.collection(&collection).insert_one(document))
        .await?;

    tracing::debug!(collection = %collection, id = %id, "document created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse::new(bson_to_json(&id), stored.to_json())),
    ))
}

/// `POST /api/data/{collection}/bulk`
///
/// The batch is validated before anything is written. Insertion is ordered: on a
/// store failure, documents before the failing one stay inserted.
pub async fn bulk_create(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    RequestBody(body): RequestBody,
) -> ApiResult<(StatusCode, Json<BulkCreatedResponse>)> {
    let Value::Array(items) = body else {
        return Err(ApiError::ExpectedArray);
    };

    let documents = items
        .into_iter()
        .map(|item| match item {
            Value::Object(_) => to_document(item, "Document"),
            _ => Err(ApiError::ExpectedArray),
        })
        .collect::<ApiResult<Vec<_>>>()?;

    let store = state.store().await?;
    let ids = state
        .run("insertMany", &collection, store.collection(&collection).insert_many(documents))
        .await?;

    tracing::debug!(collection = %collection, count = ids.len(), "documents created");

    Ok((
        StatusCode::CREATED,
        Json(BulkCreatedResponse::new(ids.iter().map(bson_to_json).collect())),
    ))
}

/// `PUT /api/data/{collection}/{id}`
///
/// Only the fields present in the body change.
pub async fn update(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    RequestBody(body): RequestBody,
) -> ApiResult<Json<UpdatedResponse>> {
    let id = parse_id(&id)?;
    let changes = to_document(body, "Request body")?;

    let store = state.store().await?;
    let updated = state
        .run("findOneAndUpdate", &collection, store.collection(&collection).update_by_id(id, changes))
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(UpdatedResponse::new(updated.to_json())))
}

/// `DELETE /api/data/{collection}/{id}`
pub async fn delete(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<Json<DeletedResponse>> {
    let id = parse_id(&id)?;

    let store = state.store().await?;
    let deleted = state
        .run("deleteOne", &collection, store.collection(&collection).delete_by_id(id))
        .await?;

    match deleted {
        true => Ok(Json(DeletedResponse::new())),
        false => Err(ApiError::NotFound),
    }
}

/// `POST /api/data/{collection}/query`
///
/// Unlike [`list`], `total` counts only the documents matching the filter.
pub async fn query(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    RequestBody(body): RequestBody,
) -> ApiResult<Json<ListResponse>> {
    let query = parse_query_body(body)?;

    let store = state.store().await?;
    let page = state
        .run("find", &collection, store.collection(&collection).find_page(query, TotalScope::Matching))
        .await?;

    Ok(Json(ListResponse::new(
        page.items.iter().map(DocumentExt::to_json).collect(),
        page.total,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn leading_integers_are_parsed() {
        assert_eq!(parse_leading_int("10abc"), Some(10));
        assert_eq!(parse_leading_int("  -3"), Some(-3));
        assert_eq!(parse_leading_int("+7"), Some(7));
        assert_eq!(parse_leading_int("abc"), None);
        assert_eq!(parse_leading_int(""), None);
    }

    #[test]
    fn list_params_default_to_newest_first() {
        assert_eq!(
            ListParams::from_query(&params(&[])),
            ListParams { limit: 100, skip: 0, sort: Sort::new("_id", SortDirection::Desc) },
        );
    }

    #[test]
    fn list_params_fall_back_on_garbage() {
        let parsed = ListParams::from_query(&params(&[
            ("limit", "ten"),
            ("skip", "-4"),
            ("sort", "age"),
            ("order", "up"),
        ]));

        assert_eq!(parsed, ListParams { limit: 100, skip: 0, sort: Sort::new("age", SortDirection::Asc) });
    }

    #[test]
    fn query_body_parts_default_to_empty() {
        assert_eq!(parse_query_body(json!({})).unwrap(), Query::new());
        assert_eq!(
            parse_query_body(json!({ "filter": null, "projection": null, "options": null })).unwrap(),
            Query::new()
        );
    }

    #[test]
    fn query_body_is_fully_translated() {
        let query = parse_query_body(json!({
            "filter": { "status": "shipped" },
            "projection": { "total": 1 },
            "options": { "sort": { "total": -1 }, "skip": 5, "limit": 2.0 },
        }))
        .unwrap();

        assert_eq!(
            query,
            Query::builder()
                .filter(doc! { "status": "shipped" })
                .projection(doc! { "total": 1 })
                .sort("total", SortDirection::Desc)
                .skip(5)
                .limit(2)
                .build()
        );
    }

    #[test]
    fn malformed_query_bodies_are_client_errors() {
        assert!(matches!(parse_query_body(json!([])), Err(ApiError::ExpectedObject(_))));
        assert!(matches!(parse_query_body(json!({ "filter": [1] })), Err(ApiError::ExpectedObject("filter"))));
        assert!(matches!(parse_query_body(json!({ "options": { "sort": 3 } })), Err(ApiError::InvalidSort(_))));
        assert!(matches!(parse_query_body(json!({ "options": { "limit": "5" } })), Err(ApiError::InvalidOption(_))));
        assert!(matches!(parse_query_body(json!({ "options": { "skip": -1 } })), Err(ApiError::InvalidOption(_))));
    }
}
