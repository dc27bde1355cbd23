//! # Response Envelopes
//!
//! Every body carries `success`. Field names are camelCase on the wire.

use serde::Serialize;
use serde_json::{Map, Value};

/// Failure body
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { success: false, error: error.into() }
    }
}

/// Body written for failures outside the handlers: panics and unreadable request bodies
#[derive(Debug, Clone, Serialize)]
pub struct InternalErrorBody {
    pub success: bool,
    pub error: &'static str,
    pub message: String,
}

impl InternalErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: "Internal server error",
            message: message.into(),
        }
    }
}

/// A page of documents with a total count
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub count: usize,
    pub total: u64,
    pub data: Vec<Value>,
}

impl ListResponse {
    pub fn new(data: Vec<Value>, total: u64) -> Self {
        Self { success: true, count: data.len(), total, data }
    }
}

/// Single document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub success: bool,
    pub data: Value,
}

impl DocumentResponse {
    pub fn new(data: Value) -> Self {
        Self { success: true, data }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResponse {
    pub success: bool,
    pub message: &'static str,
    pub inserted_id: Value,
    pub data: Value,
}

impl CreatedResponse {
    pub fn new(inserted_id: Value, data: Value) -> Self {
        Self {
            success: true,
            message: "Document created successfully",
            inserted_id,
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreatedResponse {
    pub success: bool,
    pub message: String,
    pub inserted_count: usize,
    /// Inserted identities keyed by their index in the request array
    pub inserted_ids: Map<String, Value>,
}

impl BulkCreatedResponse {
    pub fn new(ids: Vec<Value>) -> Self {
        Self {
            success: true,
            message: format!("{} documents created successfully", ids.len()),
            inserted_count: ids.len(),
            inserted_ids: ids
                .into_iter()
                .enumerate()
                .map(|(index, id)| (index.to_string(), id))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatedResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: Value,
}

impl UpdatedResponse {
    pub fn new(data: Value) -> Self {
        Self { success: true, message: "Document updated successfully", data }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub message: &'static str,
}

impl DeletedResponse {
    pub fn new() -> Self {
        Self { success: true, message: "Document deleted successfully" }
    }
}

impl Default for DeletedResponse {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionsResponse {
    pub success: bool,
    pub count: usize,
    pub collections: Vec<String>,
}

impl CollectionsResponse {
    pub fn new(collections: Vec<String>) -> Self {
        Self { success: true, count: collections.len(), collections }
    }
}

/// Route map advertised by the service root
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    pub health: &'static str,
    pub collections: &'static str,
    pub get_data: &'static str,
    pub get_document: &'static str,
    pub create_document: &'static str,
    pub bulk_insert: &'static str,
    pub query_data: &'static str,
    pub update_document: &'static str,
    pub delete_document: &'static str,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            health: "GET /",
            collections: "GET /api/collections",
            get_data: "GET /api/data/:collection",
            get_document: "GET /api/data/:collection/:id",
            create_document: "POST /api/data/:collection",
            bulk_insert: "POST /api/data/:collection/bulk",
            query_data: "POST /api/data/:collection/query",
            update_document: "PUT /api/data/:collection/:id",
            delete_document: "DELETE /api/data/:collection/:id",
        }
    }
}

/// Liveness response
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub success: bool,
    pub message: &'static str,
    pub version: &'static str,
    pub driver: &'static str,
    pub endpoints: Endpoints,
    pub timestamp: String,
}
