//! # HTTP Application
//!
//! Router assembly and the state shared by every handler.

use std::{any::Any, future::Future, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{MethodRouter, get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use docgate_core::{
    error::DocumentStoreResult,
    store::{ConnectionManager, DocumentStore},
};

use crate::{
    config::DEFAULT_BODY_LIMIT,
    error::{ApiError, ApiResult},
    extract::RequestBody,
    handlers::{data, service},
    response::InternalErrorBody,
};

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    manager: Arc<ConnectionManager>,
    db_timeout: Option<Duration>,
    body_limit: usize,
    driver: &'static str,
}

impl AppState {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            manager,
            db_timeout: None,
            body_limit: DEFAULT_BODY_LIMIT,
            driver: "Native MongoDB Driver",
        }
    }

    /// Bounds every store call made on behalf of a request.
    pub fn with_db_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.db_timeout = timeout;
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Driver name advertised by the service root.
    pub fn with_driver(mut self, driver: &'static str) -> Self {
        self.driver = driver;
        self
    }

    pub fn driver(&self) -> &'static str {
        self.driver
    }

    /// The live store handle.
    pub async fn store(&self) -> ApiResult<Arc<DocumentStore>> {
        Ok(self.manager.database().await?)
    }

    /// Runs one store operation under the configured deadline.
    ///
    /// Failures are logged with the operation and collection before they are turned
    /// into an [`ApiError`].
    pub async fn run<T>(
        &self,
        operation: &'static str,
        collection: &str,
        fut: impl Future<Output = DocumentStoreResult<T>>,
    ) -> ApiResult<T> {
        let result = match self.db_timeout {
            Some(deadline) => tokio::time::timeout(deadline, fut)
                .await
                .map_err(|_| {
                    tracing::error!(operation, collection, ?deadline, "store operation timed out");
                    ApiError::Timeout
                })?,
            None => fut.await,
        };

        result.map_err(|e| {
            tracing::error!(operation, collection, error = %e, "store operation failed");
            ApiError::Store(e)
        })
    }
}

/// Request ids are random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(%message, "request handler panicked");

    (StatusCode::INTERNAL_SERVER_ERROR, Json(InternalErrorBody::new(message))).into_response()
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

/// GET, PUT and DELETE on a literal `/api/data/{collection}/<segment>` path, answered by
/// the identifier handlers with `segment` as the identifier.
fn segment_as_id(segment: &'static str) -> MethodRouter<AppState> {
    let with_id = move |collection: String| Path((collection, segment.to_string()));

    get(move |state: State<AppState>, Path(collection): Path<String>| data::get(state, with_id(collection)))
        .put(
            move |state: State<AppState>, Path(collection): Path<String>, body: RequestBody| {
                data::update(state, with_id(collection), body)
            },
        )
        .delete(move |state: State<AppState>, Path(collection): Path<String>| {
            data::delete(state, with_id(collection))
        })
}

/// Builds the gateway router.
///
/// ```text
/// GET    /                                 service info
/// GET    /api/collections                  collection names
/// GET    /api/data/{collection}            list
/// POST   /api/data/{collection}            create
/// POST   /api/data/{collection}/bulk       bulk create
/// POST   /api/data/{collection}/query      query
/// GET    /api/data/{collection}/{id}       get
/// PUT    /api/data/{collection}/{id}       update
/// DELETE /api/data/{collection}/{id}       delete
/// ```
///
/// `bulk` and `query` only shadow the identifier segment for POST. Other methods on
/// those paths go to the identifier handlers, see [`segment_as_id`].
pub fn router(state: AppState) -> Router {
    let body_limit = state.body_limit;

    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();

                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/", get(service::info))
        .route("/api/collections", get(service::collections))
        .route("/api/data/{collection}", get(data::list).post(data::create))
        .route("/api/data/{collection}/bulk", segment_as_id("bulk").post(data::bulk_create))
        .route("/api/data/{collection}/query", segment_as_id("query").post(data::query))
        .route(
            "/api/data/{collection}/{id}",
            get(data::get).put(data::update).delete(data::delete),
        )
        .fallback(route_not_found)
        .method_not_allowed_fallback(route_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware)
        .with_state(state)
}
