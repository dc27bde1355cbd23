//! Service level endpoints: liveness and collection listing.

use axum::{Json, extract::State};
use chrono::{SecondsFormat, Utc};

use crate::{
    app::AppState,
    error::ApiResult,
    response::{CollectionsResponse, Endpoints, ServiceInfo},
};

/// `GET /`
///
/// Answers without touching the store.
pub async fn info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        success: true,
        message: "MongoDB API is running",
        version: env!("CARGO_PKG_VERSION"),
        driver: state.driver(),
        endpoints: Endpoints::default(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// `GET /api/collections`
pub async fn collections(State(state): State<AppState>) -> ApiResult<Json<CollectionsResponse>> {
    let store = state.store().await?;
    let names = state
        .run("listCollections", "*", store.list_collections())
        .await?;

    Ok(Json(CollectionsResponse::new(names)))
}
