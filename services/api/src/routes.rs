use crate::infra::{AppState, CatalogSource};
use accreditation::workflows::accreditation::{
    application_router, AccreditationService, ApplicationRepository, NotificationPublisher,
    WorkflowDefinition,
};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub(crate) struct WorkflowCatalogResponse {
    pub(crate) source: CatalogSource,
    pub(crate) entry: WorkflowDefinition,
    pub(crate) exit: WorkflowDefinition,
}

pub(crate) fn with_application_routes<R, N>(
    service: Arc<AccreditationService<R, N>>,
) -> axum::Router
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    application_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/workflows", axum::routing::get(workflows_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// The active entry and exit workflows, as loaded at startup.
pub(crate) async fn workflows_endpoint(
    Extension(state): Extension<AppState>,
) -> Json<WorkflowCatalogResponse> {
    Json(WorkflowCatalogResponse {
        source: state.catalog_source,
        entry: state.catalog.entry().clone(),
        exit: state.catalog.exit().clone(),
    })
}
