use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::super::domain::{
    AgencyRole, Application, ApplicationId, ApplicationStatus, ApplicationSubmission,
    EquipmentStatus, StepId,
};
use super::super::engine::{ApprovalError, Decision};
use super::super::equipment::EquipmentError;
use super::super::graph::WorkflowGraph;
use super::super::query::ApplicationQuery;
use super::repository::{ApplicationRepository, NotificationPublisher, RepositoryError};
use super::service::{AccreditationService, AccreditationServiceError};

/// Router builder exposing intake, review, and workflow-builder endpoints.
pub fn application_router<R, N>(service: Arc<AccreditationService<R, N>>) -> Router
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(submit_handler::<R, N>).get(list_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(detail_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id/steps/:step_id/decision",
            post(decision_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id/steps/:step_id/review",
            post(review_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id/steps/:step_id/reopen",
            post(reopen_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id/steps/:step_id/waive",
            post(waive_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id/exit",
            post(exit_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id/equipment/:index",
            put(equipment_handler::<R, N>),
        )
        .route("/api/v1/workflows/validate", post(validate_workflow_handler))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ViewerParams {
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListParams {
    role: Option<String>,
    search: Option<String>,
    status: Option<ApplicationStatus>,
    nationality: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    page: Option<usize>,
    page_size: Option<usize>,
}

impl ListParams {
    fn into_query(self) -> (Option<String>, ApplicationQuery) {
        let query = ApplicationQuery {
            search: self.search,
            status: self.status,
            nationality: self.nationality,
            submitted_from: self.from,
            submitted_to: self.to,
            page: self.page,
            page_size: self.page_size,
        };
        (self.role, query)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionRequest {
    role: AgencyRole,
    decision: Decision,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActorRequest {
    role: AgencyRole,
    #[serde(default)]
    expected_version: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExitRequest {
    #[serde(default)]
    expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EquipmentRequest {
    status: EquipmentStatus,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    expected_version: Option<u64>,
}

pub(crate) async fn submit_handler<R, N>(
    State(service): State<Arc<AccreditationService<R, N>>>,
    axum::Json(submission): axum::Json<ApplicationSubmission>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    match service.submit(submission) {
        Ok(application) => {
            let view = application.detail_for(AgencyRole::SuperAdmin);
            (StatusCode::ACCEPTED, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_handler<R, N>(
    State(service): State<Arc<AccreditationService<R, N>>>,
    Query(params): Query<ListParams>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let (role, query) = params.into_query();
    let viewer = match parse_viewer(role.as_deref()) {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };

    match service.list_for_role(query, viewer) {
        Ok(page) => {
            let payload = json!({
                "items": page.items,
                "page": page.page,
                "page_size": page.page_size,
                "total": page.total,
                "total_pages": page.total_pages(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn detail_handler<R, N>(
    State(service): State<Arc<AccreditationService<R, N>>>,
    Path(application_id): Path<u64>,
    Query(params): Query<ViewerParams>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let viewer = match parse_viewer(params.role.as_deref()) {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };

    match service.get(ApplicationId(application_id)) {
        Ok(application) => {
            (StatusCode::OK, axum::Json(application.detail_for(viewer))).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn decision_handler<R, N>(
    State(service): State<Arc<AccreditationService<R, N>>>,
    Path((application_id, step_id)): Path<(u64, String)>,
    axum::Json(request): axum::Json<DecisionRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = service.decide(
        ApplicationId(application_id),
        &StepId::new(step_id),
        request.role,
        request.decision,
        request.reason.as_deref(),
        request.expected_version,
    );
    updated_response(result, request.role)
}

pub(crate) async fn review_handler<R, N>(
    State(service): State<Arc<AccreditationService<R, N>>>,
    Path((application_id, step_id)): Path<(u64, String)>,
    axum::Json(request): axum::Json<ActorRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = service.start_review(
        ApplicationId(application_id),
        &StepId::new(step_id),
        request.role,
        request.expected_version,
    );
    updated_response(result, request.role)
}

pub(crate) async fn reopen_handler<R, N>(
    State(service): State<Arc<AccreditationService<R, N>>>,
    Path((application_id, step_id)): Path<(u64, String)>,
    axum::Json(request): axum::Json<ActorRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = service.reopen(
        ApplicationId(application_id),
        &StepId::new(step_id),
        request.role,
        request.expected_version,
    );
    updated_response(result, request.role)
}

pub(crate) async fn waive_handler<R, N>(
    State(service): State<Arc<AccreditationService<R, N>>>,
    Path((application_id, step_id)): Path<(u64, String)>,
    axum::Json(request): axum::Json<ActorRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = service.waive(
        ApplicationId(application_id),
        &StepId::new(step_id),
        request.role,
        request.expected_version,
    );
    updated_response(result, request.role)
}

pub(crate) async fn exit_handler<R, N>(
    State(service): State<Arc<AccreditationService<R, N>>>,
    Path(application_id): Path<u64>,
    request: Option<axum::Json<ExitRequest>>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let request = request.map(|axum::Json(body)| body).unwrap_or_default();
    let result = service.initialize_exit(ApplicationId(application_id), request.expected_version);
    updated_response(result, AgencyRole::SuperAdmin)
}

pub(crate) async fn equipment_handler<R, N>(
    State(service): State<Arc<AccreditationService<R, N>>>,
    Path((application_id, index)): Path<(u64, usize)>,
    axum::Json(request): axum::Json<EquipmentRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let result = service.set_equipment_status(
        ApplicationId(application_id),
        index,
        request.status,
        request.reason.as_deref(),
        request.expected_version,
    );
    updated_response(result, AgencyRole::SuperAdmin)
}

pub(crate) async fn validate_workflow_handler(
    axum::Json(graph): axum::Json<WorkflowGraph>,
) -> Response {
    match graph.validate() {
        Ok(plan) => (StatusCode::OK, axum::Json(plan)).into_response(),
        Err(error) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
    }
}

fn parse_viewer(role: Option<&str>) -> Result<AgencyRole, Response> {
    let Some(role) = role else {
        let payload = json!({
            "error": "role query parameter is required",
        });
        return Err((StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response());
    };

    role.parse::<AgencyRole>().map_err(|error| {
        let payload = json!({
            "error": error.to_string(),
        });
        (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
    })
}

fn updated_response(
    result: Result<Application, AccreditationServiceError>,
    viewer: AgencyRole,
) -> Response {
    match result {
        Ok(application) => {
            (StatusCode::OK, axum::Json(application.detail_for(viewer))).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn error_response(error: AccreditationServiceError) -> Response {
    let status = match &error {
        AccreditationServiceError::Approval(
            ApprovalError::RoleMismatch { .. } | ApprovalError::PrivilegeRequired { .. },
        ) => StatusCode::FORBIDDEN,
        AccreditationServiceError::Approval(ApprovalError::StepNotFound(_))
        | AccreditationServiceError::Repository(RepositoryError::NotFound)
        | AccreditationServiceError::Equipment(EquipmentError::IndexOutOfRange { .. }) => {
            StatusCode::NOT_FOUND
        }
        AccreditationServiceError::Approval(
            ApprovalError::DuplicateRecord(_) | ApprovalError::DependantActive { .. },
        )
        | AccreditationServiceError::Repository(
            RepositoryError::Conflict | RepositoryError::StaleVersion { .. },
        ) => StatusCode::CONFLICT,
        AccreditationServiceError::Intake(_)
        | AccreditationServiceError::Approval(_)
        | AccreditationServiceError::Equipment(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AccreditationServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
