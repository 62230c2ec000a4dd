//! End-to-end scenarios for the accreditation approval core.
//!
//! Everything here goes through the public service facade, the pure engine functions, and the
//! HTTP router, the same surfaces the API binary uses.

mod common {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use accreditation::workflows::accreditation::{
        AccreditationService, ApplicantRef, Application, ApplicationId, ApplicationQuery,
        ApplicationRepository, ApplicationSubmission, NotificationError, NotificationPublisher,
        Page, RepositoryError, StatusNotice, WorkflowCatalog,
    };

    pub(super) fn submission(name: &str) -> ApplicationSubmission {
        ApplicationSubmission {
            applicant: ApplicantRef {
                full_name: name.to_string(),
                passport_number: "EP7654321".to_string(),
                nationality: "Ethiopia".to_string(),
                media_outlet: "Fana Broadcasting".to_string(),
            },
            form_data: BTreeMap::new(),
            equipment: Vec::new(),
        }
    }

    pub(super) fn service(
        catalog: WorkflowCatalog,
    ) -> (
        AccreditationService<InMemoryRepository, RecordingNotifications>,
        Arc<RecordingNotifications>,
    ) {
        let notifications = Arc::new(RecordingNotifications::default());
        let service = AccreditationService::new(
            Arc::new(InMemoryRepository::default()),
            notifications.clone(),
            catalog,
        );
        (service, notifications)
    }

    #[derive(Default)]
    pub(super) struct InMemoryRepository {
        records: Mutex<BTreeMap<ApplicationId, Application>>,
    }

    impl ApplicationRepository for InMemoryRepository {
        fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
            let mut guard = self.records.lock().expect("repository mutex poisoned");
            if guard.contains_key(&application.id) {
                return Err(RepositoryError::Conflict);
            }
            guard.insert(application.id, application.clone());
            Ok(application)
        }

        fn update(
            &self,
            mut application: Application,
            expected_version: u64,
        ) -> Result<Application, RepositoryError> {
            let mut guard = self.records.lock().expect("repository mutex poisoned");
            let found = guard
                .get(&application.id)
                .map(|stored| stored.version)
                .ok_or(RepositoryError::NotFound)?;
            if found != expected_version {
                return Err(RepositoryError::StaleVersion {
                    expected: expected_version,
                    found,
                });
            }
            application.version = found + 1;
            guard.insert(application.id, application.clone());
            Ok(application)
        }

        fn fetch(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
            let guard = self.records.lock().expect("repository mutex poisoned");
            Ok(guard.get(&id).cloned())
        }

        fn list(&self, query: &ApplicationQuery) -> Result<Page<Application>, RepositoryError> {
            let guard = self.records.lock().expect("repository mutex poisoned");
            let matching = guard
                .values()
                .filter(|application| query.matches(application))
                .cloned()
                .collect();
            Ok(Page::from_filtered(matching, query))
        }
    }

    #[derive(Default)]
    pub(super) struct RecordingNotifications {
        notices: Mutex<Vec<StatusNotice>>,
    }

    impl RecordingNotifications {
        pub(super) fn templates(&self) -> Vec<String> {
            self.notices
                .lock()
                .expect("notification mutex poisoned")
                .iter()
                .map(|notice| notice.template.clone())
                .collect()
        }
    }

    impl NotificationPublisher for RecordingNotifications {
        fn publish(&self, notice: StatusNotice) -> Result<(), NotificationError> {
            self.notices
                .lock()
                .expect("notification mutex poisoned")
                .push(notice);
            Ok(())
        }
    }
}

use std::sync::Arc;

use accreditation::workflows::accreditation::{
    application_router, apply_decision, derive_status, project_for_role, validate_graph,
    AgencyRole, ApplicationStatus, ApprovalStatus, Decision, DependencyEdge, GraphError,
    ProjectedStatus, StepId, WorkflowCatalog, WorkflowGraph, WorkflowPhase, WorkflowStep,
};
use accreditation::workflows::catalog::WorkflowCatalogImporter;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

fn two_agency_catalog() -> WorkflowCatalog {
    let mut customs = WorkflowStep::new("customs", "Customs", AgencyRole::CustomsOfficer, 2);
    customs.depends_on.push(StepId::new("ema"));
    WorkflowCatalog::from_graph(&WorkflowGraph::from_declared_dependencies(vec![
        WorkflowStep::new("ema", "EMA", AgencyRole::EmaOfficer, 1).as_root(),
        customs,
    ]))
    .expect("valid catalog")
}

#[test]
fn topological_order_respects_every_edge() {
    let steps = vec![
        WorkflowStep::new("insa", "INSA", AgencyRole::InsaOfficer, 1),
        WorkflowStep::new("ema", "EMA", AgencyRole::EmaOfficer, 2).as_root(),
        WorkflowStep::new("ics", "ICS", AgencyRole::IcsOfficer, 3),
        WorkflowStep::new("customs", "Customs", AgencyRole::CustomsOfficer, 4),
    ];
    let edges = vec![
        DependencyEdge::new("ema", "ics"),
        DependencyEdge::new("ema", "insa"),
        DependencyEdge::new("ics", "customs"),
        DependencyEdge::new("insa", "customs"),
    ];

    let plan = validate_graph(&steps, &edges).expect("acyclic graph");

    for edge in &edges {
        let from = plan.position(&edge.from).expect("from planned");
        let to = plan.position(&edge.to).expect("to planned");
        assert!(from < to, "{} must precede {}", edge.from, edge.to);
    }
    assert_eq!(plan.steps().len(), 4);
}

#[test]
fn cyclic_graph_is_rejected() {
    let steps = vec![
        WorkflowStep::new("a", "A", AgencyRole::EmaOfficer, 1).as_root(),
        WorkflowStep::new("b", "B", AgencyRole::IcsOfficer, 2),
    ];
    let edges = vec![DependencyEdge::new("a", "b"), DependencyEdge::new("b", "a")];

    match validate_graph(&steps, &edges) {
        Err(GraphError::CycleDetected { steps }) => {
            assert_eq!(steps, vec![StepId::new("a"), StepId::new("b")])
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn standard_catalog_runs_screenings_in_parallel_after_media_review() {
    let catalog = WorkflowCatalog::standard();

    let entry = catalog.entry().plan();
    assert_eq!(
        entry.steps()[0].id,
        StepId::new("ema_accreditation_review")
    );
    let parallel: Vec<_> = entry
        .groups()
        .iter()
        .filter(|group| group.steps.len() > 1)
        .collect();
    assert_eq!(parallel.len(), 1);
    assert_eq!(parallel[0].steps.len(), 3);
    assert!(catalog
        .exit()
        .steps()
        .iter()
        .all(|step| step.phase() == WorkflowPhase::Exit));
}

#[test]
fn ema_then_customs_approval_settles_the_application() {
    let (service, notifications) = common::service(two_agency_catalog());
    let application = service
        .submit(common::submission("Selam Bekele"))
        .expect("submitted");

    let after_ema = service
        .decide(
            application.id,
            &StepId::new("ema"),
            AgencyRole::EmaOfficer,
            Decision::Approve,
            None,
            None,
        )
        .expect("ema approves");
    assert_eq!(after_ema.status, ApplicationStatus::InReview);

    let after_customs = service
        .decide(
            application.id,
            &StepId::new("customs"),
            AgencyRole::CustomsOfficer,
            Decision::Approve,
            None,
            None,
        )
        .expect("customs approves");
    assert_eq!(after_customs.status, ApplicationStatus::Approved);
    assert_eq!(notifications.templates(), vec!["accreditation_approved"]);
}

#[test]
fn rejection_keeps_reason_and_settles_overall_status() {
    let (service, _) = common::service(two_agency_catalog());
    let application = service
        .submit(common::submission("Dawit Alemu"))
        .expect("submitted");

    let rejected = service
        .decide(
            application.id,
            &StepId::new("ema"),
            AgencyRole::EmaOfficer,
            Decision::Reject,
            Some("missing credentials"),
            None,
        )
        .expect("rejected");

    let record = rejected.record(&StepId::new("ema")).expect("ema record");
    assert_eq!(record.status, ApprovalStatus::Rejected);
    assert_eq!(
        record.rejection_reason.as_deref(),
        Some("missing credentials")
    );
    assert_eq!(rejected.status, ApplicationStatus::Rejected);
    assert_eq!(derive_status(&rejected), ApplicationStatus::Rejected);
}

#[test]
fn revoke_then_approve_matches_a_single_approval() {
    let (service, _) = common::service(two_agency_catalog());
    let application = service
        .submit(common::submission("Hirut Tadesse"))
        .expect("submitted");

    let mut once = application.clone();
    apply_decision(
        &mut once,
        &StepId::new("ema"),
        AgencyRole::EmaOfficer,
        Decision::Approve,
        None,
    )
    .expect("approve");

    let mut twice = application;
    for decision in [Decision::Approve, Decision::Revoke, Decision::Approve] {
        apply_decision(
            &mut twice,
            &StepId::new("ema"),
            AgencyRole::EmaOfficer,
            decision,
            None,
        )
        .expect("decision applies");
    }

    let strip = |app: &accreditation::workflows::accreditation::Application| {
        app.approvals
            .iter()
            .map(|record| (record.step.id.clone(), record.status, record.rejection_reason.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(strip(&once), strip(&twice));
    assert_eq!(once.status, twice.status);
}

#[test]
fn viewer_without_a_step_sees_overall_status() {
    let catalog = WorkflowCatalog::from_graph(&WorkflowGraph::from_declared_dependencies(vec![
        WorkflowStep::new("customs", "Customs", AgencyRole::CustomsOfficer, 1),
    ]))
    .expect("valid catalog");
    let (service, _) = common::service(catalog);
    let application = service
        .submit(common::submission("Meron Haile"))
        .expect("submitted");

    let projection = project_for_role(&application, AgencyRole::InsaOfficer);

    assert_eq!(projection.status, ProjectedStatus::Pending);
    assert_eq!(projection.step_id, None);
}

#[test]
fn imported_catalog_drives_the_service() {
    let csv = "Step Id,Name,Required Role,Order,Exit Step,Depends On,Root\n\
ema,Media Review,EMA_OFFICER,1,no,,yes\n\
insa,Security Screening,INSA_OFFICER,2,no,ema,no\n\
customs_exit,Customs Exit,CUSTOMS_OFFICER,1,yes,,yes\n";
    let catalog = WorkflowCatalogImporter::from_reader(csv.as_bytes()).expect("catalog imports");
    let (service, notifications) = common::service(catalog);
    let application = service
        .submit(common::submission("Yonas Girma"))
        .expect("submitted");

    for (step, role) in [("ema", AgencyRole::EmaOfficer), ("insa", AgencyRole::InsaOfficer)] {
        service
            .decide(
                application.id,
                &StepId::new(step),
                role,
                Decision::Approve,
                None,
                None,
            )
            .expect("entry approval");
    }
    service
        .initialize_exit(application.id, None)
        .expect("exit opens");
    let exited = service
        .decide(
            application.id,
            &StepId::new("customs_exit"),
            AgencyRole::CustomsOfficer,
            Decision::Approve,
            None,
            None,
        )
        .expect("exit cleared");

    assert_eq!(exited.status, ApplicationStatus::Exited);
    assert_eq!(
        notifications.templates(),
        vec!["accreditation_approved", "accreditation_exit_cleared"]
    );
}

async fn read_json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

#[tokio::test]
async fn http_flow_submits_reviews_and_projects() {
    let (service, _) = common::service(two_agency_catalog());
    let router = application_router(Arc::new(service));

    let submitted = router
        .clone()
        .oneshot(post_json(
            "/api/v1/applications",
            serde_json::to_value(common::submission("Tsion Assefa")).expect("encode"),
        ))
        .await
        .expect("route executes");
    assert_eq!(submitted.status(), StatusCode::ACCEPTED);
    let id = read_json_body(submitted).await["application_id"]
        .as_u64()
        .expect("numeric id");

    let approved = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/applications/{id}/steps/ema/decision"),
            json!({ "role": "EMA_OFFICER", "decision": "APPROVE", "expected_version": 0 }),
        ))
        .await
        .expect("route executes");
    assert_eq!(approved.status(), StatusCode::OK);
    let payload = read_json_body(approved).await;
    assert_eq!(payload["overall_status"], json!("IN_REVIEW"));

    let customs_view = router
        .oneshot(
            Request::get(format!("/api/v1/applications/{id}?role=CUSTOMS_OFFICER"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(customs_view.status(), StatusCode::OK);
    let payload = read_json_body(customs_view).await;
    assert_eq!(payload["projection"]["step_id"], json!("customs"));
    assert_eq!(payload["projection"]["status"], json!("PENDING"));
    assert_eq!(payload["version"], json!(1));
}
