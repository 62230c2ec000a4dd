use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;

use crate::workflows::accreditation::applications::repository::{
    ApplicationRepository, NotificationError, NotificationPublisher, RepositoryError,
    StatusNotice,
};
use crate::workflows::accreditation::applications::{application_router, AccreditationService};
use crate::workflows::accreditation::blueprint::WorkflowCatalog;
use crate::workflows::accreditation::domain::{
    AgencyRole, ApplicantRef, Application, ApplicationId, ApplicationSubmission, EquipmentItem,
    EquipmentSpecs, EquipmentStatus, StepId, WorkflowStep,
};
use crate::workflows::accreditation::graph::WorkflowGraph;
use crate::workflows::accreditation::query::{ApplicationQuery, Page};

pub(super) fn applicant() -> ApplicantRef {
    ApplicantRef {
        full_name: "Amara Okafor".to_string(),
        passport_number: "a1234567".to_string(),
        nationality: "Nigeria".to_string(),
        media_outlet: "Channels TV".to_string(),
    }
}

pub(super) fn drone() -> EquipmentItem {
    EquipmentItem {
        kind: "Drone".to_string(),
        model: "DJI Mavic 3".to_string(),
        specs: EquipmentSpecs {
            weight_kg: Some(0.9),
            frequency: Some("2.4GHz".to_string()),
            category: Some("UAV".to_string()),
        },
        status: EquipmentStatus::Pending,
        rejection_reason: None,
        updated_at: None,
    }
}

pub(super) fn submission() -> ApplicationSubmission {
    let mut form_data = BTreeMap::new();
    form_data.insert(
        "arrival_airport".to_string(),
        Value::String("ADD".to_string()),
    );
    ApplicationSubmission {
        applicant: applicant(),
        form_data,
        equipment: vec![drone()],
    }
}

/// EMA review followed by customs clearance, plus a single customs exit step.
pub(super) fn two_agency_catalog() -> WorkflowCatalog {
    let mut customs = WorkflowStep::new(
        "customs_clearance",
        "Customs Clearance",
        AgencyRole::CustomsOfficer,
        2,
    );
    customs.depends_on.push(StepId::new("ema_review"));
    let steps = vec![
        WorkflowStep::new("ema_review", "EMA Review", AgencyRole::EmaOfficer, 1).as_root(),
        customs,
        WorkflowStep::new("customs_exit", "Customs Exit", AgencyRole::CustomsOfficer, 1)
            .exit()
            .as_root(),
    ];
    WorkflowCatalog::from_graph(&WorkflowGraph::from_declared_dependencies(steps))
        .expect("valid two agency catalog")
}

pub(super) fn build_service() -> (
    AccreditationService<MemoryRepository, MemoryNotifications>,
    Arc<MemoryRepository>,
    Arc<MemoryNotifications>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let notifications = Arc::new(MemoryNotifications::default());
    let service = AccreditationService::new(
        repository.clone(),
        notifications.clone(),
        two_agency_catalog(),
    );
    (service, repository, notifications)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<BTreeMap<ApplicationId, Application>>>,
}

impl ApplicationRepository for MemoryRepository {
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
        let stored = guard
            .get(&application.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::StaleVersion {
                expected: expected_version,
                found: stored.version,
            });
        }
        application.version = expected_version + 1;
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

#[derive(Default, Clone)]
pub(super) struct MemoryNotifications {
    notices: Arc<Mutex<Vec<StatusNotice>>>,
}

impl MemoryNotifications {
    pub(super) fn notices(&self) -> Vec<StatusNotice> {
        self.notices
            .lock()
            .expect("notification mutex poisoned")
            .clone()
    }
}

impl NotificationPublisher for MemoryNotifications {
    fn publish(&self, notice: StatusNotice) -> Result<(), NotificationError> {
        self.notices
            .lock()
            .expect("notification mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) struct OfflineNotifications;

impl NotificationPublisher for OfflineNotifications {
    fn publish(&self, _notice: StatusNotice) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) struct ConflictRepository;

impl ApplicationRepository for ConflictRepository {
    fn insert(&self, _application: Application) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn update(
        &self,
        _application: Application,
        _expected_version: u64,
    ) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn fetch(&self, _id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(None)
    }

    fn list(&self, query: &ApplicationQuery) -> Result<Page<Application>, RepositoryError> {
        Ok(Page::from_filtered(Vec::new(), query))
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(&self, _application: Application) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(
        &self,
        _application: Application,
        _expected_version: u64,
    ) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _query: &ApplicationQuery) -> Result<Page<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn assert_conflict_response(response: Response) {
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn application_router_with_service(
    service: AccreditationService<MemoryRepository, MemoryNotifications>,
) -> axum::Router {
    application_router(Arc::new(service))
}
