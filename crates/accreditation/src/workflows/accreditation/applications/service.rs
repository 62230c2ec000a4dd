use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::super::blueprint::WorkflowCatalog;
use super::super::domain::{
    AgencyRole, Application, ApplicationId, ApplicationSubmission, EquipmentStatus, StepId,
};
use super::super::engine::{self, ApprovalError, Decision};
use super::super::equipment::{self, EquipmentError};
use super::super::query::{ApplicationQuery, Page, PageLimits};
use super::intake::{IntakeGuard, IntakeViolation};
use super::repository::{
    ApplicationRepository, ApplicationView, NotificationPublisher, RepositoryError, StatusNotice,
};

/// Service composing the workflow catalog, repository, and notification hooks.
pub struct AccreditationService<R, N> {
    guard: IntakeGuard,
    catalog: Arc<WorkflowCatalog>,
    repository: Arc<R>,
    notifications: Arc<N>,
    limits: PageLimits,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    ApplicationId(APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

impl<R, N> AccreditationService<R, N>
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(repository: Arc<R>, notifications: Arc<N>, catalog: WorkflowCatalog) -> Self {
        Self {
            guard: IntakeGuard,
            catalog: Arc::new(catalog),
            repository,
            notifications,
            limits: PageLimits::default(),
        }
    }

    pub fn with_page_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn catalog(&self) -> &WorkflowCatalog {
        &self.catalog
    }

    /// Register a new application and open its entry workflow.
    pub fn submit(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<Application, AccreditationServiceError> {
        let submission = self.guard.sanitize(submission)?;
        let now = Utc::now();

        let mut application = Application::new(next_application_id(), submission, now);
        application.open_steps(self.catalog.entry(), now)?;
        engine::recompute(&mut application);

        let stored = self.repository.insert(application)?;
        info!(
            application_id = %stored.id,
            steps = stored.approvals.len(),
            "accreditation application submitted"
        );
        Ok(stored)
    }

    pub fn get(&self, id: ApplicationId) -> Result<Application, AccreditationServiceError> {
        let application = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(application)
    }

    pub fn list(
        &self,
        query: ApplicationQuery,
    ) -> Result<Page<Application>, AccreditationServiceError> {
        let query = query.normalized(self.limits);
        debug!(?query, "listing applications");
        Ok(self.repository.list(&query)?)
    }

    /// The application as seen by `viewer`.
    pub fn project(
        &self,
        id: ApplicationId,
        viewer: AgencyRole,
    ) -> Result<ApplicationView, AccreditationServiceError> {
        Ok(self.get(id)?.view_for(viewer))
    }

    pub fn list_for_role(
        &self,
        query: ApplicationQuery,
        viewer: AgencyRole,
    ) -> Result<Page<ApplicationView>, AccreditationServiceError> {
        Ok(self
            .list(query)?
            .map(|application| application.view_for(viewer)))
    }

    pub fn decide(
        &self,
        id: ApplicationId,
        step_id: &StepId,
        role: AgencyRole,
        decision: Decision,
        reason: Option<&str>,
        expected_version: Option<u64>,
    ) -> Result<Application, AccreditationServiceError> {
        let stored = self.mutate(id, expected_version, |application| {
            engine::apply_decision(application, step_id, role, decision, reason)?;
            Ok(())
        })?;

        info!(
            application_id = %id,
            step = %step_id,
            role = %role,
            decision = decision.verb(),
            status = stored.status.label(),
            "approval decision recorded"
        );
        Ok(stored)
    }

    pub fn start_review(
        &self,
        id: ApplicationId,
        step_id: &StepId,
        role: AgencyRole,
        expected_version: Option<u64>,
    ) -> Result<Application, AccreditationServiceError> {
        self.mutate(id, expected_version, |application| {
            engine::start_review(application, step_id, role)?;
            Ok(())
        })
    }

    pub fn reopen(
        &self,
        id: ApplicationId,
        step_id: &StepId,
        role: AgencyRole,
        expected_version: Option<u64>,
    ) -> Result<Application, AccreditationServiceError> {
        let stored = self.mutate(id, expected_version, |application| {
            engine::reopen(application, step_id, role)?;
            Ok(())
        })?;
        warn!(application_id = %id, step = %step_id, "rejected step reopened");
        Ok(stored)
    }

    pub fn waive(
        &self,
        id: ApplicationId,
        step_id: &StepId,
        role: AgencyRole,
        expected_version: Option<u64>,
    ) -> Result<Application, AccreditationServiceError> {
        self.mutate(id, expected_version, |application| {
            engine::mark_not_applicable(application, step_id, role)?;
            Ok(())
        })
    }

    pub fn initialize_exit(
        &self,
        id: ApplicationId,
        expected_version: Option<u64>,
    ) -> Result<Application, AccreditationServiceError> {
        let catalog = Arc::clone(&self.catalog);
        let stored = self.mutate(id, expected_version, |application| {
            engine::initialize_exit(application, &catalog)?;
            Ok(())
        })?;
        info!(application_id = %id, status = stored.status.label(), "exit workflow initialized");
        Ok(stored)
    }

    pub fn set_equipment_status(
        &self,
        id: ApplicationId,
        index: usize,
        status: EquipmentStatus,
        reason: Option<&str>,
        expected_version: Option<u64>,
    ) -> Result<Application, AccreditationServiceError> {
        self.mutate(id, expected_version, |application| {
            application.equipment =
                equipment::set_item_status(application.equipment.clone(), index, status, reason)?;
            Ok(())
        })
    }

    /// Load, mutate and persist under the optimistic version check.
    fn mutate<F>(
        &self,
        id: ApplicationId,
        expected_version: Option<u64>,
        change: F,
    ) -> Result<Application, AccreditationServiceError>
    where
        F: FnOnce(&mut Application) -> Result<(), AccreditationServiceError>,
    {
        let mut application = self.get(id)?;
        let loaded_version = application.version;
        if let Some(expected) = expected_version {
            if expected != loaded_version {
                return Err(RepositoryError::StaleVersion {
                    expected,
                    found: loaded_version,
                }
                .into());
            }
        }

        let previous_status = application.status;
        change(&mut application)?;

        let stored = self.repository.update(application, loaded_version)?;
        if stored.status != previous_status && stored.status.is_settled() {
            self.notify(&stored);
        }
        Ok(stored)
    }

    fn notify(&self, application: &Application) {
        let notice = StatusNotice::for_application(application);
        if let Err(error) = self.notifications.publish(notice) {
            warn!(
                application_id = %application.id,
                %error,
                "status notification could not be delivered"
            );
        }
    }
}

/// Error raised by the accreditation service.
#[derive(Debug, thiserror::Error)]
pub enum AccreditationServiceError {
    #[error(transparent)]
    Intake(#[from] IntakeViolation),
    #[error(transparent)]
    Approval(#[from] ApprovalError),
    #[error(transparent)]
    Equipment(#[from] EquipmentError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
