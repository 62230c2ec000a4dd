use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::domain::{
    AgencyRole, Application, ApplicationId, ApplicationStatus, ApprovalRecord, EquipmentItem,
    WorkflowPhase,
};
use super::super::equipment::EquipmentSummary;
use super::super::projection::{project_for_role, RoleProjection};
use super::super::query::{ApplicationQuery, Page};

/// Storage abstraction so the service module can be exercised in isolation.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError>;
    /// Persist `application` when the stored version still equals `expected_version`.
    ///
    /// Implementations bump the version and return the stored copy.
    fn update(
        &self,
        application: Application,
        expected_version: u64,
    ) -> Result<Application, RepositoryError>;
    fn fetch(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError>;
    /// Filtered, paginated listing. Filter semantics belong to the implementation.
    fn list(&self, query: &ApplicationQuery) -> Result<Page<Application>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record was modified concurrently (expected version {expected}, found {found})")]
    StaleVersion { expected: u64, found: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for e-mail/SMS adapters told about settled applications.
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notice: StatusNotice) -> Result<(), NotificationError>;
}

/// Payload describing an application whose overall status settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusNotice {
    pub template: String,
    pub application_id: ApplicationId,
    pub status: ApplicationStatus,
    pub details: BTreeMap<String, String>,
}

impl StatusNotice {
    pub fn for_application(application: &Application) -> Self {
        let template = match application.status {
            ApplicationStatus::Approved => "accreditation_approved",
            ApplicationStatus::Rejected => "accreditation_rejected",
            ApplicationStatus::Exited => "accreditation_exit_cleared",
            ApplicationStatus::Pending | ApplicationStatus::InReview => "accreditation_updated",
        };

        let mut details = BTreeMap::new();
        details.insert(
            "applicant".to_string(),
            application.applicant.full_name.clone(),
        );
        details.insert(
            "status".to_string(),
            application.status.label().to_string(),
        );
        if let Some(reason) = application
            .approvals
            .iter()
            .find_map(|record| record.rejection_reason.as_ref())
        {
            details.insert("reason".to_string(), reason.clone());
        }

        Self {
            template: template.to_string(),
            application_id: application.id,
            status: application.status,
            details,
        }
    }
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Row shown in a role-scoped list view.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub applicant_name: String,
    pub nationality: String,
    pub media_outlet: String,
    pub created_at: DateTime<Utc>,
    pub phase: WorkflowPhase,
    pub overall_status: ApplicationStatus,
    pub overall_label: &'static str,
    pub projection: RoleProjection,
    pub equipment: EquipmentSummary,
    pub version: u64,
}

/// Full application detail including every record, for review screens.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationDetailView {
    #[serde(flatten)]
    pub summary: ApplicationView,
    pub form_data: BTreeMap<String, serde_json::Value>,
    pub approvals: Vec<ApprovalRecord>,
    pub equipment_items: Vec<EquipmentItem>,
}

impl Application {
    pub fn view_for(&self, viewer: AgencyRole) -> ApplicationView {
        ApplicationView {
            application_id: self.id,
            applicant_name: self.applicant.full_name.clone(),
            nationality: self.applicant.nationality.clone(),
            media_outlet: self.applicant.media_outlet.clone(),
            created_at: self.created_at,
            phase: self.phase,
            overall_status: self.status,
            overall_label: self.status.label(),
            projection: project_for_role(self, viewer),
            equipment: EquipmentSummary::from_items(&self.equipment),
            version: self.version,
        }
    }

    pub fn detail_for(&self, viewer: AgencyRole) -> ApplicationDetailView {
        ApplicationDetailView {
            summary: self.view_for(viewer),
            form_data: self.form_data.clone(),
            approvals: self.approvals.clone(),
            equipment_items: self.equipment.clone(),
        }
    }
}
