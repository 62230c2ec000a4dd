use serde::Serialize;

use super::domain::{
    AgencyRole, Application, ApplicationStatus, ApprovalStatus, StepId, WorkflowPhase,
};
use super::engine::derive_status_in_phase;

/// Status shown to a viewer: either a step verdict or the overall application status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectedStatus {
    Pending,
    InReview,
    Approved,
    Rejected,
    NotApplicable,
    Exited,
}

impl ProjectedStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InReview => "In Review",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::NotApplicable => "Not Applicable",
            Self::Exited => "Exited",
        }
    }
}

impl From<ApprovalStatus> for ProjectedStatus {
    fn from(value: ApprovalStatus) -> Self {
        match value {
            ApprovalStatus::Pending => Self::Pending,
            ApprovalStatus::InReview => Self::InReview,
            ApprovalStatus::Approved => Self::Approved,
            ApprovalStatus::Rejected => Self::Rejected,
            ApprovalStatus::NotApplicable => Self::NotApplicable,
        }
    }
}

impl From<ApplicationStatus> for ProjectedStatus {
    fn from(value: ApplicationStatus) -> Self {
        match value {
            ApplicationStatus::Pending => Self::Pending,
            ApplicationStatus::InReview => Self::InReview,
            ApplicationStatus::Approved => Self::Approved,
            ApplicationStatus::Rejected => Self::Rejected,
            ApplicationStatus::Exited => Self::Exited,
        }
    }
}

/// What one viewer role sees for an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleProjection {
    pub viewer: AgencyRole,
    pub phase: WorkflowPhase,
    pub status: ProjectedStatus,
    pub status_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl RoleProjection {
    fn overall(application: &Application, viewer: AgencyRole, phase: WorkflowPhase) -> Self {
        let status = ProjectedStatus::from(derive_status_in_phase(application, phase));
        Self {
            viewer,
            phase,
            status,
            status_label: status.label(),
            step_id: None,
            step_name: None,
            rejection_reason: None,
        }
    }
}

/// Reduce an application to the status relevant to `viewer` in its current phase.
pub fn project_for_role(application: &Application, viewer: AgencyRole) -> RoleProjection {
    project_for_role_in_phase(application, viewer, application.phase)
}

/// Same as [`project_for_role`] for an explicit phase, as used by exit-workflow dashboards.
///
/// When the viewer owns several steps the first one in step order wins.
pub fn project_for_role_in_phase(
    application: &Application,
    viewer: AgencyRole,
    phase: WorkflowPhase,
) -> RoleProjection {
    if viewer.bypasses_role_matching() {
        return RoleProjection::overall(application, viewer, phase);
    }

    match application
        .records_in_phase(phase)
        .into_iter()
        .find(|record| record.step.required_role == viewer)
    {
        Some(record) => {
            let status = ProjectedStatus::from(record.status);
            RoleProjection {
                viewer,
                phase,
                status,
                status_label: status.label(),
                step_id: Some(record.step.id.clone()),
                step_name: Some(record.step.name.clone()),
                rejection_reason: record.rejection_reason.clone(),
            }
        }
        None => RoleProjection::overall(application, viewer, phase),
    }
}
