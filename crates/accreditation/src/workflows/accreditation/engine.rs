//! Legal status transitions on approval records and the derived application status.
//!
//! ```text
//! PENDING ──review──▶ IN_REVIEW ──approve──▶ APPROVED ──revoke──▶ PENDING
//!    │                    │
//!    └──approve/reject────┴──reject──▶ REJECTED ──reopen (super admin)──▶ PENDING
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::blueprint::{WorkflowCatalog, WorkflowDefinition};
use super::domain::{
    AgencyRole, Application, ApplicationId, ApplicationStatus, ApprovalRecord, ApprovalStatus,
    StepId, WorkflowPhase,
};

/// Officer action on a single approval record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
    Revoke,
}

impl Decision {
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Revoke => "revoke",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApprovalError {
    #[error("no approval record exists for step '{0}'")]
    StepNotFound(StepId),
    #[error("role {acting} cannot act on step '{step}' (requires {required})")]
    RoleMismatch {
        step: StepId,
        acting: AgencyRole,
        required: AgencyRole,
    },
    #[error("a reason is required when rejecting step '{0}'")]
    MissingReason(StepId),
    #[error("step '{step}' is waiting on '{dependency}' to be approved")]
    DependencyPending { step: StepId, dependency: StepId },
    #[error("cannot revoke step '{step}' while dependent step '{dependant}' is {}", .status.label())]
    DependantActive {
        step: StepId,
        dependant: StepId,
        status: ApprovalStatus,
    },
    #[error("cannot {action} step '{step}' while it is {}", .from.label())]
    InvalidTransition {
        step: StepId,
        from: ApprovalStatus,
        action: &'static str,
    },
    #[error("step '{step}' belongs to the {} phase but the application is in the {} phase", .step_phase.label(), .current.label())]
    OutOfPhase {
        step: StepId,
        step_phase: WorkflowPhase,
        current: WorkflowPhase,
    },
    #[error("only a super administrator may {action} step '{step}'")]
    PrivilegeRequired { step: StepId, action: &'static str },
    #[error("application {0} has not completed the entry workflow")]
    EntryIncomplete(ApplicationId),
    #[error("application already has an approval record for step '{0}'")]
    DuplicateRecord(StepId),
}

impl Application {
    /// Open a `PENDING` record for every step of `definition`.
    ///
    /// Either every record is opened or none is.
    pub fn open_steps(
        &mut self,
        definition: &WorkflowDefinition,
        opened_at: DateTime<Utc>,
    ) -> Result<(), ApprovalError> {
        if let Some(existing) = definition
            .steps()
            .iter()
            .find(|step| self.record(&step.id).is_some())
        {
            return Err(ApprovalError::DuplicateRecord(existing.id.clone()));
        }

        self.approvals.extend(
            definition
                .steps()
                .iter()
                .cloned()
                .map(|step| ApprovalRecord::pending(step, opened_at)),
        );
        Ok(())
    }
}

/// Compute the overall status from the records of the application's current phase.
pub fn derive_status(application: &Application) -> ApplicationStatus {
    derive_status_in_phase(application, application.phase)
}

/// Overall status computed from the records of `phase` only.
///
/// `NOT_APPLICABLE` records are ignored, so a phase whose records are all waived settles.
pub fn derive_status_in_phase(application: &Application, phase: WorkflowPhase) -> ApplicationStatus {
    let records: Vec<&ApprovalRecord> = application
        .approvals
        .iter()
        .filter(|record| record.step.phase() == phase)
        .collect();

    let settled = match phase {
        WorkflowPhase::Entry => ApplicationStatus::Approved,
        WorkflowPhase::Exit => ApplicationStatus::Exited,
    };

    if records.is_empty() {
        return match phase {
            WorkflowPhase::Entry => ApplicationStatus::Pending,
            WorkflowPhase::Exit => ApplicationStatus::Exited,
        };
    }

    let applicable = || {
        records
            .iter()
            .map(|record| record.status)
            .filter(|status| *status != ApprovalStatus::NotApplicable)
    };

    if applicable().any(|status| status == ApprovalStatus::Rejected) {
        ApplicationStatus::Rejected
    } else if applicable().all(|status| status == ApprovalStatus::Approved) {
        settled
    } else if applicable().all(|status| status == ApprovalStatus::Pending) {
        ApplicationStatus::Pending
    } else {
        ApplicationStatus::InReview
    }
}

/// Recompute the derived status, store it on the application and return it.
pub fn recompute(application: &mut Application) -> ApplicationStatus {
    application.status = derive_status(application);
    application.status
}

pub fn apply_decision(
    application: &mut Application,
    step_id: &StepId,
    acting_role: AgencyRole,
    decision: Decision,
    reason: Option<&str>,
) -> Result<ApplicationStatus, ApprovalError> {
    apply_decision_at(application, step_id, acting_role, decision, reason, Utc::now())
}

/// Apply an officer decision to one step, stamping the record with `now`.
pub fn apply_decision_at(
    application: &mut Application,
    step_id: &StepId,
    acting_role: AgencyRole,
    decision: Decision,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ApplicationStatus, ApprovalError> {
    let index = authorized_record(application, step_id, acting_role)?;

    let reason = reason.filter(|text| !text.trim().is_empty());
    if decision == Decision::Reject && reason.is_none() {
        return Err(ApprovalError::MissingReason(step_id.clone()));
    }

    ensure_current_phase(application, index)?;

    let current = application.approvals[index].status;
    let (next, stored_reason) = match (decision, current) {
        (Decision::Approve, ApprovalStatus::Pending | ApprovalStatus::InReview) => {
            ensure_dependencies(application, index)?;
            (ApprovalStatus::Approved, None)
        }
        (Decision::Reject, ApprovalStatus::Pending | ApprovalStatus::InReview) => {
            (ApprovalStatus::Rejected, reason.map(str::to_string))
        }
        (Decision::Revoke, ApprovalStatus::Pending) => return Ok(recompute(application)),
        (Decision::Revoke, ApprovalStatus::Approved | ApprovalStatus::InReview) => {
            ensure_no_active_dependants(application, index)?;
            (ApprovalStatus::Pending, None)
        }
        (decision, from) => {
            return Err(ApprovalError::InvalidTransition {
                step: step_id.clone(),
                from,
                action: decision.verb(),
            })
        }
    };

    let record = &mut application.approvals[index];
    record.status = next;
    record.rejection_reason = stored_reason;
    record.acting_role = Some(acting_role);
    record.updated_at = now;

    Ok(recompute(application))
}

pub fn start_review(
    application: &mut Application,
    step_id: &StepId,
    acting_role: AgencyRole,
) -> Result<ApplicationStatus, ApprovalError> {
    start_review_at(application, step_id, acting_role, Utc::now())
}

/// Move a pending step into review. Already-reviewing steps are left untouched.
pub fn start_review_at(
    application: &mut Application,
    step_id: &StepId,
    acting_role: AgencyRole,
    now: DateTime<Utc>,
) -> Result<ApplicationStatus, ApprovalError> {
    let index = authorized_record(application, step_id, acting_role)?;
    ensure_current_phase(application, index)?;

    match application.approvals[index].status {
        ApprovalStatus::InReview => Ok(recompute(application)),
        ApprovalStatus::Pending => {
            ensure_dependencies(application, index)?;
            let record = &mut application.approvals[index];
            record.status = ApprovalStatus::InReview;
            record.acting_role = Some(acting_role);
            record.updated_at = now;
            Ok(recompute(application))
        }
        from => Err(ApprovalError::InvalidTransition {
            step: step_id.clone(),
            from,
            action: "review",
        }),
    }
}

pub fn reopen(
    application: &mut Application,
    step_id: &StepId,
    acting_role: AgencyRole,
) -> Result<ApplicationStatus, ApprovalError> {
    reopen_at(application, step_id, acting_role, Utc::now())
}

/// Privileged re-open of a rejected step back to `PENDING`.
pub fn reopen_at(
    application: &mut Application,
    step_id: &StepId,
    acting_role: AgencyRole,
    now: DateTime<Utc>,
) -> Result<ApplicationStatus, ApprovalError> {
    let index = privileged_record(application, step_id, acting_role, "reopen")?;
    ensure_current_phase(application, index)?;

    let record = &mut application.approvals[index];
    if record.status != ApprovalStatus::Rejected {
        return Err(ApprovalError::InvalidTransition {
            step: step_id.clone(),
            from: record.status,
            action: "reopen",
        });
    }

    record.status = ApprovalStatus::Pending;
    record.rejection_reason = None;
    record.acting_role = Some(acting_role);
    record.updated_at = now;
    Ok(recompute(application))
}

pub fn mark_not_applicable(
    application: &mut Application,
    step_id: &StepId,
    acting_role: AgencyRole,
) -> Result<ApplicationStatus, ApprovalError> {
    mark_not_applicable_at(application, step_id, acting_role, Utc::now())
}

/// Privileged waiver of a step that does not apply to this applicant.
pub fn mark_not_applicable_at(
    application: &mut Application,
    step_id: &StepId,
    acting_role: AgencyRole,
    now: DateTime<Utc>,
) -> Result<ApplicationStatus, ApprovalError> {
    let index = privileged_record(application, step_id, acting_role, "waive")?;
    ensure_current_phase(application, index)?;

    let record = &mut application.approvals[index];
    match record.status {
        ApprovalStatus::Pending | ApprovalStatus::InReview => {
            record.status = ApprovalStatus::NotApplicable;
            record.rejection_reason = None;
            record.acting_role = Some(acting_role);
            record.updated_at = now;
            Ok(recompute(application))
        }
        from => Err(ApprovalError::InvalidTransition {
            step: step_id.clone(),
            from,
            action: "waive",
        }),
    }
}

pub fn initialize_exit(
    application: &mut Application,
    catalog: &WorkflowCatalog,
) -> Result<ApplicationStatus, ApprovalError> {
    initialize_exit_at(application, catalog, Utc::now())
}

/// Start the exit workflow for an application whose entry workflow is approved.
pub fn initialize_exit_at(
    application: &mut Application,
    catalog: &WorkflowCatalog,
    now: DateTime<Utc>,
) -> Result<ApplicationStatus, ApprovalError> {
    if application.phase != WorkflowPhase::Entry
        || derive_status(application) != ApplicationStatus::Approved
    {
        return Err(ApprovalError::EntryIncomplete(application.id));
    }

    application.open_steps(catalog.exit(), now)?;
    application.phase = WorkflowPhase::Exit;
    Ok(recompute(application))
}

fn authorized_record(
    application: &Application,
    step_id: &StepId,
    acting_role: AgencyRole,
) -> Result<usize, ApprovalError> {
    let index = application
        .record_index(step_id)
        .ok_or_else(|| ApprovalError::StepNotFound(step_id.clone()))?;

    let required = application.approvals[index].step.required_role;
    if acting_role != required && !acting_role.bypasses_role_matching() {
        return Err(ApprovalError::RoleMismatch {
            step: step_id.clone(),
            acting: acting_role,
            required,
        });
    }

    Ok(index)
}

fn privileged_record(
    application: &Application,
    step_id: &StepId,
    acting_role: AgencyRole,
    action: &'static str,
) -> Result<usize, ApprovalError> {
    let index = application
        .record_index(step_id)
        .ok_or_else(|| ApprovalError::StepNotFound(step_id.clone()))?;

    if !acting_role.bypasses_role_matching() {
        return Err(ApprovalError::PrivilegeRequired {
            step: step_id.clone(),
            action,
        });
    }

    Ok(index)
}

fn ensure_current_phase(application: &Application, index: usize) -> Result<(), ApprovalError> {
    let record = &application.approvals[index];
    let step_phase = record.step.phase();
    if step_phase != application.phase {
        return Err(ApprovalError::OutOfPhase {
            step: record.step.id.clone(),
            step_phase,
            current: application.phase,
        });
    }
    Ok(())
}

fn ensure_dependencies(application: &Application, index: usize) -> Result<(), ApprovalError> {
    let step = &application.approvals[index].step;
    for dependency in &step.depends_on {
        let satisfied = application
            .record(dependency)
            .map(|record| record.status.satisfies_dependency())
            .unwrap_or(false);
        if !satisfied {
            return Err(ApprovalError::DependencyPending {
                step: step.id.clone(),
                dependency: dependency.clone(),
            });
        }
    }
    Ok(())
}

/// Dependants that reviewed or approved on top of this step pin it in place.
fn ensure_no_active_dependants(application: &Application, index: usize) -> Result<(), ApprovalError> {
    let step = &application.approvals[index].step;
    let active = application.approvals.iter().find(|record| {
        record.step.depends_on.contains(&step.id)
            && matches!(
                record.status,
                ApprovalStatus::InReview | ApprovalStatus::Approved
            )
    });

    match active {
        Some(record) => Err(ApprovalError::DependantActive {
            step: step.id.clone(),
            dependant: record.step.id.clone(),
            status: record.status,
        }),
        None => Ok(()),
    }
}
