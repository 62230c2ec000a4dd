use super::common::*;
use std::sync::Arc;

use crate::workflows::accreditation::applications::intake::IntakeViolation;
use crate::workflows::accreditation::applications::repository::{
    ApplicationRepository, RepositoryError,
};
use crate::workflows::accreditation::applications::{
    AccreditationService, AccreditationServiceError,
};
use crate::workflows::accreditation::domain::{
    AgencyRole, ApplicationId, ApplicationStatus, ApprovalStatus, EquipmentStatus, StepId,
    WorkflowPhase,
};
use crate::workflows::accreditation::engine::{ApprovalError, Decision};
use crate::workflows::accreditation::equipment::EquipmentError;
use crate::workflows::accreditation::projection::ProjectedStatus;
use crate::workflows::accreditation::query::{ApplicationQuery, PageLimits};

fn ema() -> StepId {
    StepId::new("ema_review")
}

fn customs() -> StepId {
    StepId::new("customs_clearance")
}

#[test]
fn submit_opens_entry_records_and_sanitizes_applicant() {
    let (service, repository, _) = build_service();

    let application = service.submit(submission()).expect("submission accepted");

    assert_eq!(application.status, ApplicationStatus::Pending);
    assert_eq!(application.phase, WorkflowPhase::Entry);
    assert_eq!(application.applicant.passport_number, "A1234567");
    assert_eq!(application.approvals.len(), 2);
    assert!(application
        .approvals
        .iter()
        .all(|record| record.status == ApprovalStatus::Pending));

    let stored = repository
        .fetch(application.id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(stored, application);
}

#[test]
fn submit_propagates_intake_errors() {
    let (service, _, _) = build_service();
    let mut incomplete = submission();
    incomplete.applicant.full_name = "   ".to_string();

    match service.submit(incomplete) {
        Err(AccreditationServiceError::Intake(IntakeViolation::MissingFullName)) => {}
        other => panic!("expected intake violation, got {other:?}"),
    }
}

#[test]
fn two_agency_approval_settles_and_notifies_once() {
    let (service, _, notifications) = build_service();
    let application = service.submit(submission()).expect("submitted");

    let after_ema = service
        .decide(
            application.id,
            &ema(),
            AgencyRole::EmaOfficer,
            Decision::Approve,
            None,
            None,
        )
        .expect("ema approves");
    assert_eq!(after_ema.status, ApplicationStatus::InReview);
    assert!(notifications.notices().is_empty());

    let after_customs = service
        .decide(
            application.id,
            &customs(),
            AgencyRole::CustomsOfficer,
            Decision::Approve,
            None,
            Some(after_ema.version),
        )
        .expect("customs approves");
    assert_eq!(after_customs.status, ApplicationStatus::Approved);
    assert_eq!(after_customs.version, 2);

    let notices = notifications.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].template, "accreditation_approved");
    assert_eq!(notices[0].application_id, application.id);
}

#[test]
fn rejection_notice_carries_reason() {
    let (service, _, notifications) = build_service();
    let application = service.submit(submission()).expect("submitted");

    let rejected = service
        .decide(
            application.id,
            &ema(),
            AgencyRole::EmaOfficer,
            Decision::Reject,
            Some("missing credentials"),
            None,
        )
        .expect("ema rejects");

    assert_eq!(rejected.status, ApplicationStatus::Rejected);
    let notices = notifications.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].template, "accreditation_rejected");
    assert_eq!(
        notices[0].details.get("reason").map(String::as_str),
        Some("missing credentials")
    );
}

#[test]
fn stale_version_is_rejected() {
    let (service, _, _) = build_service();
    let application = service.submit(submission()).expect("submitted");

    service
        .start_review(application.id, &ema(), AgencyRole::EmaOfficer, Some(0))
        .expect("first writer wins");

    match service.decide(
        application.id,
        &ema(),
        AgencyRole::EmaOfficer,
        Decision::Approve,
        None,
        Some(0),
    ) {
        Err(AccreditationServiceError::Repository(RepositoryError::StaleVersion {
            expected: 0,
            found: 1,
        })) => {}
        other => panic!("expected stale version, got {other:?}"),
    }
}

#[test]
fn engine_errors_leave_stored_application_untouched() {
    let (service, repository, _) = build_service();
    let application = service.submit(submission()).expect("submitted");

    match service.decide(
        application.id,
        &ema(),
        AgencyRole::CustomsOfficer,
        Decision::Approve,
        None,
        None,
    ) {
        Err(AccreditationServiceError::Approval(ApprovalError::RoleMismatch { .. })) => {}
        other => panic!("expected role mismatch, got {other:?}"),
    }

    match service.decide(
        application.id,
        &customs(),
        AgencyRole::CustomsOfficer,
        Decision::Approve,
        None,
        None,
    ) {
        Err(AccreditationServiceError::Approval(ApprovalError::DependencyPending {
            dependency,
            ..
        })) => assert_eq!(dependency, ema()),
        other => panic!("expected dependency pending, got {other:?}"),
    }

    let stored = repository
        .fetch(application.id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(stored.version, 0);
    assert_eq!(stored, application);
}

#[test]
fn exit_workflow_runs_after_entry_approval() {
    let (service, _, notifications) = build_service();
    let application = service.submit(submission()).expect("submitted");

    match service.initialize_exit(application.id, None) {
        Err(AccreditationServiceError::Approval(ApprovalError::EntryIncomplete(id))) => {
            assert_eq!(id, application.id)
        }
        other => panic!("expected entry incomplete, got {other:?}"),
    }

    for (step, role) in [
        (ema(), AgencyRole::EmaOfficer),
        (customs(), AgencyRole::CustomsOfficer),
    ] {
        service
            .decide(application.id, &step, role, Decision::Approve, None, None)
            .expect("entry approval");
    }

    let exiting = service
        .initialize_exit(application.id, None)
        .expect("exit opens");
    assert_eq!(exiting.phase, WorkflowPhase::Exit);
    assert_eq!(exiting.status, ApplicationStatus::Pending);
    assert_eq!(exiting.approvals.len(), 3);

    let view = service
        .project(application.id, AgencyRole::CustomsOfficer)
        .expect("projection");
    assert_eq!(view.projection.step_id, Some(StepId::new("customs_exit")));
    assert_eq!(view.projection.status, ProjectedStatus::Pending);

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

    let templates: Vec<String> = notifications
        .notices()
        .into_iter()
        .map(|notice| notice.template)
        .collect();
    assert_eq!(
        templates,
        vec![
            "accreditation_approved".to_string(),
            "accreditation_exit_cleared".to_string()
        ]
    );
}

#[test]
fn notification_failures_do_not_fail_the_decision() {
    let repository = Arc::new(MemoryRepository::default());
    let service = AccreditationService::new(
        repository.clone(),
        Arc::new(OfflineNotifications),
        two_agency_catalog(),
    );
    let application = service.submit(submission()).expect("submitted");

    let rejected = service
        .decide(
            application.id,
            &ema(),
            AgencyRole::EmaOfficer,
            Decision::Reject,
            Some("expired press card"),
            None,
        )
        .expect("decision persists despite notification failure");

    assert_eq!(rejected.status, ApplicationStatus::Rejected);
    let stored = repository
        .fetch(application.id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(stored.status, ApplicationStatus::Rejected);
}

#[test]
fn reopen_and_waive_require_super_admin() {
    let (service, _, _) = build_service();
    let application = service.submit(submission()).expect("submitted");
    service
        .decide(
            application.id,
            &ema(),
            AgencyRole::EmaOfficer,
            Decision::Reject,
            Some("blurred photo"),
            None,
        )
        .expect("rejected");

    match service.reopen(application.id, &ema(), AgencyRole::EmaOfficer, None) {
        Err(AccreditationServiceError::Approval(ApprovalError::PrivilegeRequired { .. })) => {}
        other => panic!("expected privilege error, got {other:?}"),
    }

    let reopened = service
        .reopen(application.id, &ema(), AgencyRole::SuperAdmin, None)
        .expect("super admin reopens");
    assert_eq!(reopened.status, ApplicationStatus::Pending);

    service
        .waive(application.id, &customs(), AgencyRole::SuperAdmin, None)
        .expect("customs waived");
    let approved = service
        .decide(
            application.id,
            &ema(),
            AgencyRole::EmaOfficer,
            Decision::Approve,
            None,
            None,
        )
        .expect("ema approves");
    assert_eq!(approved.status, ApplicationStatus::Approved);
}

#[test]
fn equipment_verdicts_do_not_change_overall_status() {
    let (service, _, _) = build_service();
    let application = service.submit(submission()).expect("submitted");

    match service.set_equipment_status(application.id, 0, EquipmentStatus::Rejected, None, None) {
        Err(AccreditationServiceError::Equipment(EquipmentError::MissingReason(0))) => {}
        other => panic!("expected missing reason, got {other:?}"),
    }
    match service.set_equipment_status(application.id, 4, EquipmentStatus::Approved, None, None) {
        Err(AccreditationServiceError::Equipment(EquipmentError::IndexOutOfRange {
            index: 4,
            len: 1,
        })) => {}
        other => panic!("expected index out of range, got {other:?}"),
    }

    let updated = service
        .set_equipment_status(
            application.id,
            0,
            EquipmentStatus::Rejected,
            Some("no aviation permit"),
            None,
        )
        .expect("drone rejected");

    assert_eq!(updated.equipment[0].status, EquipmentStatus::Rejected);
    assert_eq!(updated.status, ApplicationStatus::Pending);
    assert_eq!(updated.version, 1);
}

#[test]
fn list_for_role_filters_and_projects() {
    let (service, _, _) = build_service();
    let service = service.with_page_limits(PageLimits {
        default_page_size: 1,
        max_page_size: 5,
    });

    let first = service.submit(submission()).expect("first");
    let mut kenyan = submission();
    kenyan.applicant.full_name = "Wanjiru Kamau".to_string();
    kenyan.applicant.nationality = "Kenya".to_string();
    service.submit(kenyan).expect("second");

    let all = service
        .list_for_role(ApplicationQuery::default(), AgencyRole::SuperAdmin)
        .expect("list");
    assert_eq!(all.total, 2);
    assert_eq!(all.items.len(), 1);
    assert_eq!(all.page_size, 1);

    let nigerian = service
        .list_for_role(
            ApplicationQuery {
                nationality: Some("nigeria".to_string()),
                ..ApplicationQuery::default()
            },
            AgencyRole::EmaOfficer,
        )
        .expect("filtered list");
    assert_eq!(nigerian.total, 1);
    assert_eq!(nigerian.items[0].application_id, first.id);
    assert_eq!(nigerian.items[0].projection.step_id, Some(ema()));
}

#[test]
fn get_propagates_not_found() {
    let (service, _, _) = build_service();

    match service.get(ApplicationId(u64::MAX)) {
        Err(AccreditationServiceError::Repository(RepositoryError::NotFound)) => {}
        other => panic!("expected not found error, got {other:?}"),
    }
}
