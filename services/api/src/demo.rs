use crate::infra::{load_catalog, InMemoryApplicationRepository, InMemoryNotificationPublisher};
use accreditation::error::AppError;
use accreditation::workflows::accreditation::{
    AccreditationService, AgencyRole, ApplicantRef, Application, ApplicationRepository,
    ApplicationStatus, ApplicationSubmission, Decision, EquipmentItem, EquipmentSpecs,
    EquipmentStatus, NotificationPublisher, StepId, WorkflowDefinition, WorkflowPhase,
};
use chrono::{Local, NaiveDate};
use clap::Args;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct WorkflowValidateArgs {
    /// Workflow builder CSV export. Defaults to the standard catalog.
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Workflow builder CSV export to run the demo against.
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
    /// Arrival date recorded on the application (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) arrival: Option<NaiveDate>,
    /// Reject the declared drone instead of approving it.
    #[arg(long)]
    pub(crate) reject_drone: bool,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("expected YYYY-MM-DD, got '{raw}': {err}"))
}

pub(crate) fn run_workflow_validation(args: WorkflowValidateArgs) -> Result<(), AppError> {
    let (catalog, source) = load_catalog(args.csv.as_deref())?;
    println!("Workflow catalog ({source:?})");
    render_definition(catalog.entry());
    render_definition(catalog.exit());
    Ok(())
}

fn render_definition(definition: &WorkflowDefinition) {
    let phase = definition.phase().label();
    if definition.is_empty() {
        println!("\n{phase} workflow: no steps (applications settle immediately)");
        return;
    }

    println!("\n{phase} workflow: {} steps", definition.steps().len());
    for (position, step) in definition.steps().iter().enumerate() {
        let depends_on = if step.depends_on.is_empty() {
            "-".to_string()
        } else {
            join(&step.depends_on)
        };
        println!(
            "  {}. {} [{}] role={} after={}",
            position + 1,
            step.name,
            step.id,
            step.required_role,
            depends_on
        );
    }

    let parallel: Vec<_> = definition
        .plan()
        .groups()
        .iter()
        .filter(|group| group.steps.len() > 1)
        .collect();
    if !parallel.is_empty() {
        println!("  Parallel groups:");
        for group in parallel {
            println!("    - {}: {}", group.id, join(&group.steps));
        }
    }

    println!("  Step owners:");
    for role in AgencyRole::ordered() {
        let owned = definition.steps_for_role(role);
        if !owned.is_empty() {
            println!("    - {}: {}", role.label(), owned.len());
        }
    }
}

fn join(ids: &[StepId]) -> String {
    ids.iter()
        .map(StepId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        csv,
        arrival,
        reject_drone,
    } = args;
    let arrival = arrival.unwrap_or_else(|| Local::now().date_naive());

    let (catalog, _) = load_catalog(csv.as_deref())?;
    let notifications = Arc::new(InMemoryNotificationPublisher::default());
    let service = AccreditationService::new(
        Arc::new(InMemoryApplicationRepository::default()),
        notifications.clone(),
        catalog,
    );

    println!("Media accreditation demo");
    let mut application = service.submit(demo_submission(arrival))?;
    println!(
        "- Submitted application {} for {} ({} equipment items, {} approval steps)",
        application.id,
        application.applicant.full_name,
        application.equipment.len(),
        application.approvals.len()
    );

    application = approve_phase(&service, application, WorkflowPhase::Entry)?;
    render_projections(&application);

    let verdict = if reject_drone {
        EquipmentStatus::Rejected
    } else {
        EquipmentStatus::Approved
    };
    application = service.set_equipment_status(
        application.id,
        0,
        verdict,
        Some("Flight permit not attached"),
        Some(application.version),
    )?;
    println!(
        "\nEquipment ledger: {} -> {} (application stays {})",
        application.equipment[0].model,
        application.equipment[0].status.label(),
        application.status.label()
    );

    if application.status != ApplicationStatus::Approved {
        println!("\nEntry clearance did not settle as approved; exit workflow skipped");
        return Ok(());
    }

    application = service.initialize_exit(application.id, Some(application.version))?;
    println!("\nExit workflow opened -> {}", application.status.label());
    application = approve_phase(&service, application, WorkflowPhase::Exit)?;
    println!("Final status: {}", application.status.label());

    println!("\nNotifications dispatched:");
    for notice in notifications.notices() {
        println!(
            "  - {} -> application {} ({})",
            notice.template,
            notice.application_id,
            notice.status.label()
        );
    }

    Ok(())
}

/// Each step is approved by its owning officer, in execution order.
fn approve_phase<R, N>(
    service: &AccreditationService<R, N>,
    mut application: Application,
    phase: WorkflowPhase,
) -> Result<Application, AppError>
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let steps = service.catalog().definition(phase).steps().to_vec();
    println!("\n{} approvals:", phase.label());
    for step in steps {
        application = service.decide(
            application.id,
            &step.id,
            step.required_role,
            Decision::Approve,
            None,
            Some(application.version),
        )?;
        let settled = application
            .record(&step.id)
            .map(|record| record.status.is_terminal())
            .unwrap_or(false);
        println!(
            "  - {} approved by {} (settled: {}) -> application {}",
            step.name,
            step.required_role.label(),
            settled,
            application.status.label()
        );
    }
    Ok(application)
}

fn render_projections(application: &Application) {
    println!("\nRole views:");
    for role in AgencyRole::ordered() {
        let view = application.view_for(role);
        let step = view
            .projection
            .step_name
            .as_deref()
            .unwrap_or("overall status");
        println!(
            "  - {:<34} {:<12} ({step})",
            role.label(),
            view.projection.status_label
        );
    }
}

fn demo_submission(arrival: NaiveDate) -> ApplicationSubmission {
    let mut form_data = BTreeMap::new();
    form_data.insert("arrival_date".to_string(), json!(arrival.to_string()));
    form_data.insert("arrival_airport".to_string(), json!("Bole International"));
    form_data.insert("event".to_string(), json!("Continental Summit"));

    ApplicationSubmission {
        applicant: ApplicantRef {
            full_name: "Amara Okafor".to_string(),
            passport_number: "A09876543".to_string(),
            nationality: "Nigeria".to_string(),
            media_outlet: "Lagos Daily Wire".to_string(),
        },
        form_data,
        equipment: vec![EquipmentItem {
            kind: "Drone".to_string(),
            model: "DJI Mavic 3".to_string(),
            specs: EquipmentSpecs {
                weight_kg: Some(0.9),
                frequency: Some("2.4 GHz".to_string()),
                category: Some("aerial".to_string()),
            },
            status: EquipmentStatus::Pending,
            rejection_reason: None,
            updated_at: None,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accreditation::workflows::accreditation::WorkflowCatalog;

    #[test]
    fn parse_date_accepts_iso_dates_only() {
        assert_eq!(
            parse_date(" 2026-03-14 "),
            Ok(NaiveDate::from_ymd_opt(2026, 3, 14).expect("valid date"))
        );
        assert!(parse_date("14/03/2026").is_err());
    }

    #[test]
    fn demo_runs_against_standard_catalog() {
        let args = DemoArgs {
            arrival: NaiveDate::from_ymd_opt(2026, 3, 14),
            ..DemoArgs::default()
        };
        run_demo(args).expect("demo completes");
    }

    #[test]
    fn demo_submission_passes_intake() {
        let service = AccreditationService::new(
            Arc::new(InMemoryApplicationRepository::default()),
            Arc::new(InMemoryNotificationPublisher::default()),
            WorkflowCatalog::standard(),
        );
        let stored = service
            .submit(demo_submission(NaiveDate::from_ymd_opt(2026, 3, 14).expect("date")))
            .expect("submission accepted");
        assert_eq!(stored.approvals.len(), 4);
        assert_eq!(stored.equipment.len(), 1);
    }
}
