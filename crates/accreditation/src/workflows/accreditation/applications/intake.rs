use super::super::domain::{ApplicationSubmission, EquipmentStatus};

/// Validation errors raised before a submission enters the approval workflow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeViolation {
    #[error("applicant full name is required")]
    MissingFullName,
    #[error("applicant passport or reference number is required")]
    MissingPassportNumber,
    #[error("applicant nationality is required")]
    MissingNationality,
    #[error("equipment item {0} must declare both a type and a model")]
    IncompleteEquipment(usize),
}

/// Guard producing a clean submission from raw registration form input.
#[derive(Debug, Clone, Default)]
pub struct IntakeGuard;

impl IntakeGuard {
    pub fn sanitize(
        &self,
        mut submission: ApplicationSubmission,
    ) -> Result<ApplicationSubmission, IntakeViolation> {
        let applicant = &mut submission.applicant;
        applicant.full_name = collapse_whitespace(&applicant.full_name);
        applicant.passport_number = applicant.passport_number.trim().to_ascii_uppercase();
        applicant.nationality = collapse_whitespace(&applicant.nationality);
        applicant.media_outlet = collapse_whitespace(&applicant.media_outlet);

        if applicant.full_name.is_empty() {
            return Err(IntakeViolation::MissingFullName);
        }
        if applicant.passport_number.is_empty() {
            return Err(IntakeViolation::MissingPassportNumber);
        }
        if applicant.nationality.is_empty() {
            return Err(IntakeViolation::MissingNationality);
        }

        for (index, item) in submission.equipment.iter_mut().enumerate() {
            item.kind = item.kind.trim().to_string();
            item.model = item.model.trim().to_string();
            if item.kind.is_empty() || item.model.is_empty() {
                return Err(IntakeViolation::IncompleteEquipment(index));
            }
            // Reviewer verdicts are never accepted from the applicant.
            item.status = EquipmentStatus::Pending;
            item.rejection_reason = None;
            item.updated_at = None;
        }

        Ok(submission)
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
