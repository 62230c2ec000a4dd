use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for submitted accreditation applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub u64);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a workflow step, as authored in the workflow builder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub String);

impl StepId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Agencies and officers that can act on, or view, an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgencyRole {
    #[serde(alias = "ADMIN")]
    SuperAdmin,
    #[serde(alias = "EMA")]
    EmaOfficer,
    #[serde(alias = "CUSTOMS")]
    CustomsOfficer,
    #[serde(alias = "ICS")]
    IcsOfficer,
    #[serde(alias = "INSA")]
    InsaOfficer,
}

impl AgencyRole {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::SuperAdmin,
            Self::EmaOfficer,
            Self::CustomsOfficer,
            Self::IcsOfficer,
            Self::InsaOfficer,
        ]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::EmaOfficer => "EMA_OFFICER",
            Self::CustomsOfficer => "CUSTOMS_OFFICER",
            Self::IcsOfficer => "ICS_OFFICER",
            Self::InsaOfficer => "INSA_OFFICER",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::SuperAdmin => "Super Administrator",
            Self::EmaOfficer => "Media Authority Officer",
            Self::CustomsOfficer => "Customs Officer",
            Self::IcsOfficer => "Immigration & Citizenship Officer",
            Self::InsaOfficer => "Security Services Officer",
        }
    }

    /// Whether the role may act on any step regardless of the step's required role.
    pub const fn bypasses_role_matching(self) -> bool {
        matches!(self, Self::SuperAdmin)
    }
}

impl fmt::Display for AgencyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown agency role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for AgencyRole {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "SUPER_ADMIN" | "SUPERADMIN" | "ADMIN" => Ok(Self::SuperAdmin),
            "EMA_OFFICER" | "EMA" => Ok(Self::EmaOfficer),
            "CUSTOMS_OFFICER" | "CUSTOMS" => Ok(Self::CustomsOfficer),
            "ICS_OFFICER" | "ICS" => Ok(Self::IcsOfficer),
            "INSA_OFFICER" | "INSA" => Ok(Self::InsaOfficer),
            _ => Err(UnknownRole(value.trim().to_string())),
        }
    }
}

/// Arrival and departure clearance are governed by disjoint sets of steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Entry,
    Exit,
}

impl WorkflowPhase {
    pub const fn for_step(is_exit_step: bool) -> Self {
        if is_exit_step {
            Self::Exit
        } else {
            Self::Entry
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Entry => "Entry",
            Self::Exit => "Exit",
        }
    }
}

/// A named approval checkpoint requiring sign-off from one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: StepId,
    pub name: String,
    pub required_role: AgencyRole,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub is_exit_step: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_group: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<StepId>,
    #[serde(default)]
    pub root: bool,
}

impl WorkflowStep {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        required_role: AgencyRole,
        order: u32,
    ) -> Self {
        Self {
            id: StepId::new(id),
            name: name.into(),
            required_role,
            order,
            is_exit_step: false,
            parallel_group: None,
            depends_on: Vec::new(),
            root: false,
        }
    }

    pub fn exit(mut self) -> Self {
        self.is_exit_step = true;
        self
    }

    pub fn as_root(mut self) -> Self {
        self.root = true;
        self
    }

    pub fn phase(&self) -> WorkflowPhase {
        WorkflowPhase::for_step(self.is_exit_step)
    }
}

/// Per-step verdict state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    InReview,
    Approved,
    Rejected,
    NotApplicable,
}

impl ApprovalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InReview => "In Review",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::NotApplicable => "Not Applicable",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Whether a dependent step may proceed past this one.
    pub const fn satisfies_dependency(self) -> bool {
        matches!(self, Self::Approved | Self::NotApplicable)
    }
}

/// Overall application status derived from the approval records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    InReview,
    Approved,
    Rejected,
    Exited,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InReview => "In Review",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Exited => "Exited",
        }
    }

    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Exited)
    }
}

/// The per-(application, step) decision state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub step: WorkflowStep,
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acting_role: Option<AgencyRole>,
}

impl ApprovalRecord {
    pub fn pending(step: WorkflowStep, opened_at: DateTime<Utc>) -> Self {
        Self {
            step,
            status: ApprovalStatus::Pending,
            rejection_reason: None,
            updated_at: opened_at,
            acting_role: None,
        }
    }

    pub fn step_id(&self) -> &StepId {
        &self.step.id
    }
}

/// Who the application belongs to; free-form details live in the form data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantRef {
    pub full_name: String,
    pub passport_number: String,
    pub nationality: String,
    #[serde(default)]
    pub media_outlet: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentStatus {
    Pending,
    Approved,
    Rejected,
}

impl EquipmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

/// Declared technical characteristics of a piece of equipment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquipmentSpecs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Camera, drone, transmitter or similar item declared by the applicant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentItem {
    pub kind: String,
    pub model: String,
    #[serde(default)]
    pub specs: EquipmentSpecs,
    #[serde(default = "default_equipment_status")]
    pub status: EquipmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_equipment_status() -> EquipmentStatus {
    EquipmentStatus::Pending
}

/// Inbound payload captured by the registration form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub applicant: ApplicantRef,
    #[serde(default)]
    pub form_data: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub equipment: Vec<EquipmentItem>,
}

/// One applicant's accreditation request and every approval recorded against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub applicant: ApplicantRef,
    #[serde(default)]
    pub form_data: BTreeMap<String, serde_json::Value>,
    pub status: ApplicationStatus,
    pub phase: WorkflowPhase,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub approvals: Vec<ApprovalRecord>,
    #[serde(default)]
    pub equipment: Vec<EquipmentItem>,
    #[serde(default)]
    pub version: u64,
}

impl Application {
    pub fn new(
        id: ApplicationId,
        submission: ApplicationSubmission,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            applicant: submission.applicant,
            form_data: submission.form_data,
            status: ApplicationStatus::Pending,
            phase: WorkflowPhase::Entry,
            created_at,
            approvals: Vec::new(),
            equipment: submission.equipment,
            version: 0,
        }
    }

    pub fn record(&self, step_id: &StepId) -> Option<&ApprovalRecord> {
        self.approvals
            .iter()
            .find(|record| &record.step.id == step_id)
    }

    pub(crate) fn record_index(&self, step_id: &StepId) -> Option<usize> {
        self.approvals
            .iter()
            .position(|record| &record.step.id == step_id)
    }

    /// Records belonging to `phase`, ordered by step order with ties kept in insertion order.
    pub fn records_in_phase(&self, phase: WorkflowPhase) -> Vec<&ApprovalRecord> {
        let mut records: Vec<&ApprovalRecord> = self
            .approvals
            .iter()
            .filter(|record| record.step.phase() == phase)
            .collect();
        records.sort_by_key(|record| record.step.order);
        records
    }
}
