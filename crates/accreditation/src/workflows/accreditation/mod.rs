//! Multi-agency approval core: step graph validation, record transitions, role-scoped views,
//! and the per-item equipment ledger.

pub mod applications;
mod blueprint;
pub mod domain;
pub mod engine;
pub mod equipment;
pub mod graph;
mod projection;
pub mod query;

pub use applications::{
    application_router, AccreditationService, AccreditationServiceError, ApplicationDetailView,
    ApplicationRepository, ApplicationView, IntakeViolation, NotificationError,
    NotificationPublisher, RepositoryError, StatusNotice,
};
pub use blueprint::{WorkflowCatalog, WorkflowDefinition};
pub use domain::{
    AgencyRole, ApplicantRef, Application, ApplicationId, ApplicationStatus,
    ApplicationSubmission, ApprovalRecord, ApprovalStatus, EquipmentItem, EquipmentSpecs,
    EquipmentStatus, StepId, UnknownRole, WorkflowPhase, WorkflowStep,
};
pub use engine::{
    apply_decision, derive_status, derive_status_in_phase, ApprovalError, Decision,
};
pub use equipment::{set_item_status, EquipmentError, EquipmentSummary};
pub use graph::{
    validate_graph, DependencyEdge, ExecutionPlan, GraphError, ParallelGroup, WorkflowGraph,
};
pub use projection::{project_for_role, project_for_role_in_phase, ProjectedStatus, RoleProjection};
pub use query::{ApplicationQuery, Page, PageLimits};
