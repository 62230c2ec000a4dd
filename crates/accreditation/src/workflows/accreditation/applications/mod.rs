//! Application intake, persistence seams, and the HTTP surface over the approval engine.

pub(crate) mod intake;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use intake::{IntakeGuard, IntakeViolation};
pub use repository::{
    ApplicationDetailView, ApplicationRepository, ApplicationView, NotificationError,
    NotificationPublisher, RepositoryError, StatusNotice,
};
pub use router::application_router;
pub use service::{AccreditationService, AccreditationServiceError};
