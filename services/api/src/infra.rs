use accreditation::error::AppError;
use accreditation::workflows::accreditation::{
    Application, ApplicationId, ApplicationQuery, ApplicationRepository, NotificationError,
    NotificationPublisher, Page, RepositoryError, StatusNotice, WorkflowCatalog,
};
use accreditation::workflows::catalog::WorkflowCatalogImporter;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) catalog: Arc<WorkflowCatalog>,
    pub(crate) catalog_source: CatalogSource,
}

/// Where the active workflow catalog came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum CatalogSource {
    Csv,
    Standard,
}

pub(crate) fn load_catalog(
    path: Option<&Path>,
) -> Result<(WorkflowCatalog, CatalogSource), AppError> {
    match path {
        Some(path) => {
            let catalog = WorkflowCatalogImporter::from_path(path)?;
            info!(path = %path.display(), "workflow catalog imported");
            Ok((catalog, CatalogSource::Csv))
        }
        None => Ok((WorkflowCatalog::standard(), CatalogSource::Standard)),
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    records: Arc<Mutex<BTreeMap<ApplicationId, Application>>>,
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(application.id, application.clone());
        Ok(application)
    }

    fn update(
        &self,
        mut application: Application,
        expected_version: u64,
    ) -> Result<Application, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let found = match guard.get(&application.id) {
            Some(stored) => stored.version,
            None => return Err(RepositoryError::NotFound),
        };
        if found != expected_version {
            return Err(RepositoryError::StaleVersion {
                expected: expected_version,
                found,
            });
        }

        application.version = found + 1;
        guard.insert(application.id, application.clone());
        Ok(application)
    }

    fn fetch(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(&id).cloned())
    }

    fn list(&self, query: &ApplicationQuery) -> Result<Page<Application>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let matching = guard
            .values()
            .filter(|application| query.matches(application))
            .cloned()
            .collect();
        Ok(Page::from_filtered(matching, query))
    }
}

/// Stands in for the e-mail/SMS relay: notices are logged and kept for inspection.
#[derive(Default, Clone)]
pub(crate) struct InMemoryNotificationPublisher {
    notices: Arc<Mutex<Vec<StatusNotice>>>,
}

impl NotificationPublisher for InMemoryNotificationPublisher {
    fn publish(&self, notice: StatusNotice) -> Result<(), NotificationError> {
        info!(
            application_id = %notice.application_id,
            template = %notice.template,
            "status notification queued"
        );
        let mut guard = self.notices.lock().expect("notification mutex poisoned");
        guard.push(notice);
        Ok(())
    }
}

impl InMemoryNotificationPublisher {
    pub(crate) fn notices(&self) -> Vec<StatusNotice> {
        self.notices
            .lock()
            .expect("notification mutex poisoned")
            .clone()
    }
}
