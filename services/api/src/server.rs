use crate::cli::ServeArgs;
use crate::infra::{
    load_catalog, AppState, InMemoryApplicationRepository, InMemoryNotificationPublisher,
};
use crate::routes::with_application_routes;
use accreditation::config::AppConfig;
use accreditation::error::AppError;
use accreditation::telemetry;
use accreditation::workflows::accreditation::AccreditationService;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (catalog, catalog_source) = load_catalog(config.accreditation.workflow_csv.as_deref())?;
    info!(
        source = ?catalog_source,
        entry_steps = catalog.entry().steps().len(),
        exit_steps = catalog.exit().steps().len(),
        "workflow catalog loaded"
    );

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        catalog: Arc::new(catalog.clone()),
        catalog_source,
    };

    let repository = Arc::new(InMemoryApplicationRepository::default());
    let notifications = Arc::new(InMemoryNotificationPublisher::default());
    let service = Arc::new(
        AccreditationService::new(repository, notifications, catalog)
            .with_page_limits(config.accreditation.page_limits),
    );

    let app = with_application_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "accreditation service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
