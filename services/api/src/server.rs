use crate::cli::ServeArgs;
use crate::infra::{local_maintenance, seed_vendors, AppState};
use crate::routes::with_maintenance_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tenant_maintenance::config::AppConfig;
use tenant_maintenance::error::AppError;
use tenant_maintenance::telemetry;
use tenant_maintenance::workflows::maintenance::VendorRosterImporter;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(config.environment, &config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let vendors = match args.vendors_csv.take() {
        Some(path) => VendorRosterImporter::from_path(path)?,
        None => seed_vendors(),
    };
    info!(vendors = vendors.len(), "vendor roster loaded");
    let local = local_maintenance(&config.maintenance, vendors);

    let app = with_maintenance_routes(local.service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "maintenance coordinator ready");

    axum::serve(listener, app).await?;
    Ok(())
}
