use crate::cli::ServeArgs;
use crate::infra::{demo_backend, served_rest_backend, AppState, BackendChoice};
use crate::routes::with_screening_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Local;
use posyandu_kpsp::config::AppConfig;
use posyandu_kpsp::error::AppError;
use posyandu_kpsp::telemetry;
use posyandu_kpsp::workflows::screening::{SessionLimits, SessionRegistry};
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

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let limits = SessionLimits {
        idle_timeout: config.sessions.idle_timeout,
        capacity: config.sessions.capacity,
    };
    let screening_routes = match args.backend {
        BackendChoice::Rest => {
            info!(base_url = %config.backend.base_url, "screening against posyandu backend");
            let backend = served_rest_backend(&config.backend)?;
            with_screening_routes(Arc::new(SessionRegistry::with_limits(Arc::new(backend), limits)))
        }
        BackendChoice::Demo => {
            info!("screening against built-in demo data");
            let backend = demo_backend(Local::now().date_naive());
            with_screening_routes(Arc::new(SessionRegistry::with_limits(Arc::new(backend), limits)))
        }
    };

    let app = screening_routes
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "kpsp screening service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
