use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemorySubmissionRegistry};
use crate::routes::with_points_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use points_engine::config::AppConfig;
use points_engine::engine::{
    MemoryPointsStore, PointsEngine, SettlementScheduler, SystemClock,
};
use points_engine::error::AppError;
use points_engine::telemetry;
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

    let store = Arc::new(MemoryPointsStore::new(config.engine.base_pool));
    let clock = Arc::new(SystemClock);
    let engine = Arc::new(PointsEngine::new(store, clock));
    let registry = Arc::new(InMemorySubmissionRegistry::default());

    let scheduler = SettlementScheduler::new(engine.clone()).start();

    let app = with_points_routes(engine, registry)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "points settlement service ready");

    let result = axum::serve(listener, app).await;
    scheduler.stop();
    result?;
    Ok(())
}
