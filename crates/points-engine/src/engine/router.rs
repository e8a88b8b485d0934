use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::clock::Clock;
use super::domain::{SettlementConfig, YearMonth};
use super::scheduler::CHECK_INTERVAL;
use super::service::{EngineError, PointsEngine};
use super::store::PointsStore;

/// Router builder exposing the admin and reporting operations of the engine.
/// Submission event intake lives with the service binary, next to the
/// registry mirror that answers the duplicate-stage query.
pub fn points_router<S, C>(engine: Arc<PointsEngine<S, C>>) -> Router
where
    S: PointsStore + 'static,
    C: Clock + 'static,
{
    Router::new()
        .route("/api/v1/points/pools/:month", get(pool_handler::<S, C>))
        .route(
            "/api/v1/points/pools/:month/settle",
            post(settle_handler::<S, C>),
        )
        .route(
            "/api/v1/points/pools/:month/cancel-settlement",
            post(cancel_settlement_handler::<S, C>),
        )
        .route("/api/v1/points/months", get(months_handler::<S, C>))
        .route(
            "/api/v1/points/leaderboard/:month",
            get(leaderboard_handler::<S, C>),
        )
        .route(
            "/api/v1/points/ranking/lifetime",
            get(lifetime_ranking_handler::<S, C>),
        )
        .route(
            "/api/v1/points/base-pool",
            get(base_pool_handler::<S, C>).put(update_base_pool_handler::<S, C>),
        )
        .route(
            "/api/v1/points/settlement-config",
            get(settlement_config_handler::<S, C>).put(update_settlement_config_handler::<S, C>),
        )
        .route(
            "/api/v1/points/settlement-status",
            get(settlement_status_handler::<S, C>),
        )
        .with_state(engine)
}

#[derive(Debug, Deserialize)]
pub(crate) struct BasePoolUpdate {
    pub(crate) amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SettlementConfigUpdate {
    pub(crate) enabled: bool,
    pub(crate) day_of_month: u8,
    pub(crate) hour: u8,
    pub(crate) minute: u8,
}

fn parse_month(raw: &str) -> Result<YearMonth, Response> {
    raw.parse::<YearMonth>().map_err(|error| {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": error }))).into_response()
    })
}

fn error_response(error: EngineError) -> Response {
    let status = match &error {
        EngineError::AlreadySettled(_)
        | EngineError::NotSettled(_)
        | EngineError::DuplicateAccrual(_) => StatusCode::CONFLICT,
        EngineError::ConfigInvalid(_) | EngineError::InvalidBasePool(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

pub(crate) async fn pool_handler<S, C>(
    State(engine): State<Arc<PointsEngine<S, C>>>,
    Path(month): Path<String>,
) -> Response
where
    S: PointsStore + 'static,
    C: Clock + 'static,
{
    let month = match parse_month(&month) {
        Ok(month) => month,
        Err(response) => return response,
    };
    match engine.pool(month) {
        Ok(pool) => (StatusCode::OK, Json(pool)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn settle_handler<S, C>(
    State(engine): State<Arc<PointsEngine<S, C>>>,
    Path(month): Path<String>,
) -> Response
where
    S: PointsStore + 'static,
    C: Clock + 'static,
{
    let month = match parse_month(&month) {
        Ok(month) => month,
        Err(response) => return response,
    };
    match engine.settle(month) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cancel_settlement_handler<S, C>(
    State(engine): State<Arc<PointsEngine<S, C>>>,
    Path(month): Path<String>,
) -> Response
where
    S: PointsStore + 'static,
    C: Clock + 'static,
{
    let month = match parse_month(&month) {
        Ok(month) => month,
        Err(response) => return response,
    };
    match engine.cancel_settlement(month) {
        Ok(pool) => (StatusCode::OK, Json(pool)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn months_handler<S, C>(
    State(engine): State<Arc<PointsEngine<S, C>>>,
) -> Response
where
    S: PointsStore + 'static,
    C: Clock + 'static,
{
    match engine.list_months() {
        Ok(months) => (StatusCode::OK, Json(months)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn leaderboard_handler<S, C>(
    State(engine): State<Arc<PointsEngine<S, C>>>,
    Path(month): Path<String>,
) -> Response
where
    S: PointsStore + 'static,
    C: Clock + 'static,
{
    let month = match parse_month(&month) {
        Ok(month) => month,
        Err(response) => return response,
    };
    match engine.leaderboard(month) {
        Ok(leaderboard) => (StatusCode::OK, Json(leaderboard)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn lifetime_ranking_handler<S, C>(
    State(engine): State<Arc<PointsEngine<S, C>>>,
) -> Response
where
    S: PointsStore + 'static,
    C: Clock + 'static,
{
    match engine.lifetime_ranking() {
        Ok(ranking) => (StatusCode::OK, Json(ranking)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn base_pool_handler<S, C>(
    State(engine): State<Arc<PointsEngine<S, C>>>,
) -> Response
where
    S: PointsStore + 'static,
    C: Clock + 'static,
{
    match engine.base_pool() {
        Ok(amount) => (StatusCode::OK, Json(json!({ "amount": amount }))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_base_pool_handler<S, C>(
    State(engine): State<Arc<PointsEngine<S, C>>>,
    Json(payload): Json<BasePoolUpdate>,
) -> Response
where
    S: PointsStore + 'static,
    C: Clock + 'static,
{
    match engine.set_base_pool(payload.amount) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "amount": payload.amount })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn settlement_config_handler<S, C>(
    State(engine): State<Arc<PointsEngine<S, C>>>,
) -> Response
where
    S: PointsStore + 'static,
    C: Clock + 'static,
{
    match engine.settlement_config() {
        Ok(config) => (StatusCode::OK, Json(config)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_settlement_config_handler<S, C>(
    State(engine): State<Arc<PointsEngine<S, C>>>,
    Json(payload): Json<SettlementConfigUpdate>,
) -> Response
where
    S: PointsStore + 'static,
    C: Clock + 'static,
{
    let config = SettlementConfig {
        enabled: payload.enabled,
        day_of_month: payload.day_of_month,
        hour: payload.hour,
        minute: payload.minute,
        last_settled_month: None,
    };
    match engine.update_settlement_config(config) {
        Ok(()) => match engine.settlement_config() {
            Ok(stored) => (StatusCode::OK, Json(stored)).into_response(),
            Err(error) => error_response(error),
        },
        Err(error) => error_response(error),
    }
}

pub(crate) async fn settlement_status_handler<S, C>(
    State(engine): State<Arc<PointsEngine<S, C>>>,
) -> Response
where
    S: PointsStore + 'static,
    C: Clock + 'static,
{
    match engine.settlement_config() {
        Ok(config) => (
            StatusCode::OK,
            Json(json!({
                "enabled": config.enabled,
                "day_of_month": config.day_of_month,
                "hour": config.hour,
                "minute": config.minute,
                "last_settled_month": config.last_settled_month,
                "check_interval_secs": CHECK_INTERVAL.as_secs(),
            })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}
