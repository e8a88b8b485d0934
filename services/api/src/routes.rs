use crate::infra::{ApiEngine, AppState, InMemorySubmissionRegistry};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::NaiveDateTime;
use points_engine::engine::{points_router, ApprovedSubmission, StageId, SubmissionId, YearMonth};
use points_engine::error::AppError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Engine and registry shared by the submission event endpoints.
#[derive(Clone)]
pub(crate) struct EventContext {
    pub(crate) engine: Arc<ApiEngine>,
    pub(crate) registry: Arc<InMemorySubmissionRegistry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApprovedEventRequest {
    pub(crate) submission_id: String,
    pub(crate) nickname: String,
    pub(crate) stage: StageId,
    pub(crate) team_count: u32,
    pub(crate) submitted_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApprovedEventResponse {
    pub(crate) submission_id: SubmissionId,
    pub(crate) year_month: YearMonth,
    pub(crate) points: Decimal,
    pub(crate) is_halved: bool,
    pub(crate) credited: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReversedEventRequest {
    pub(crate) submission_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReversedEventResponse {
    pub(crate) reversed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) points: Option<Decimal>,
    pub(crate) pool_adjusted: bool,
}

pub(crate) fn with_points_routes(
    engine: Arc<ApiEngine>,
    registry: Arc<InMemorySubmissionRegistry>,
) -> axum::Router {
    let context = EventContext {
        engine: engine.clone(),
        registry,
    };

    points_router(engine)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/submissions/approved",
            axum::routing::post(submission_approved_endpoint),
        )
        .route(
            "/api/v1/submissions/reversed",
            axum::routing::post(submission_reversed_endpoint),
        )
        .layer(Extension(context))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn submission_approved_endpoint(
    Extension(context): Extension<EventContext>,
    Json(payload): Json<ApprovedEventRequest>,
) -> Result<(StatusCode, Json<ApprovedEventResponse>), AppError> {
    let submission_id = SubmissionId(payload.submission_id);
    let has_other_approved = context
        .registry
        .has_other_approved(payload.stage, &submission_id);

    let outcome = context.engine.record_approval(
        ApprovedSubmission {
            submission_id: submission_id.clone(),
            nickname: payload.nickname,
            stage: payload.stage,
            team_count: payload.team_count,
            submitted_at: payload.submitted_at,
        },
        has_other_approved,
    )?;
    context.registry.mark_approved(submission_id, payload.stage);

    Ok((
        StatusCode::CREATED,
        Json(ApprovedEventResponse {
            submission_id: outcome.entry.submission_id.clone(),
            year_month: outcome.entry.year_month,
            points: outcome.entry.points,
            is_halved: outcome.entry.is_halved,
            credited: outcome.credited,
        }),
    ))
}

pub(crate) async fn submission_reversed_endpoint(
    Extension(context): Extension<EventContext>,
    Json(payload): Json<ReversedEventRequest>,
) -> Result<Json<ReversedEventResponse>, AppError> {
    let submission_id = SubmissionId(payload.submission_id);
    let outcome = context.engine.record_reversal(&submission_id)?;
    context.registry.mark_reversed(&submission_id);

    Ok(Json(match outcome {
        Some(reversal) => ReversedEventResponse {
            reversed: true,
            points: Some(reversal.entry.points),
            pool_adjusted: reversal.debited,
        },
        None => ReversedEventResponse {
            reversed: false,
            points: None,
            pool_adjusted: false,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use points_engine::engine::{MemoryPointsStore, PointsEngine, SystemClock};
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_app() -> axum::Router {
        let store = Arc::new(MemoryPointsStore::default());
        let clock = Arc::new(SystemClock);
        let engine = Arc::new(PointsEngine::new(store, clock));
        let registry = Arc::new(InMemorySubmissionRegistry::default());
        with_points_routes(engine, registry)
    }

    fn post_json(uri: &str, payload: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn approved_payload(id: &str, nickname: &str, stage: &str) -> Value {
        json!({
            "submission_id": id,
            "nickname": nickname,
            "stage": stage,
            "team_count": 3,
            "submitted_at": "2026-07-02T09:00:00",
        })
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn approval_event_awards_points_and_registers_the_stage() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/submissions/approved",
                approved_payload("hw-1", "alice", "19-1"),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["points"], "1");
        assert_eq!(body["is_halved"], false);
        assert_eq!(body["credited"], true);
        assert_eq!(body["year_month"], "2026-07");

        // Second approval on the same stage is halved by the registry mirror.
        let response = app
            .oneshot(post_json(
                "/api/v1/submissions/approved",
                approved_payload("hw-2", "bob", "19-1"),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["points"], "0.5");
        assert_eq!(body["is_halved"], true);
    }

    #[tokio::test]
    async fn repeated_approval_events_conflict() {
        let app = test_app();
        let payload = approved_payload("hw-1", "alice", "19-1");

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/submissions/approved", payload.clone()))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(post_json("/api/v1/submissions/approved", payload))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn reversal_event_round_trips_and_tolerates_unknown_ids() {
        let app = test_app();

        app.clone()
            .oneshot(post_json(
                "/api/v1/submissions/approved",
                approved_payload("hw-1", "alice", "19-1"),
            ))
            .await
            .expect("response");

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/submissions/reversed",
                json!({ "submission_id": "hw-1" }),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["reversed"], true);
        assert_eq!(body["pool_adjusted"], true);

        let response = app
            .oneshot(post_json(
                "/api/v1/submissions/reversed",
                json!({ "submission_id": "hw-1" }),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["reversed"], false);
    }

    #[tokio::test]
    async fn admin_routes_are_mounted_alongside_event_intake() {
        let app = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/points/months")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
