//! HTTP routes of the gateway.
//!
//! - `POST /notify/{backends}` dispatches a native payload.
//! - `POST /prometheus_notify/{backends}` dispatches a Prometheus alert batch.
//! - `GET /healthz` reports liveness.
//! - `GET /metrics` renders Prometheus metrics, when enabled.
//!
//! `{backends}` is a comma-separated list of backend names. Request bodies
//! are parsed as JSON regardless of their content type.

use crate::core::DispatchResult;
use crate::dispatch::{parse_backends, DispatchError, Dispatcher};
use crate::validation::is_empty_payload;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state of all handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub metrics: Option<PrometheusHandle>,
}

/// A request that was rejected before or while resolving its drivers.
#[derive(Debug)]
pub enum ApiError {
    MissedPayload,
    Dispatch(DispatchError),
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError::Dispatch(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissedPayload => StatusCode::BAD_REQUEST,
            ApiError::Dispatch(DispatchError::Validation(_))
            | ApiError::Dispatch(DispatchError::UnknownBackends(_)) => StatusCode::BAD_REQUEST,
            ApiError::Dispatch(DispatchError::DriverUnavailable { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::MissedPayload => "Missed Payload".to_string(),
            ApiError::Dispatch(err) => err.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Builds the router for the given state.
pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/notify/{backends}", post(send_notification))
        .route("/prometheus_notify/{backends}", post(send_prometheus_notification))
        .route("/healthz", get(healthz));

    if let Some(handle) = state.metrics.clone() {
        router = router.route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        );
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Parses a request body, treating unparseable and empty bodies as absent.
fn parse_body(body: &Bytes) -> Option<Value> {
    serde_json::from_slice::<Value>(body)
        .ok()
        .filter(|value| !is_empty_payload(value))
}

fn count_request(endpoint: &'static str, status: StatusCode) {
    metrics::counter!(
        "dispatch_requests_total",
        "endpoint" => endpoint,
        "status" => status.as_u16().to_string()
    )
    .increment(1);
}

async fn send_notification(
    State(state): State<AppState>,
    Path(backends): Path<String>,
    body: Bytes,
) -> Result<Json<DispatchResult>, ApiError> {
    let result = async {
        let payload = parse_body(&body).ok_or(ApiError::MissedPayload)?;
        let requested = parse_backends(&backends);
        Ok::<_, ApiError>(state.dispatcher.dispatch(&payload, &requested).await?)
    }
    .await;

    match &result {
        Ok(_) => count_request("notify", StatusCode::OK),
        Err(err) => count_request("notify", err.status()),
    }
    result.map(Json)
}

async fn send_prometheus_notification(
    State(state): State<AppState>,
    Path(backends): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let report = async {
        let payload = parse_body(&body).ok_or(ApiError::MissedPayload)?;
        let requested = parse_backends(&backends);
        Ok::<_, ApiError>(state.dispatcher.dispatch_prometheus(&payload, &requested).await?)
    }
    .await;

    let report = match report {
        Ok(report) => report,
        Err(err) => {
            count_request("prometheus_notify", err.status());
            return Err(err);
        }
    };

    // One failed invocation anywhere fails the whole batch.
    let status = if report.is_success() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    count_request("prometheus_notify", status);

    let response = if report.is_success() {
        (status, Json(json!({}))).into_response()
    } else {
        (status, Json(json!({ "error": report.errors }))).into_response()
    };
    Ok(response)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
