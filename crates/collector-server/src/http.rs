//! Operator-facing HTTP endpoints: long-poll take, submit, defer, and the
//! status/metrics/health read-outs. All bodies are JSON.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use collector_core::{
    Broker, Config, ErrorStats, GatewayError, Handout, InFlightRegistry, OperatorGateway,
    WorkQueue,
};

/// Submit bodies are one option index; anything near this bound is abuse.
const MAX_SUBMIT_BODY_BYTES: usize = 1 << 20;

#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<WorkQueue>,
    pub broker: Arc<Broker>,
    pub gateway: Arc<OperatorGateway>,
    pub stats: Arc<ErrorStats>,
    pub config: Config,
}

impl AppState {
    /// Wires up the engine components for the given configuration.
    pub fn new(config: Config) -> Self {
        let queue = Arc::new(WorkQueue::new());
        let registry = Arc::new(InFlightRegistry::new());
        let broker = Arc::new(Broker::new(
            queue.clone(),
            registry.clone(),
            config.max_pending_requests,
        ));
        let gateway = Arc::new(OperatorGateway::new(queue.clone(), registry));
        Self {
            queue,
            broker,
            gateway,
            stats: Arc::new(ErrorStats::new()),
            config,
        }
    }
}

pub fn operator_router(state: AppState) -> Router {
    Router::new()
        .route("/data.json", get(handle_data))
        .route("/submit/{uuid}", post(handle_submit))
        .route("/submit/", post(handle_missing_uuid))
        .route("/defer/{uuid}", post(handle_defer))
        .route("/defer/", post(handle_missing_uuid))
        .route("/queue/status", get(handle_queue_status))
        .route("/metrics", get(handle_metrics))
        .route("/health", get(handle_health))
        .with_state(state)
}

#[derive(Serialize)]
struct HttpError {
    code: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

fn json_error(status: StatusCode, message: &str, details: Option<String>) -> Response {
    let body = HttpError {
        code: status.as_u16(),
        message: message.to_string(),
        details,
    };
    (status, Json(body)).into_response()
}

fn handout_response(handout: Handout) -> Response {
    let proto = match serde_json::to_value(&handout.request) {
        Ok(value) => value,
        Err(e) => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to marshal request",
                Some(e.to_string()),
            )
        }
    };

    Json(serde_json::json!({
        "uuid": handout.id,
        "proto": proto,
        "queue": handout.queue,
    }))
    .into_response()
}

fn gateway_error_response(err: GatewayError) -> Response {
    match err {
        GatewayError::WaitTimeout => json_error(
            StatusCode::REQUEST_TIMEOUT,
            "no pending requests available",
            Some("wait and retry".into()),
        ),
        GatewayError::InvalidItem(details) => json_error(
            StatusCode::BAD_REQUEST,
            "invalid request data",
            Some(details),
        ),
        GatewayError::NotFound(id) => json_error(
            StatusCode::NOT_FOUND,
            "pending request not found",
            Some(format!("uuid: {id}")),
        ),
        GatewayError::MalformedReply(details) => json_error(
            StatusCode::BAD_REQUEST,
            "invalid response format",
            Some(details),
        ),
        GatewayError::Internal(details) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error",
            Some(details),
        ),
    }
}

/// Long-poll for the next item; 408 when the deadline passes first.
async fn handle_data(State(state): State<AppState>) -> Response {
    match state.gateway.take_next(state.config.http_timeout).await {
        Ok(handout) => handout_response(handout),
        Err(e) => gateway_error_response(e),
    }
}

async fn handle_submit(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    body: Body,
) -> Response {
    let read = axum::body::to_bytes(body, MAX_SUBMIT_BODY_BYTES);
    let bytes = match tokio::time::timeout(state.config.submit_timeout, read).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to read request body",
                Some(e.to_string()),
            )
        }
        Err(_) => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to read request body",
                Some("body read timed out".into()),
            )
        }
    };

    match state.gateway.submit(&uuid, &bytes) {
        Ok(()) => Json(serde_json::json!({"status": "ok"})).into_response(),
        Err(e) => gateway_error_response(e),
    }
}

/// Put a taken item back at the tail marked deferred, then immediately serve
/// the next item.
async fn handle_defer(State(state): State<AppState>, Path(uuid): Path<String>) -> Response {
    match state.gateway.defer(&uuid, state.config.http_timeout).await {
        Ok(handout) => handout_response(handout),
        Err(e) => gateway_error_response(e),
    }
}

async fn handle_missing_uuid() -> Response {
    json_error(StatusCode::BAD_REQUEST, "missing uuid parameter", None)
}

async fn handle_queue_status(State(state): State<AppState>) -> Response {
    Json(state.queue.status()).into_response()
}

async fn handle_metrics(State(state): State<AppState>) -> Response {
    let stats = state.stats.snapshot();
    Json(serde_json::json!({
        "queue": state.queue.status(),
        "errors": {
            "validation": stats.validation,
            "timeout": stats.timeout,
            "internal": stats.internal,
            "resource_exhausted": stats.resource_exhausted,
        },
        "total_requests": stats.total_requests,
    }))
    .into_response()
}

async fn handle_health(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "queue_total": state.queue.status().total,
    }))
    .into_response()
}
