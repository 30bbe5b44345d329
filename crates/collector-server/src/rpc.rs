//! Caller-facing RPC surface: one method, `POST /v1/collect`, with coded
//! errors in the response body.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};

use collector_core::{CancelReason, CancelSignal};
use collector_types::proto::Request;
use collector_types::{CollectorError, ErrorCode};

use crate::http::AppState;

/// Header carrying the caller's deadline in milliseconds.
const TIMEOUT_HEADER: &str = "x-collect-timeout-ms";

pub fn rpc_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/collect", post(handle_collect))
        .with_state(state)
}

fn coded_error(err: &CollectorError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(serde_json::json!({
            "code": err.code(),
            "message": err.to_string(),
        })),
    )
        .into_response()
}

/// Accepts a request, suspends until an operator answers, and returns the
/// response. Dropping the connection cancels the request; the broker's
/// cleanup runs either way.
async fn handle_collect(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.stats.record_request();

    let request: Request = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            state.stats.record_error(ErrorCode::InvalidArgument);
            return coded_error(&CollectorError::InvalidRequest(format!(
                "malformed request body: {e}"
            )));
        }
    };

    let cancel = CancelSignal::new();
    let deadline_timer = caller_timeout(&headers).map(|timeout| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            cancel.cancel(CancelReason::DeadlineExceeded);
        })
    });

    let result = state.broker.collect(request, cancel).await;
    if let Some(timer) = deadline_timer {
        timer.abort();
    }

    match result {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            state.stats.record_error(e.code());
            tracing::debug!(code = %e.code(), "collect failed");
            coded_error(&e)
        }
    }
}

fn caller_timeout(headers: &HeaderMap) -> Option<Duration> {
    let millis = headers
        .get(TIMEOUT_HEADER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()?;
    Some(Duration::from_millis(millis))
}
