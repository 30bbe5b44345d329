//! End-to-end tests driving both transports: callers suspend on the RPC
//! surface while an operator works the HTTP surface.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use collector_core::{CancelReason, CancelSignal, Config};
use collector_server::{operator_router, rpc_router, AppState};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_config() -> Config {
    Config {
        http_timeout: Duration::from_secs(2),
        ..Config::default()
    }
}

fn routers(config: Config) -> (AppState, Router, Router) {
    let state = AppState::new(config);
    let operator = operator_router(state.clone());
    let rpc = rpc_router(state.clone());
    (state, operator, rpc)
}

fn grid_request_json() -> Value {
    json!({
        "inputs": [{
            "visualization": {"grid": {"rows": 2, "cols": 2}},
            "data": {"ints": {"values": [0, 1, 1, 0]}},
        }],
        "output": {
            "optionList": {"options": [
                {"label": "A", "hotkey": "a"},
                {"label": "B", "hotkey": "b"},
            ]},
        },
    })
}

fn submit_body(index: i32) -> Value {
    json!({"output": {"optionList": {"index": index}}})
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(router: &Router, path: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

async fn post(router: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

/// Spawns a caller that posts a collect request and returns the parsed
/// response once the operator answers.
fn spawn_caller(rpc: &Router) -> tokio::task::JoinHandle<(StatusCode, Value)> {
    let rpc = rpc.clone();
    tokio::spawn(async move { post(&rpc, "/v1/collect", grid_request_json()).await })
}

async fn wait_for_queue_total(operator: &Router, total: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let (status, body) = get(operator, "/queue/status").await;
        assert_eq!(status, StatusCode::OK);
        if body["total"] == json!(total) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "queue never reached total={total}, last status: {body}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ---------------------------------------------------------------------------
// Scenario 1: happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn happy_path_collect_take_submit() {
    let (_state, operator, rpc) = routers(test_config());

    let caller = spawn_caller(&rpc);
    wait_for_queue_total(&operator, 1).await;

    let (status, data) = get(&operator, "/data.json").await;
    assert_eq!(status, StatusCode::OK);
    let uuid = data["uuid"].as_str().expect("handout has a uuid").to_string();
    assert_eq!(
        data["proto"]["inputs"][0]["visualization"]["grid"]["rows"],
        json!(2)
    );
    assert_eq!(
        data["proto"]["inputs"][0]["data"]["ints"]["values"],
        json!([0, 1, 1, 0])
    );
    assert_eq!(
        data["proto"]["output"]["optionList"]["options"][1]["hotkey"],
        json!("b")
    );
    // The taken item has left the queue.
    assert_eq!(data["queue"], json!({"total": 0, "active": 0, "deferred": 0}));

    let (status, body) = post(&operator, &format!("/submit/{uuid}"), submit_body(1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    let (status, response) = caller.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, json!({"output": {"optionList": {"index": 1}}}));

    let (_, queue) = get(&operator, "/queue/status").await;
    assert_eq!(queue, json!({"total": 0, "active": 0, "deferred": 0}));
}

// ---------------------------------------------------------------------------
// Scenario 2: defer then take
// ---------------------------------------------------------------------------

#[tokio::test]
async fn defer_rotates_and_every_caller_is_answered() {
    let (_state, operator, rpc) = routers(test_config());

    // Admit three callers in a known order.
    let mut callers = Vec::new();
    for n in 1..=3u64 {
        callers.push(spawn_caller(&rpc));
        wait_for_queue_total(&operator, n).await;
    }

    let (status, data) = get(&operator, "/data.json").await;
    assert_eq!(status, StatusCode::OK);
    let x = data["uuid"].as_str().unwrap().to_string();

    // Defer x; the response hands out y and shows [z, x(deferred)] queued.
    let (status, data) = post(&operator, &format!("/defer/{x}"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let y = data["uuid"].as_str().unwrap().to_string();
    assert_ne!(y, x);
    assert_eq!(data["queue"], json!({"total": 2, "active": 1, "deferred": 1}));

    let (_, data) = get(&operator, "/data.json").await;
    let z = data["uuid"].as_str().unwrap().to_string();
    assert_ne!(z, x);
    assert_ne!(z, y);

    // With nothing active left, the deferred item is served again.
    let (_, data) = get(&operator, "/data.json").await;
    assert_eq!(data["uuid"].as_str().unwrap(), x);

    for (uuid, index) in [(&x, 0), (&y, 1), (&z, 2)] {
        let (status, _) = post(&operator, &format!("/submit/{uuid}"), submit_body(index)).await;
        assert_eq!(status, StatusCode::OK);
    }

    // Callers were admitted in order x, y, z.
    for (caller, index) in callers.into_iter().zip([0, 1, 2]) {
        let (status, response) = caller.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["output"]["optionList"]["index"], json!(index));
    }
}

// ---------------------------------------------------------------------------
// Scenario 3: cancellation while queued
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelled_caller_leaves_no_trace_in_queue() {
    let (_state, operator, rpc) = routers(test_config());

    let caller = spawn_caller(&rpc);
    wait_for_queue_total(&operator, 1).await;

    // Dropping the in-flight RPC is how a caller cancels over this transport.
    caller.abort();
    let _ = caller.await;

    let (_, queue) = get(&operator, "/queue/status").await;
    assert_eq!(queue, json!({"total": 0, "active": 0, "deferred": 0}));
}

// ---------------------------------------------------------------------------
// Scenario 4: cancellation while in flight
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_while_in_flight_makes_submit_not_found() {
    let (state, operator, _rpc) = routers(test_config());

    let cancel = CancelSignal::new();
    let caller = {
        let broker = state.broker.clone();
        let cancel = cancel.clone();
        let request: collector_types::proto::Request =
            serde_json::from_value(grid_request_json()).unwrap();
        tokio::spawn(async move { broker.collect(request, cancel).await })
    };
    wait_for_queue_total(&operator, 1).await;

    let (status, data) = get(&operator, "/data.json").await;
    assert_eq!(status, StatusCode::OK);
    let uuid = data["uuid"].as_str().unwrap().to_string();

    cancel.cancel(CancelReason::Cancelled);
    let err = caller.await.unwrap().unwrap_err();
    assert_eq!(err.code(), collector_types::ErrorCode::Cancelled);

    let (status, body) = post(&operator, &format!("/submit/{uuid}"), submit_body(0)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!(404));
    assert_eq!(body["message"], json!("pending request not found"));
}

// ---------------------------------------------------------------------------
// Scenario 5: overload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admission_rejects_beyond_pending_limit() {
    let config = Config {
        max_pending_requests: 2,
        ..test_config()
    };
    let (_state, operator, rpc) = routers(config);

    let mut callers = Vec::new();
    for n in 1..=2u64 {
        callers.push(spawn_caller(&rpc));
        wait_for_queue_total(&operator, n).await;
    }

    let (status, body) = post(&rpc, "/v1/collect", grid_request_json()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], json!("resource_exhausted"));
    assert_eq!(body["message"], json!("pending requests limit exceeded"));

    // The first two admissions are unaffected.
    let (_, queue) = get(&operator, "/queue/status").await;
    assert_eq!(queue["total"], json!(2));

    for caller in &callers {
        caller.abort();
    }
}

// ---------------------------------------------------------------------------
// Scenario 6: long-poll timeout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_queue_long_poll_times_out() {
    let config = Config {
        http_timeout: Duration::from_millis(100),
        ..Config::default()
    };
    let (_state, operator, _rpc) = routers(config);

    let start = std::time::Instant::now();
    let (status, body) = get(&operator, "/data.json").await;
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body["code"], json!(408));
    assert_eq!(body["message"], json!("no pending requests available"));
    assert_eq!(body["details"], json!("wait and retry"));
}

// ---------------------------------------------------------------------------
// Error surfaces
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_collect_is_coded_and_counted() {
    let (_state, operator, rpc) = routers(test_config());

    let bad = json!({"inputs": [], "output": null});
    let (status, body) = post(&rpc, "/v1/collect", bad).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("invalid_argument"));
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("at least one input"));

    let (_, metrics) = get(&operator, "/metrics").await;
    assert_eq!(metrics["errors"]["validation"], json!(1));
    assert_eq!(metrics["total_requests"], json!(1));
}

#[tokio::test]
async fn unparseable_collect_body_is_invalid_argument() {
    let (_state, _operator, rpc) = routers(test_config());

    let response = rpc
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/collect")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], json!("invalid_argument"));
}

#[tokio::test]
async fn malformed_submit_is_bad_request() {
    let (_state, operator, rpc) = routers(test_config());

    let caller = spawn_caller(&rpc);
    wait_for_queue_total(&operator, 1).await;
    let (_, data) = get(&operator, "/data.json").await;
    let uuid = data["uuid"].as_str().unwrap().to_string();

    let response = operator
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/submit/{uuid}"))
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], json!("invalid response format"));

    // Terminal: the item is gone, a retry finds nothing.
    let (status, _) = post(&operator, &format!("/submit/{uuid}"), submit_body(0)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The suspended caller observes the closed reply channel.
    let (status, body) = caller.await.unwrap();
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], json!("internal"));
}

#[tokio::test]
async fn missing_uuid_is_bad_request() {
    let (_state, operator, _rpc) = routers(test_config());

    let (status, body) = post(&operator, "/submit/", submit_body(0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("missing uuid parameter"));

    let (status, _) = post(&operator, "/defer/", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn defer_unknown_uuid_is_not_found() {
    let (_state, operator, _rpc) = routers(test_config());
    let (status, body) = post(&operator, "/defer/no-such-item", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!(404));
}

#[tokio::test]
async fn health_reports_queue_depth() {
    let (_state, operator, rpc) = routers(test_config());

    let (status, body) = get(&operator, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["queue_total"], json!(0));
    assert!(body["timestamp"].is_string());

    let caller = spawn_caller(&rpc);
    wait_for_queue_total(&operator, 1).await;
    let (_, body) = get(&operator, "/health").await;
    assert_eq!(body["queue_total"], json!(1));
    caller.abort();
}

#[tokio::test]
async fn rpc_deadline_header_maps_to_deadline_exceeded() {
    let (_state, _operator, rpc) = routers(test_config());

    let response = rpc
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/collect")
                .header("x-collect-timeout-ms", "50")
                .body(Body::from(grid_request_json().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    let body = body_json(response).await;
    assert_eq!(body["code"], json!("deadline_exceeded"));
    assert_eq!(body["message"], json!("collect timed out"));
}
