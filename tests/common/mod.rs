#![allow(dead_code)]

use std::time::Duration;

use serde_json::{json, Value};
use tripo3d_client::{ClientConfig, RetryPolicy, TripoClient};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TASK_PATH: &str = "/v2/openapi/task";

/// A client pointed at the mock server, with short retry delays.
pub fn client_for(server: &MockServer) -> TripoClient {
    TripoClient::open(&config_for(server)).unwrap()
}

pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::with_api_key("test_api_key")
        .base_url(server.uri())
        .request_timeout(Duration::from_secs(5))
        .retry(RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
            multiplier: 2.0,
        })
}

/// The `data` payload of a get-task response.
pub fn task_json(task_id: &str, status: &str, progress: u8, output: Value) -> Value {
    json!({
        "task_id": task_id,
        "type": "text_to_model",
        "status": status,
        "progress": progress,
        "create_time": 1752091365,
        "output": output
    })
}

pub fn envelope(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "data": data }))
}

/// Expects exactly one task creation request with `body` and answers with
/// `task_id`.
pub async fn expect_task_creation(server: &MockServer, body: Value, task_id: &str) {
    Mock::given(method("POST"))
        .and(path(TASK_PATH))
        .and(body_json(body))
        .respond_with(envelope(json!({ "task_id": task_id })))
        .expect(1)
        .mount(server)
        .await;
}

/// Fails the test on drop if any task creation request arrives.
pub async fn forbid_task_creation(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TASK_PATH))
        .respond_with(envelope(json!({ "task_id": "should_not_exist" })))
        .expect(0)
        .mount(server)
        .await;
}
