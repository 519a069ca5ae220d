//! In-process stand-in for the Instana REST API.
//!
//! Every request is recorded. Responses are looked up by method and path;
//! unknown routes answer 404.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::task::JoinHandle;

/// A request captured by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method, upper case.
    pub method: String,
    /// Request path without query string.
    pub path: String,
    /// Decoded query parameters.
    pub query: BTreeMap<String, String>,
    /// Request headers, lower-case names.
    pub headers: BTreeMap<String, String>,
    /// Raw request body.
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Header value by lower-case name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Request body parsed as JSON (`Null` when empty or invalid).
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone)]
struct MockResponse {
    status: u16,
    body: serde_json::Value,
    delay: Option<Duration>,
}

#[derive(Clone, Default)]
struct MockState {
    routes: Arc<Mutex<HashMap<(String, String), MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Handle of a running mock server; the server stops when dropped.
pub struct MockInstanaServer {
    url: String,
    state: MockState,
    join: JoinHandle<()>,
}

impl MockInstanaServer {
    /// Bind an ephemeral local port and start serving.
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("mock server bind failed");
        let addr = listener.local_addr().expect("mock server address");
        let join = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            url: format!("http://{}", addr),
            state,
            join,
        }
    }

    /// Base URL, usable as the configured host.
    pub fn url(&self) -> String {
        self.url.clone()
    }

    /// Answer `method path` with `status` and a JSON body. A `Null` body is
    /// sent as an empty response.
    pub fn respond(&self, method: &str, path: &str, status: u16, body: serde_json::Value) {
        self.insert(method, path, MockResponse {
            status,
            body,
            delay: None,
        });
    }

    /// Like [`MockInstanaServer::respond`], answering after `delay`.
    pub fn respond_with_delay(
        &self,
        method: &str,
        path: &str,
        status: u16,
        body: serde_json::Value,
        delay: Duration,
    ) {
        self.insert(method, path, MockResponse {
            status,
            body,
            delay: Some(delay),
        });
    }

    /// All requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .map_or_else(|_| Vec::new(), |entries| entries.clone())
    }

    /// Requests received for `method path`.
    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    fn insert(&self, method: &str, path: &str, response: MockResponse) {
        if let Ok(mut routes) = self.state.routes.lock() {
            routes.insert((method.to_uppercase(), path.to_string()), response);
        }
    }
}

impl Drop for MockInstanaServer {
    fn drop(&mut self) {
        self.join.abort();
    }
}

async fn handle(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    Query(query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let recorded = RecordedRequest {
        method: method.as_str().to_string(),
        path: path.clone(),
        query,
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect(),
        body: body.to_vec(),
    };
    if let Ok(mut requests) = state.requests.lock() {
        requests.push(recorded);
    }

    let response = state
        .routes
        .lock()
        .ok()
        .and_then(|routes| routes.get(&(method.as_str().to_string(), path)).cloned());

    let Some(response) = response else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let Some(delay) = response.delay {
        tokio::time::sleep(delay).await;
    }

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if response.body.is_null() {
        status.into_response()
    } else {
        (
            status,
            [("content-type", "application/json")],
            response.body.to_string(),
        )
            .into_response()
    }
}
