//! The throttled REST client.
//!
//! Writes (POST, PUT, DELETE) are pushed onto a bounded FIFO and emitted by a
//! single dispatcher task at most `rate` times per second. Each write carries
//! its own reply channel and cancellation token. A caller whose deadline
//! passes gets [`ProviderError::Timeout`]; the HTTP request it started is not
//! aborted, and the dispatcher discards its reply once it completes.
//!
//! Reads bypass the queue entirely.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ClientConfig;
use crate::error::ProviderError;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Query parameters of a request, sent in key order.
pub type QueryParams = BTreeMap<String, String>;

/// A write waiting for its turn in the dispatcher.
struct WriteRequest {
    method: Method,
    url: String,
    query: Option<QueryParams>,
    body: Option<Vec<u8>>,
    reply: oneshot::Sender<Result<Vec<u8>, ProviderError>>,
    cancel: CancellationToken,
}

struct Inner {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    queue: mpsc::Sender<WriteRequest>,
    shutdown: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Client for the Instana REST API.
///
/// Cloning is cheap; all clones share the transport and the write queue.
/// The dispatcher stops when [`RestClient::shutdown`] is called or the last
/// clone is dropped.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.inner.base_url)
            .field("request_timeout", &self.inner.request_timeout)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Build the transport and start the write dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ClientConfig) -> Result<Self, ProviderError> {
        let http = build_http_client(&config)?;
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let shutdown = CancellationToken::new();

        let dispatcher = tokio::spawn(dispatch(
            http.clone(),
            rx,
            config.write_interval(),
            shutdown.clone(),
        ));

        debug!(
            base_url = %config.base_url(),
            rate = config.rate,
            queue_capacity = config.queue_capacity,
            "REST client started"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: config.base_url(),
                request_timeout: config.request_timeout,
                queue: tx,
                shutdown,
                dispatcher: Mutex::new(Some(dispatcher)),
            }),
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Stop the dispatcher. Queued writes fail with a transport error and
    /// later writes are rejected; reads keep working.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let handle = self
            .inner
            .dispatcher
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// GET the resource path.
    pub async fn get(&self, path: &str) -> Result<Vec<u8>, ProviderError> {
        let url = self.url(path);
        execute(&self.inner.http, Method::GET, &url, None, None).await
    }

    /// GET a single entity at `path/id`. HTTP 404 yields [`ProviderError::NotFound`].
    pub async fn get_one(&self, path: &str, id: &str) -> Result<Vec<u8>, ProviderError> {
        let url = self.resource_url(path, id)?;
        execute(&self.inner.http, Method::GET, &url, None, None).await
    }

    /// GET the resource path with query parameters.
    pub async fn get_by_query(
        &self,
        path: &str,
        query: &QueryParams,
    ) -> Result<Vec<u8>, ProviderError> {
        let url = self.url(path);
        execute(&self.inner.http, Method::GET, &url, Some(query), None).await
    }

    // =========================================================================
    // Throttled writes
    // =========================================================================

    /// POST a new entity to the resource path.
    pub async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<Vec<u8>, ProviderError> {
        let url = self.url(path);
        self.enqueue(Method::POST, url, None, Some(serde_json::to_vec(body)?))
            .await
    }

    /// POST an entity to `path/{body.id}`.
    pub async fn post_with_id(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<Vec<u8>, ProviderError> {
        self.post_at(path, body_id(body)?, body).await
    }

    /// PUT an entity to `path/{body.id}`.
    pub async fn put(&self, path: &str, body: &serde_json::Value) -> Result<Vec<u8>, ProviderError> {
        self.put_at(path, body_id(body)?, body).await
    }

    /// PUT an entity to `path/id`, for entities addressed by another field.
    pub async fn put_at(
        &self,
        path: &str,
        id: &str,
        body: &serde_json::Value,
    ) -> Result<Vec<u8>, ProviderError> {
        let url = self.resource_url(path, id)?;
        self.enqueue(Method::PUT, url, None, Some(serde_json::to_vec(body)?))
            .await
    }

    /// POST an entity to `path/id`.
    pub async fn post_at(
        &self,
        path: &str,
        id: &str,
        body: &serde_json::Value,
    ) -> Result<Vec<u8>, ProviderError> {
        let url = self.resource_url(path, id)?;
        self.enqueue(Method::POST, url, None, Some(serde_json::to_vec(body)?))
            .await
    }

    /// DELETE the entity at `path/id`. HTTP 404 is surfaced as
    /// [`ProviderError::NotFound`].
    pub async fn delete(&self, path: &str, id: &str) -> Result<(), ProviderError> {
        let url = self.resource_url(path, id)?;
        self.enqueue(Method::DELETE, url, None, None).await?;
        Ok(())
    }

    /// POST to the resource path with all inputs as query parameters.
    pub async fn post_by_query(
        &self,
        path: &str,
        query: &QueryParams,
    ) -> Result<Vec<u8>, ProviderError> {
        let url = self.url(path);
        self.enqueue(Method::POST, url, Some(query.clone()), None)
            .await
    }

    /// PUT to `path/id` with all inputs as query parameters.
    pub async fn put_by_query(
        &self,
        path: &str,
        id: &str,
        query: &QueryParams,
    ) -> Result<Vec<u8>, ProviderError> {
        let url = self.resource_url(path, id)?;
        self.enqueue(Method::PUT, url, Some(query.clone()), None)
            .await
    }

    async fn enqueue(
        &self,
        method: Method,
        url: String,
        query: Option<QueryParams>,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, ProviderError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        // Dropping the waiter (timeout or caller cancellation) flags the request.
        let _cancel_on_drop = cancel.clone().drop_guard();

        let request = WriteRequest {
            method: method.clone(),
            url: url.clone(),
            query,
            body,
            reply: reply_tx,
            cancel,
        };

        let wait = async {
            self.inner
                .queue
                .send(request)
                .await
                .map_err(|_| client_shut_down())?;
            reply_rx.await.map_err(|_| client_shut_down())?
        };

        match tokio::time::timeout(self.inner.request_timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    method = %method,
                    url = %url,
                    timeout_ms = self.inner.request_timeout.as_millis() as u64,
                    "Write request timed out"
                );
                Err(ProviderError::Timeout(format!(
                    "{} {} did not complete within {:?}",
                    method, url, self.inner.request_timeout
                )))
            },
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    fn resource_url(&self, path: &str, id: &str) -> Result<String, ProviderError> {
        if id.trim().is_empty() {
            return Err(ProviderError::InvalidConfig(format!(
                "an identifier is required to address {}",
                path
            )));
        }
        if path.ends_with('/') {
            Ok(format!("{}{}{}", self.inner.base_url, path, id))
        } else {
            Ok(format!("{}{}/{}", self.inner.base_url, path, id))
        }
    }
}

fn client_shut_down() -> ProviderError {
    ProviderError::Transport("client shut down".to_string())
}

fn body_id(body: &serde_json::Value) -> Result<&str, ProviderError> {
    body.get("id")
        .and_then(serde_json::Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            ProviderError::InvalidConfig("request body does not carry an id".to_string())
        })
}

fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client, ProviderError> {
    let mut headers = HeaderMap::new();
    let mut auth = HeaderValue::from_str(&format!("apiToken {}", config.token))
        .map_err(|_| ProviderError::Configuration("api_token contains invalid characters".to_string()))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    let user_agent = HeaderValue::from_str(&config.user_agent)
        .map_err(|_| ProviderError::Configuration("invalid user agent".to_string()))?;
    headers.insert(USER_AGENT, user_agent);

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .danger_accept_invalid_certs(config.tls_insecure_skip_verify)
        .build()?;
    Ok(client)
}

/// Drain the write queue, emitting at most one request per `interval`.
async fn dispatch(
    http: reqwest::Client,
    rx: mpsc::Receiver<WriteRequest>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let requests = ReceiverStream::new(rx).throttle(interval);
    tokio::pin!(requests);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            next = requests.next() => match next {
                Some(request) => {
                    tokio::spawn(execute_write(http.clone(), request));
                },
                None => break,
            },
        }
    }
    // Queued requests drop here; their waiters observe a closed reply channel.
    debug!("Write dispatcher stopped");
}

async fn execute_write(http: reqwest::Client, request: WriteRequest) {
    let WriteRequest {
        method,
        url,
        query,
        body,
        reply,
        cancel,
    } = request;

    let result = execute(&http, method.clone(), &url, query.as_ref(), body).await;

    if cancel.is_cancelled() {
        warn!(method = %method, url = %url, "Discarding reply of abandoned write request");
        return;
    }
    // The waiter may still go away between the check and the send.
    let _ = reply.send(result);
}

async fn execute(
    http: &reqwest::Client,
    method: Method,
    url: &str,
    query: Option<&QueryParams>,
    body: Option<Vec<u8>>,
) -> Result<Vec<u8>, ProviderError> {
    debug!(method = %method, url = %url, "Calling Instana API");

    let mut builder = http.request(method.clone(), url);
    if let Some(query) = query {
        builder = builder.query(query);
    }
    if let Some(body) = body {
        builder = builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE).body(body);
    }

    let response = builder.send().await.map_err(|e| {
        ProviderError::Transport(format!(
            "failed to send HTTP {} request to {}: {}",
            method, url, e
        ))
    })?;

    let status = response.status();
    debug!(method = %method, url = %url, status = status.as_u16(), "Instana API responded");

    if status == StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound(format!(
            "{} {} returned 404",
            method, url
        )));
    }

    let headers = format_headers(response.headers());
    let bytes = response.bytes().await.map_err(|e| {
        ProviderError::Transport(format!(
            "failed to read response of HTTP {} request to {}: {}",
            method, url, e
        ))
    })?;

    if !status.is_success() {
        return Err(ProviderError::Transport(format!(
            "HTTP {} request to {} failed; status code = {}; headers = {}; body: {}",
            method,
            url,
            status.as_u16(),
            headers,
            String::from_utf8_lossy(&bytes)
        )));
    }

    Ok(bytes.to_vec())
}

/// Render response headers for error messages, redacting credentials.
fn format_headers(headers: &HeaderMap) -> String {
    let mut rendered: Vec<String> = headers
        .iter()
        .map(|(name, value)| {
            let value = if name == AUTHORIZATION || value.is_sensitive() {
                "<redacted>".to_string()
            } else {
                value.to_str().unwrap_or("<binary>").to_string()
            };
            format!("{}: {}", name, value)
        })
        .collect();
    rendered.sort();
    format!("[{}]", rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockInstanaServer;
    use serde_json::json;
    use std::time::Instant;

    fn client_for(server: &MockInstanaServer) -> RestClient {
        RestClient::new(
            ClientConfig::new("test-token", server.url()).with_user_agent("instana-provider/test"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_sends_standard_headers() {
        let server = MockInstanaServer::start().await;
        server.respond("GET", "/api/settings/users", 200, json!([]));
        let client = client_for(&server);

        let body = client.get("/api/settings/users").await.unwrap();
        assert_eq!(body, b"[]");

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.header("authorization"), Some("apiToken test-token"));
        assert_eq!(request.header("accept"), Some("application/json"));
        assert_eq!(request.header("user-agent"), Some("instana-provider/test"));
        assert_eq!(request.header("content-type"), None);
    }

    #[tokio::test]
    async fn test_get_one_not_found() {
        let server = MockInstanaServer::start().await;
        server.respond("GET", "/api/settings/slo/missing", 404, json!({}));
        let client = client_for(&server);

        let err = client.get_one("/api/settings/slo", "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_one_requires_id() {
        let server = MockInstanaServer::start().await;
        let client = client_for(&server);

        let err = client.get_one("/api/settings/slo", "").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidConfig(_)));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_get_by_query_sends_parameters() {
        let server = MockInstanaServer::start().await;
        server.respond("GET", "/api/host-agent", 200, json!({"items": []}));
        let client = client_for(&server);

        let mut query = QueryParams::new();
        query.insert("query".to_string(), "entity.zone:eu".to_string());
        client.get_by_query("/api/host-agent", &query).await.unwrap();

        let requests = server.requests();
        assert_eq!(requests[0].query.get("query").map(String::as_str), Some("entity.zone:eu"));
    }

    #[tokio::test]
    async fn test_error_status_includes_details_without_token() {
        let server = MockInstanaServer::start().await;
        server.respond(
            "POST",
            "/api/settings/slo",
            400,
            json!({"errors": ["name must not be empty"]}),
        );
        let client = client_for(&server);

        let err = client
            .post("/api/settings/slo", &json!({"name": ""}))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, ProviderError::Transport(_)));
        assert!(message.contains("POST"));
        assert!(message.contains("/api/settings/slo"));
        assert!(message.contains("400"));
        assert!(message.contains("name must not be empty"));
        assert!(!message.contains("test-token"));
    }

    #[tokio::test]
    async fn test_writes_send_json_content_type() {
        let server = MockInstanaServer::start().await;
        server.respond("POST", "/api/settings/slo", 200, json!({"id": "slo-1"}));
        let client = client_for(&server);

        let response = client
            .post("/api/settings/slo", &json!({"name": "latency"}))
            .await
            .unwrap();
        let response: serde_json::Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(response["id"], "slo-1");

        let requests = server.requests();
        assert_eq!(requests[0].header("content-type"), Some(JSON_CONTENT_TYPE));
        assert_eq!(requests[0].json(), json!({"name": "latency"}));
    }

    #[tokio::test]
    async fn test_put_and_post_with_id_use_body_id() {
        let server = MockInstanaServer::start().await;
        server.respond("PUT", "/api/settings/slo/slo-1", 200, json!({"id": "slo-1"}));
        server.respond("POST", "/api/settings/slo/slo-2", 200, json!({"id": "slo-2"}));
        let client = client_for(&server);

        client
            .put("/api/settings/slo", &json!({"id": "slo-1"}))
            .await
            .unwrap();
        client
            .post_with_id("/api/settings/slo", &json!({"id": "slo-2"}))
            .await
            .unwrap();

        let err = client
            .put("/api/settings/slo", &json!({"name": "no id"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidConfig(_)));

        let paths: Vec<_> = server.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/api/settings/slo/slo-1", "/api/settings/slo/slo-2"]);
    }

    #[tokio::test]
    async fn test_delete_surfaces_not_found() {
        let server = MockInstanaServer::start().await;
        server.respond("DELETE", "/api/settings/rbac/teams/t1", 204, serde_json::Value::Null);
        server.respond("DELETE", "/api/settings/rbac/teams/t2", 404, serde_json::Value::Null);
        let client = client_for(&server);

        client.delete("/api/settings/rbac/teams", "t1").await.unwrap();
        let err = client
            .delete("/api/settings/rbac/teams", "t2")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_by_query_writes() {
        let server = MockInstanaServer::start().await;
        server.respond("POST", "/api/events/settings/mute", 200, json!({}));
        server.respond("PUT", "/api/events/settings/mute/m1", 200, json!({}));
        let client = client_for(&server);

        let mut query = QueryParams::new();
        query.insert("name".to_string(), "night".to_string());
        client
            .post_by_query("/api/events/settings/mute", &query)
            .await
            .unwrap();
        client
            .put_by_query("/api/events/settings/mute", "m1", &query)
            .await
            .unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.body.is_empty()));
        assert!(requests
            .iter()
            .all(|r| r.query.get("name").map(String::as_str) == Some("night")));
    }

    #[tokio::test]
    async fn test_writes_are_throttled_in_fifo_order() {
        let server = MockInstanaServer::start().await;
        server.respond("POST", "/api/automation/actions", 200, json!({"id": "ok"}));
        let client = client_for(&server);

        let started = Instant::now();
        let mut handles = Vec::new();
        for i in 0..25 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                client
                    .post("/api/automation/actions", &json!({"seq": i}))
                    .await
            }));
            // Fix the enqueue order.
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(started.elapsed() >= Duration::from_millis(4800));
        let order: Vec<i64> = server
            .requests()
            .iter()
            .map(|r| r.json()["seq"].as_i64().unwrap())
            .collect();
        assert_eq!(order, (0..25).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_reads_bypass_write_queue() {
        let server = MockInstanaServer::start().await;
        server.respond_with_delay(
            "POST",
            "/api/automation/actions",
            200,
            json!({}),
            Duration::from_millis(500),
        );
        server.respond("GET", "/api/automation/actions", 200, json!([]));
        let client = RestClient::new(
            ClientConfig::new("t", server.url()).with_rate(1),
        )
        .unwrap();

        // Fill the throttle window with writes.
        let mut writes = Vec::new();
        for _ in 0..3 {
            let client = client.clone();
            writes.push(tokio::spawn(async move {
                client.post("/api/automation/actions", &json!({})).await
            }));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        client.get("/api/automation/actions").await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));

        for write in writes {
            write.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_timeout_does_not_block_later_writes() {
        let server = MockInstanaServer::start().await;
        server.respond_with_delay(
            "PUT",
            "/api/settings/v2/maintenance/slow",
            200,
            json!({"id": "slow"}),
            Duration::from_secs(1),
        );
        server.respond("PUT", "/api/settings/v2/maintenance/fast", 200, json!({"id": "fast"}));

        let impatient = RestClient::new(
            ClientConfig::new("t", server.url()).with_request_timeout(Duration::from_millis(100)),
        )
        .unwrap();
        let err = impatient
            .put("/api/settings/v2/maintenance", &json!({"id": "slow"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));

        // Same dispatcher, normal deadline.
        let patient = RestClient {
            inner: Arc::new(Inner {
                http: impatient.inner.http.clone(),
                base_url: impatient.inner.base_url.clone(),
                request_timeout: Duration::from_secs(30),
                queue: impatient.inner.queue.clone(),
                shutdown: CancellationToken::new(),
                dispatcher: Mutex::new(None),
            }),
        };
        let body = patient
            .put("/api/settings/v2/maintenance", &json!({"id": "fast"}))
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["id"], "fast");

        // Let the abandoned request finish; the dispatcher must survive it.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        patient
            .put("/api/settings/v2/maintenance", &json!({"id": "fast"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_rejects_writes_but_not_reads() {
        let server = MockInstanaServer::start().await;
        server.respond("POST", "/api/settings/api-tokens", 200, json!({}));
        server.respond("GET", "/api/settings/api-tokens", 200, json!([]));
        let client = client_for(&server);

        client.shutdown().await;

        let err = client
            .post("/api/settings/api-tokens", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Transport error: client shut down");
        client.get("/api/settings/api-tokens").await.unwrap();
    }

    #[test]
    fn test_format_headers_redacts_authorization() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("apiToken secret"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let rendered = format_headers(&headers);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("authorization: <redacted>"));
        assert!(rendered.contains("content-type: application/json"));
    }
}
