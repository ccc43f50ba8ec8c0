//! Remote adapter speaking the REST wire mapping.
//!
//! | Verb   | Method | Path                   | Body           | Query string |
//! |--------|--------|------------------------|----------------|--------------|
//! | find   | GET    | `/{base}/{table}/{id}` |                |              |
//! | create | POST   | `/{base}/{table}`      | JSON writable  |              |
//! | update | PATCH  | `/{base}/{table}/{id}` | JSON patch     |              |
//! | remove | DELETE | `/{base}/{table}/{id}` |                |              |
//! | list   | GET    | `/{base}/{table}`      |                | encoded query|
//!
//! The adapter only builds [`HttpRequest`]s and interprets [`HttpResponse`]s;
//! moving bytes is the job of a [`Transport`].

use crate::{
    error::Result, record::supplied_id, Error, ErrorKind, Fields, Query, Record, RecordId,
    TableInterface,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP method used by the wire mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// A request on the wire, before any base URL is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Unencoded path segments: base path segments, table, then optional id
    pub segments: Vec<String>,
    /// Encoded query string without `?`
    pub query: Option<String>,
    /// JSON body
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Percent-encoded absolute path, e.g. `/api/todos/1`.
    pub fn path(&self) -> String {
        let Ok(mut url) = url::Url::parse("http://localhost/") else {
            return format!("/{}", self.segments.join("/"));
        };
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.clear().extend(&self.segments);
        }
        url.path().to_string()
    }
}

/// A response on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` when empty, a JSON string when not JSON
    pub body: Value,
}

impl HttpResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn created(body: Value) -> Self {
        Self { status: 201, body }
    }

    /// Response for a failed operation, with the status from [`error_status`].
    pub fn from_error(err: &Error) -> Self {
        Self {
            status: error_status(err),
            body: error_body(err),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP status a server should answer with for an engine error.
pub fn error_status(err: &Error) -> u16 {
    match err {
        Error::NotFound { .. } => 404,
        Error::AlreadyExists { .. } => 409,
        Error::Remote { status, .. } => *status,
        other => match other.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Transport => 502,
            ErrorKind::NotFound => 404,
            ErrorKind::Misuse => 500,
        },
    }
}

/// JSON error body a server should answer with for an engine error.
pub fn error_body(err: &Error) -> Value {
    if let Error::Remote { body, .. } = err {
        return body.clone();
    }
    json!({
        "error": err.to_string(),
        "kind": err.kind().as_str(),
    })
}

/// Moves [`HttpRequest`]s to a server and brings back the response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Configuration for [`ReqwestTransport`] and [`HttpAdapter::connect`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Scheme, host and port, e.g. `http://localhost:3000`
    pub base_url: String,
    /// Path prefix before the table name, e.g. `api`
    pub base_path: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            base_path: String::new(),
            timeout: None,
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

fn split_base(base_path: &str) -> Vec<String> {
    base_path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// [`Transport`] over a real network connection.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: url::Url,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let base_url = url::Url::parse(&config.base_url)
            .map_err(|e| Error::Misuse(format!("invalid base url {}: {e}", config.base_url)))?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    fn url_for(&self, request: &HttpRequest) -> Result<url::Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Misuse(format!("base url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(&request.segments);
        url.set_query(request.query.as_deref());
        Ok(url)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = self.url_for(&request)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(_) => Value::String(text),
            }
        };

        Ok(HttpResponse { status, body })
    }
}

/// [`Transport`] that serves requests from a local [`TableInterface`]
/// without touching the network. Routes exactly like a REST backend would.
#[derive(Debug, Clone)]
pub struct LoopbackTransport<I> {
    interface: I,
    base: Vec<String>,
}

impl<I: TableInterface> LoopbackTransport<I> {
    pub fn new(interface: I, base_path: &str) -> Self {
        Self {
            interface,
            base: split_base(base_path),
        }
    }

    async fn dispatch(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let Some(route) = request.segments.strip_prefix(self.base.as_slice()) else {
            return Ok(route_not_found(request));
        };

        let body_fields = || -> Result<Fields> {
            match &request.body {
                Some(Value::Object(fields)) => Ok(fields.clone()),
                None => Ok(Fields::new()),
                Some(_) => Err(Error::InvalidPayload("body must be a JSON object".into())),
            }
        };

        match (request.method, route) {
            (Method::Get, [table]) => {
                let query = Query::from_query_string(request.query.as_deref().unwrap_or(""))?;
                let records = self.interface.list(table, &query).await?;
                Ok(HttpResponse::ok(Value::Array(
                    records.iter().map(Record::to_value).collect(),
                )))
            }
            (Method::Post, [table]) => {
                let record = self.interface.create(table, body_fields()?).await?;
                Ok(HttpResponse::created(record.to_value()))
            }
            (Method::Get, [table, id]) => {
                let record = self.interface.find(table, id).await?;
                Ok(HttpResponse::ok(record.to_value()))
            }
            (Method::Patch, [table, id]) => {
                let record = self.interface.update(table, id, body_fields()?).await?;
                Ok(HttpResponse::ok(record.to_value()))
            }
            (Method::Delete, [table, id]) => {
                let record = self.interface.remove(table, id).await?;
                Ok(HttpResponse::ok(record.to_value()))
            }
            _ => Ok(route_not_found(request)),
        }
    }
}

fn route_not_found(request: &HttpRequest) -> HttpResponse {
    HttpResponse {
        status: 404,
        body: json!({
            "error": format!("no route for {} {}", request.method.as_str(), request.path()),
            "kind": "not_found",
        }),
    }
}

#[async_trait]
impl<I: TableInterface> Transport for LoopbackTransport<I> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        match self.dispatch(&request).await {
            Ok(response) => Ok(response),
            Err(err) => Ok(HttpResponse::from_error(&err)),
        }
    }
}

/// Remote [`TableInterface`] over a [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpAdapter<T> {
    transport: T,
    base: Vec<String>,
}

impl HttpAdapter<ReqwestTransport> {
    /// Adapter over a real HTTP client.
    pub fn connect(config: &HttpConfig) -> Result<Self> {
        Ok(Self::new(ReqwestTransport::new(config)?, &config.base_path))
    }
}

impl<T: Transport> HttpAdapter<T> {
    pub fn new(transport: T, base_path: &str) -> Self {
        Self {
            transport,
            base: split_base(base_path),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn request(&self, method: Method, table: &str, id: Option<&str>) -> HttpRequest {
        let mut segments = self.base.clone();
        segments.push(table.to_string());
        if let Some(id) = id {
            segments.push(id.to_string());
        }
        HttpRequest {
            method,
            segments,
            query: None,
            body: None,
        }
    }

    async fn call(&self, request: HttpRequest, table: &str, id: Option<RecordId>) -> Result<Value> {
        tracing::debug!(method = request.method.as_str(), path = %request.path(), "http request");
        let response = self.transport.send(request).await?;
        if response.is_success() {
            return Ok(response.body);
        }

        tracing::warn!(status = response.status, table, "http request failed");
        Err(match (response.status, id) {
            (404, Some(id)) => Error::NotFound {
                table: table.to_string(),
                id,
            },
            (409, Some(id)) => Error::AlreadyExists {
                table: table.to_string(),
                id,
            },
            (status, _) => Error::Remote {
                status,
                body: response.body,
            },
        })
    }
}

fn decode_list(body: Value) -> Result<Vec<Record>> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut page) => match page.remove("data") {
            Some(Value::Array(items)) => items,
            _ => return Err(Error::InvalidPayload("list response has no data array".into())),
        },
        _ => return Err(Error::InvalidPayload("list response must be an array".into())),
    };
    items.into_iter().map(Record::from_value).collect()
}

#[async_trait]
impl<T: Transport> TableInterface for HttpAdapter<T> {
    async fn find(&self, table: &str, id: &str) -> Result<Record> {
        let request = self.request(Method::Get, table, Some(id));
        Record::from_value(self.call(request, table, Some(id.to_string())).await?)
    }

    async fn create(&self, table: &str, data: Fields) -> Result<Record> {
        let id = supplied_id(&data)?;
        let mut request = self.request(Method::Post, table, None);
        request.body = Some(Value::Object(data));
        Record::from_value(self.call(request, table, id).await?)
    }

    async fn update(&self, table: &str, id: &str, data: Fields) -> Result<Record> {
        let mut request = self.request(Method::Patch, table, Some(id));
        request.body = Some(Value::Object(data));
        Record::from_value(self.call(request, table, Some(id.to_string())).await?)
    }

    async fn remove(&self, table: &str, id: &str) -> Result<Record> {
        let request = self.request(Method::Delete, table, Some(id));
        Record::from_value(self.call(request, table, Some(id.to_string())).await?)
    }

    async fn list(&self, table: &str, query: &Query) -> Result<Vec<Record>> {
        let mut request = self.request(Method::Get, table, None);
        if !query.is_empty() {
            request.query = Some(query.to_query_string());
        }
        decode_list(self.call(request, table, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryAdapter;
    use std::sync::{Arc, Mutex};

    /// Records every request and answers from a loopback.
    struct Recording {
        inner: LoopbackTransport<MemoryAdapter>,
        seen: Arc<Mutex<Vec<HttpRequest>>>,
    }

    #[async_trait]
    impl Transport for Recording {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.seen.lock().unwrap().push(request.clone());
            self.inner.send(request).await
        }
    }

    fn recording() -> (HttpAdapter<Recording>, Arc<Mutex<Vec<HttpRequest>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let transport = Recording {
            inner: LoopbackTransport::new(MemoryAdapter::new(), "/api"),
            seen: seen.clone(),
        };
        (HttpAdapter::new(transport, "/api"), seen)
    }

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn verb_to_method_mapping() {
        let (adapter, seen) = recording();
        adapter
            .create("todos", fields(json!({"id": "a", "text": "x"})))
            .await
            .unwrap();
        adapter.find("todos", "a").await.unwrap();
        adapter
            .update("todos", "a", fields(json!({"completed": true})))
            .await
            .unwrap();
        adapter
            .list("todos", &Query::new().eq("completed", true))
            .await
            .unwrap();
        adapter.remove("todos", "a").await.unwrap();

        let seen = seen.lock().unwrap();
        let calls: Vec<(&str, String, Option<String>)> = seen
            .iter()
            .map(|r| (r.method.as_str(), r.path(), r.query.clone()))
            .collect();
        assert_eq!(
            calls,
            vec![
                ("POST", "/api/todos".to_string(), None),
                ("GET", "/api/todos/a".to_string(), None),
                ("PATCH", "/api/todos/a".to_string(), None),
                ("GET", "/api/todos".to_string(), Some("completed=true".to_string())),
                ("DELETE", "/api/todos/a".to_string(), None),
            ]
        );
        assert_eq!(seen[0].body, Some(json!({"id": "a", "text": "x"})));
        assert_eq!(seen[2].body, Some(json!({"completed": true})));
    }

    #[tokio::test]
    async fn not_found_maps_from_404() {
        let (adapter, _) = recording();
        let err = adapter
            .update("todos", "x", fields(json!({"completed": true})))
            .await
            .unwrap_err();
        assert_eq!(err, Error::not_found("todos", "x"));
    }

    #[tokio::test]
    async fn duplicate_create_maps_from_409() {
        let (adapter, _) = recording();
        let data = fields(json!({"id": "a", "text": "x"}));
        adapter.create("todos", data.clone()).await.unwrap();
        let err = adapter.create("todos", data).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { id, .. } if id == "a"));
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_failure() {
        let transport = LoopbackTransport::new(MemoryAdapter::new(), "api");
        let response = transport
            .send(HttpRequest {
                method: Method::Post,
                segments: vec!["api".into(), "todos".into()],
                query: None,
                body: Some(json!([1, 2])),
            })
            .await
            .unwrap();
        assert_eq!(response.status, 400);
        assert_eq!(response.body["kind"], json!("validation"));
    }

    #[tokio::test]
    async fn remote_failures_keep_the_body() {
        struct Failing;

        #[async_trait]
        impl Transport for Failing {
            async fn send(&self, _request: HttpRequest) -> Result<HttpResponse> {
                Ok(HttpResponse {
                    status: 503,
                    body: json!({"error": "maintenance"}),
                })
            }
        }

        let adapter = HttpAdapter::new(Failing, "api");
        let err = adapter.list("todos", &Query::new()).await.unwrap_err();
        assert_eq!(
            err,
            Error::Remote {
                status: 503,
                body: json!({"error": "maintenance"})
            }
        );
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let transport = LoopbackTransport::new(MemoryAdapter::new(), "api");
        let response = transport
            .send(HttpRequest {
                method: Method::Get,
                segments: vec!["other".into(), "todos".into()],
                query: None,
                body: None,
            })
            .await
            .unwrap();
        assert_eq!(response.status, 404);
    }

    #[test]
    fn path_is_percent_encoded() {
        let request = HttpRequest {
            method: Method::Get,
            segments: vec!["api".into(), "todos".into(), "a b/c".into()],
            query: None,
            body: None,
        };
        assert_eq!(request.path(), "/api/todos/a%20b%2Fc");
    }

    #[test]
    fn reqwest_url_joins_base() {
        let transport = ReqwestTransport::new(&HttpConfig::new("http://example.com/root/")).unwrap();
        let request = HttpRequest {
            method: Method::Get,
            segments: vec!["api".into(), "todos".into()],
            query: Some("completed=true".into()),
            body: None,
        };
        assert_eq!(
            transport.url_for(&request).unwrap().as_str(),
            "http://example.com/root/api/todos?completed=true"
        );
    }

    #[test]
    fn list_accepts_paginated_envelope() {
        let records = decode_list(json!({"total": 1, "data": [{"id": "a"}]})).unwrap();
        assert_eq!(records.len(), 1);
        assert!(decode_list(json!("nope")).is_err());
    }

    #[test]
    fn error_statuses() {
        assert_eq!(error_status(&Error::not_found("t", "1")), 404);
        assert_eq!(
            error_status(&Error::AlreadyExists {
                table: "t".into(),
                id: "1".into()
            }),
            409
        );
        assert_eq!(error_status(&Error::UnknownField("x".into())), 400);
        assert_eq!(error_status(&Error::Transport("io".into())), 502);
        assert_eq!(error_status(&Error::Misuse("x".into())), 500);
    }
}
