//! Authenticated HTTP transport to the upstream REST API.
//!
//! Handlers depend on the [`Transport`] trait; [`HttpTransport`] is the reqwest implementation.
//! One call is one HTTP request: no retries, a fixed per-request timeout.

use async_trait::async_trait;
use mime::Mime;
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::{AuthConfig, ConfigError, RestApiConfig};
use crate::safety::{read_body_limited, redact_url, sanitize_reqwest_error};

const UPSTREAM_MESSAGE_MAX_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The upstream answered with a non-2xx status.
    #[error("API returned status {status}: {}", .message.as_deref().unwrap_or("no error message"))]
    Status {
        status: u16,
        message: Option<String>,
        body: Value,
    },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("response too large: {0}")]
    ResponseTooLarge(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("request failed: {0}")]
    Request(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

impl From<reqwest::Error> for TransportError {
    fn from(value: reqwest::Error) -> Self {
        Self::from_reqwest(&value)
    }
}

impl TransportError {
    /// Sort a reqwest failure into timeout / connect / decode / other.
    #[must_use]
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        let msg = sanitize_reqwest_error(e);
        if e.is_timeout() {
            Self::Timeout(msg)
        } else if e.is_connect() {
            Self::Connect(msg)
        } else if e.is_decode() || e.is_body() {
            Self::Decode(msg)
        } else if let Some(status) = e.status() {
            Self::Status {
                status: status.as_u16(),
                message: None,
                body: Value::Null,
            }
        } else {
            Self::Request(msg)
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// One upstream call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Path relative to the configured base URL, e.g. `/projects/42/tasks`.
    pub endpoint: String,
    pub method: Method,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            body: None,
            query: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    #[must_use]
    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, endpoint).body(body)
    }

    #[must_use]
    pub fn put(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, endpoint).body(body)
    }

    #[must_use]
    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn query_pairs(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }
}

/// Performs one authenticated request and returns the decoded JSON body.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// Returns an error for transport failures (timeout, connection, oversized or undecodable
    /// body) and for non-2xx statuses.
    async fn request(&self, request: ApiRequest) -> Result<Value>;
}

/// reqwest-backed [`Transport`]. Cheap to clone and safe to share across tasks.
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<HttpTransportInner>,
}

struct HttpTransportInner {
    client: Client,
    base_url: Url,
    auth: AuthConfig,
    headers: BTreeMap<String, String>,
    timeout: Option<Duration>,
    max_response_bytes: Option<usize>,
}

impl HttpTransport {
    /// Build a transport with the credential from `config`.
    ///
    /// # Errors
    ///
    /// Fails fast when the config is invalid, in particular when no credential is configured.
    pub fn new(config: &RestApiConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let base_url = config.parsed_base_url()?;
        let auth = config
            .auth
            .clone()
            .ok_or_else(|| ConfigError::Missing("auth is not configured".to_string()))?;

        let client = Client::builder()
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(HttpTransportInner {
                client,
                base_url,
                auth,
                headers: config.headers.clone(),
                timeout: config.timeout(),
                max_response_bytes: config.max_response_bytes,
            }),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn build_url(&self, request: &ApiRequest) -> Result<Url> {
        let mut path = request.endpoint.clone();
        if !path.starts_with('/') {
            path = format!("/{path}");
        }
        let raw = format!(
            "{}{}",
            self.inner.base_url.as_str().trim_end_matches('/'),
            path
        );
        let mut url = Url::parse(&raw).map_err(|e| {
            TransportError::InvalidRequest(format!("invalid endpoint '{}': {e}", request.endpoint))
        })?;

        let query_auth = match &self.inner.auth {
            AuthConfig::Query { name, value } => Some((name, value)),
            _ => None,
        };
        if !request.query.is_empty() || query_auth.is_some() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
            if let Some((name, value)) = query_auth {
                pairs.append_pair(name, value);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: ApiRequest) -> Result<Value> {
        let url = self.build_url(&request)?;
        debug!(
            method = %request.method,
            url = %redact_url(&url),
            "calling upstream API"
        );

        let mut builder = self.inner.client.request(request.method.clone(), url);
        builder = apply_auth(&self.inner.auth, builder);
        builder = builder.header(reqwest::header::ACCEPT, "application/json");
        for (key, value) in &self.inner.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = self.inner.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let read = read_body_limited(response, self.inner.max_response_bytes).await;

        if status.is_success() {
            let bytes = read.map_err(|e| e.into_transport_error(status))?;
            return parse_body(&bytes, content_type.as_deref());
        }

        // The status alone decides the category; an unreadable error body is dropped.
        let body = match read {
            Ok(bytes) => parse_body(&bytes, content_type.as_deref()).unwrap_or(Value::Null),
            Err(e) => {
                debug!(
                    status = status.as_u16(),
                    error = %e,
                    "discarding unreadable error response body"
                );
                Value::Null
            }
        };
        Err(TransportError::Status {
            status: status.as_u16(),
            message: upstream_message(&body),
            body,
        })
    }
}

fn apply_auth(auth: &AuthConfig, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match auth {
        AuthConfig::Bearer { token } => request.bearer_auth(token),
        AuthConfig::Header { name, value } => request.header(name, value),
        AuthConfig::Basic { username, password } => request.basic_auth(username, Some(password)),
        AuthConfig::Query { .. } => request,
    }
}

/// Empty bodies become `null`; JSON is parsed; other UTF-8 text becomes a JSON string.
fn parse_body(bytes: &[u8], content_type: Option<&str>) -> Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(v) => Ok(v),
        Err(e) if is_json_content_type(content_type) => {
            Err(TransportError::Decode(format!("invalid JSON body: {e}")))
        }
        Err(_) => std::str::from_utf8(bytes)
            .map(|s| Value::String(s.to_string()))
            .map_err(|_| TransportError::Decode("response body is not valid UTF-8".to_string())),
    }
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(ct) = content_type else {
        return false;
    };
    let Ok(m) = ct.parse::<Mime>() else {
        return false;
    };
    m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON)
}

/// Best-effort human message from an error body: JSON:API `errors[0]`, then `message`/`error`,
/// then plain text.
fn upstream_message(body: &Value) -> Option<String> {
    let candidates = [
        body.pointer("/errors/0/detail"),
        body.pointer("/errors/0/title"),
        body.get("message"),
        body.pointer("/error/message"),
        body.get("error"),
        Some(body),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(|s| s.chars().take(UPSTREAM_MESSAGE_MAX_CHARS).collect())
}
