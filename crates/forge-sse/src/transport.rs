//! HTTP collaborator used by sessions to open a response body.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::{HeaderName, HeaderValue};

use crate::errors::TransportError;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Response body as a stream of chunks.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// A prepared request to open an event stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl StreamRequest {
    pub fn new(method: reqwest::Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// GET with `Accept: text/event-stream`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(reqwest::Method::GET, url).header("accept", EVENT_STREAM_MIME)
    }

    /// POST with `Accept: text/event-stream`.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(reqwest::Method::POST, url).header("accept", EVENT_STREAM_MIME)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status line plus the still-unread body.
pub struct TransportResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Performs a request and hands back the response body unread.
///
/// Built once and shared by every session of a client.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: StreamRequest) -> Result<TransportResponse, TransportError>;
}

/// Settings for [`ReqwestTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    pub connect_timeout: Option<Duration>,
    /// Longest gap allowed between body reads. Unset by default because event
    /// streams may idle for long stretches.
    pub read_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: None,
            user_agent: format!("forge-sse/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportConfig {
    /// Read overrides from `FORGE_SSE_CONNECT_TIMEOUT_MS`,
    /// `FORGE_SSE_READ_TIMEOUT_MS` and `FORGE_SSE_USER_AGENT`. A timeout of `0`
    /// disables it; blank or unparsable values keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(timeout) = millis_from(&lookup, "FORGE_SSE_CONNECT_TIMEOUT_MS") {
            config.connect_timeout = timeout;
        }
        if let Some(timeout) = millis_from(&lookup, "FORGE_SSE_READ_TIMEOUT_MS") {
            config.read_timeout = timeout;
        }
        if let Some(user_agent) = lookup("FORGE_SSE_USER_AGENT")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
        {
            config.user_agent = user_agent;
        }
        config
    }
}

fn millis_from(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<Option<Duration>> {
    let millis = lookup(key)?.trim().parse::<u64>().ok()?;
    Some((millis > 0).then(|| Duration::from_millis(millis)))
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.read_timeout {
            builder = builder.read_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| TransportError::InvalidRequest(format!("http client build failed: {err}")))?;
        Ok(Self { client })
    }

    pub fn from_env() -> Result<Self, TransportError> {
        Self::new(&TransportConfig::from_env())
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: StreamRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| TransportError::InvalidRequest(format!("header name '{name}': {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| TransportError::InvalidRequest(format!("header value for '{name}': {err}")))?;
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::Request(format!("http request failed: {err}")))?;
        let status = response.status().as_u16();
        let body = response.bytes_stream().map(|chunk| chunk.map_err(io::Error::other));

        Ok(TransportResponse {
            status,
            body: body.boxed(),
        })
    }
}
