//! JSON-over-HTTP engine adapter.
//!
//! Posts the query to a configured endpoint and reads a small JSON answer:
//!
//! ```text
//! POST <url>
//! { "query": "...", "context": { ... }, "mode": "cloud" }
//!
//! 200 OK
//! { "success": true, "content": "...", "confidence": 0.82, "metadata": { ... } }
//! ```
//!
//! Status mapping: 429 → rate limited (honouring `Retry-After` seconds),
//! 408/504 → timeout, 502/503 and other 5xx → unavailable, other non-2xx →
//! unclassified failure. Transport timeouts and connection failures are
//! network errors and therefore retried.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use super::traits::EngineAdapter;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::types::{Capability, EngineMode, EngineResponse, Query, QueryContext};
use crate::{MuninnError, Result};

/// Confidence assumed when the backend does not report one.
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Upper bound for health probes.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// An engine reached over HTTP.
#[derive(Clone)]
pub struct HttpEngine {
    id: String,
    url: Url,
    capabilities: Vec<Capability>,
    api_key: Option<String>,
    health_url: Option<Url>,
    http: Client,
}

impl HttpEngine {
    /// Create an engine posting to `url`.
    pub fn new(id: impl Into<String>, url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| MuninnError::Configuration(format!("invalid engine url {url:?}: {e}")))?;
        let http = Client::builder()
            .build()
            .map_err(|e| MuninnError::Http(e.to_string()))?;
        Ok(Self {
            id: id.into(),
            url,
            capabilities: Vec::new(),
            api_key: None,
            health_url: None,
            http,
        })
    }

    /// Build from a config entry, reading the API key from its environment
    /// variable if one is named.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let mut engine = Self::new(config.id.clone(), &config.url)?
            .capabilities(config.capabilities.iter().copied());
        if let Some(var) = &config.api_key_env {
            let key = std::env::var(var).map_err(|_| {
                MuninnError::Configuration(format!(
                    "engine {}: environment variable {var} is not set",
                    config.id
                ))
            })?;
            engine = engine.api_key(key);
        }
        if let Some(path) = &config.health_path {
            engine = engine.health_path(path)?;
        }
        Ok(engine)
    }

    pub fn capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = capabilities.into_iter().collect();
        self
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Probe `path`, resolved against the engine url, in health checks.
    pub fn health_path(mut self, path: &str) -> Result<Self> {
        let url = self.url.join(path).map_err(|e| {
            MuninnError::Configuration(format!("invalid health path {path:?}: {e}"))
        })?;
        self.health_url = Some(url);
        Ok(self)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl EngineAdapter for HttpEngine {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    async fn invoke(
        &self,
        query: &Query,
        timeout: Duration,
    ) -> std::result::Result<EngineResponse, EngineError> {
        let start = Instant::now();
        let body = InvokeRequest {
            query: query.text(),
            context: query.context(),
            mode: query.options().mode,
        };
        let response = self
            .request(self.http.post(self.url.clone()))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&e, timeout))?;

        check_status(&response, timeout)?;

        let answer: InvokeResponse = response
            .json()
            .await
            .map_err(|e| match transport_error(&e, timeout) {
                EngineError::Timeout(t) => EngineError::Timeout(t),
                _ => EngineError::Other(format!("invalid response body: {e}")),
            })?;

        if !answer.success {
            let reason = answer
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or(answer.content);
            return Err(EngineError::Unsuccessful(reason));
        }

        let mut out = EngineResponse::success(
            self.id.clone(),
            answer.content,
            answer.confidence.unwrap_or(DEFAULT_CONFIDENCE),
        )
        .processing_time_ms(start.elapsed().as_millis() as u64);
        if let Some(metadata) = answer.metadata {
            out.metadata.extra = metadata;
        }
        Ok(out)
    }

    async fn health_check(&self) -> bool {
        let Some(url) = &self.health_url else {
            return true;
        };
        match self
            .request(self.http.get(url.clone()))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for HttpEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEngine")
            .field("id", &self.id)
            .field("url", &self.url.as_str())
            .field("capabilities", &self.capabilities)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn transport_error(e: &reqwest::Error, timeout: Duration) -> EngineError {
    if e.is_timeout() {
        EngineError::Timeout(timeout)
    } else if e.is_connect() || e.is_request() {
        EngineError::Network(e.to_string())
    } else {
        EngineError::Other(e.to_string())
    }
}

fn check_status(
    response: &reqwest::Response,
    timeout: Duration,
) -> std::result::Result<(), EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(EngineError::RateLimited { retry_after })
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            Err(EngineError::Timeout(timeout))
        }
        s if s.is_server_error() => Err(EngineError::Unavailable(format!("HTTP {s}"))),
        s => Err(EngineError::Other(format!("HTTP {s}"))),
    }
}

#[derive(Serialize)]
struct InvokeRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a QueryContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<EngineMode>,
}

#[derive(Deserialize)]
struct InvokeResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    content: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

fn default_success() -> bool {
    true
}
