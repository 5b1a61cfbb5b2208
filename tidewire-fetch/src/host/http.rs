//! HTTP executor.
//!
//! [`HttpExecutor`] is the seam between the repository engine and the
//! network. [`ReqwestExecutor`] is the production implementation; it adds:
//! - Per-configuration timeout, user agent, and optional certificate pinning
//! - Status validation (only 2xx succeeds)
//! - Failure classification (connectivity, timeout, status, transport)
//! - Request/response tracing through [`TrafficLog`]

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Certificate, Client, Method};
use serde_json::{Map, Value};
use tidewire_core::{HttpRequest, NetworkingConfiguration, RawResponse, ResponseError};
use tracing::{debug, info, instrument, trace, warn};

use crate::error::HttpError;

/// User agent string for tidewire.
const USER_AGENT: &str = concat!("tidewire/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Executor Trait
// ============================================================================

/// Performs one HTTP exchange.
///
/// Implementations must treat only 2xx as success, must report
/// connectivity failures with [`tidewire_core::FailureKind::Connectivity`],
/// and must attach whatever body the server sent to a failure.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    /// Sends the request and returns the raw response.
    async fn perform(&self, request: HttpRequest) -> Result<RawResponse, ResponseError>;
}

// ============================================================================
// Reqwest Executor
// ============================================================================

/// [`HttpExecutor`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    inner: Client,
    traffic: TrafficLog,
}

impl ReqwestExecutor {
    /// Builds an executor from the networking configuration.
    ///
    /// Cookies are never stored. With pinning enabled only the configured
    /// certificate is trusted.
    pub fn new(config: &NetworkingConfiguration) -> Result<Self, HttpError> {
        let mut builder = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT);

        if config.use_pinning_certificate() {
            let path = config
                .pinned_certificate()
                .ok_or_else(|| HttpError::Certificate("no certificate configured".to_string()))?;
            let pem = std::fs::read(path)
                .map_err(|e| HttpError::Certificate(format!("{}: {e}", path.display())))?;
            let certificate = Certificate::from_pem(&pem)?;

            debug!(path = %path.display(), "Pinning server certificate");
            builder = builder
                .tls_built_in_root_certs(false)
                .add_root_certificate(certificate);
        }

        Ok(Self {
            inner: builder.build()?,
            traffic: TrafficLog::default(),
        })
    }

    /// Enables or disables verbose traffic logging.
    pub fn with_traffic_log(mut self, enabled: bool) -> Self {
        self.traffic = TrafficLog::new(enabled);
        self
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn perform(&self, request: HttpRequest) -> Result<RawResponse, ResponseError> {
        self.traffic.log_request(&request);

        let method = Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| ResponseError::transport(e.to_string()))?;

        let mut builder = self.inner.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(params) = &request.params {
            builder = if request.method.sends_body() {
                builder.json(params)
            } else {
                builder.query(&query_pairs(params))
            };
        }

        let response = builder.send().await.map_err(|e| {
            let error = classify_transport_error(&e);
            self.traffic.log_error(&error);
            error
        })?;

        let status = response.status();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_transport_error(&e))?
            .to_vec();

        debug!(status = %status, bytes = body.len(), "Response received");
        self.traffic.log_response(status.as_u16(), &headers, &body);

        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("Unknown status");
            let error = ResponseError::status(status.as_u16(), reason, &body);
            self.traffic.log_error(&error);
            return Err(error);
        }

        Ok(RawResponse {
            request,
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

/// Flattens parameters into query pairs. Strings are sent bare, everything
/// else as its JSON text.
fn query_pairs(params: &Map<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

fn classify_transport_error(error: &reqwest::Error) -> ResponseError {
    if error.is_timeout() {
        ResponseError::timeout(error.to_string())
    } else if error.is_connect() {
        ResponseError::connectivity(error.to_string())
    } else {
        ResponseError::transport(error.to_string())
    }
}

// ============================================================================
// Traffic Log
// ============================================================================

/// Verbose request/response logging, off by default.
///
/// Debug-level events are always emitted by the executor; this adds header
/// names and pretty-printed bodies when enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrafficLog {
    enabled: bool,
}

impl TrafficLog {
    /// Creates a traffic log.
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Whether verbose logging is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Logs an outgoing request. Header values are never logged.
    pub fn log_request(&self, request: &HttpRequest) {
        if !self.enabled {
            return;
        }
        let header_names: Vec<&str> = request.headers.keys().map(String::as_str).collect();
        info!(
            method = %request.method,
            url = %request.url,
            headers = ?header_names,
            "Request"
        );
    }

    /// Logs a received response.
    pub fn log_response(&self, status: u16, headers: &BTreeMap<String, String>, body: &[u8]) {
        if !self.enabled {
            return;
        }
        info!(status, headers = ?headers, bytes = body.len(), "Response");
        trace!(body = %pretty_body(body), "Response body");
    }

    /// Logs a failed exchange.
    pub fn log_error(&self, error: &ResponseError) {
        if !self.enabled {
            return;
        }
        warn!(kind = %error.kind, status = ?error.status, message = %error.message, "Request failed");
    }
}

/// Pretty JSON if the body parses, lossy text otherwise.
fn pretty_body(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|json| serde_json::to_string_pretty(&json).ok())
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}

// ============================================================================
// Tests
// ============================================================================
