//! Networking configuration.
//!
//! A [`NetworkingConfiguration`] is built once at startup and shared,
//! read-only, by every repository. Validation happens in
//! [`NetworkingConfigurationBuilder::build`], so a configuration value that
//! exists always has a well-formed base URL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::ConfigError;

/// Default request timeout.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default delay between polling attempts.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

// ============================================================================
// Networking Configuration
// ============================================================================

/// Immutable connection settings shared by all repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkingConfiguration {
    use_secure_connection: bool,
    domain: String,
    port: Option<u16>,
    subdomain: Option<String>,
    use_pinning_certificate: bool,
    pinned_certificate: Option<PathBuf>,
    request_timeout: Duration,
    poll_interval: Duration,
    max_poll_retries: Option<u32>,
    base_url: Url,
}

impl NetworkingConfiguration {
    /// Starts a builder for the given domain host.
    pub fn builder(domain: impl Into<String>) -> NetworkingConfigurationBuilder {
        NetworkingConfigurationBuilder::new(domain)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tidewire")
            .join("networking.json")
    }

    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path())
    }

    /// Loads and validates configuration from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let builder: NetworkingConfigurationBuilder = serde_json::from_str(&content)?;
        let config = builder.build()?;

        info!(path = %path.display(), base_url = %config.base_url, "Loaded networking configuration");
        Ok(config)
    }

    /// The derived base URL: scheme, host, optional port, optional path.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds the full URL for a request path.
    ///
    /// The path is appended segment by segment to the base URL. Absolute
    /// URLs and paths containing whitespace or control characters are
    /// rejected.
    pub fn url_for(&self, path: &str) -> Option<Url> {
        if path.contains("://") || path.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return None;
        }

        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().ok()?;
            segments.pop_if_empty();
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
        }
        Some(url)
    }

    /// Whether requests use `https`.
    pub fn use_secure_connection(&self) -> bool {
        self.use_secure_connection
    }

    /// The configured domain host.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Whether only the pinned certificate is trusted.
    pub fn use_pinning_certificate(&self) -> bool {
        self.use_pinning_certificate
    }

    /// PEM file holding the pinned certificate.
    pub fn pinned_certificate(&self) -> Option<&Path> {
        self.pinned_certificate.as_deref()
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Fixed delay between polling attempts.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Maximum number of polling retries, if bounded.
    pub fn max_poll_retries(&self) -> Option<u32> {
        self.max_poll_retries
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`NetworkingConfiguration`]. Also the on-disk JSON format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkingConfigurationBuilder {
    /// Use `https` instead of `http`.
    #[serde(default = "default_true")]
    pub use_secure_connection: bool,
    /// Domain host, e.g. `api.example.com`.
    #[serde(default)]
    pub domain: String,
    /// Explicit port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Path prefix, e.g. `/api/v1`.
    #[serde(default)]
    pub subdomain: Option<String>,
    /// Trust only the pinned certificate.
    #[serde(default)]
    pub use_pinning_certificate: bool,
    /// PEM file with the pinned certificate.
    #[serde(default)]
    pub pinned_certificate: Option<PathBuf>,
    /// Request timeout in milliseconds. Takes precedence over
    /// `request_timeout_secs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
    /// Request timeout in whole seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// Polling interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on polling retries.
    #[serde(default)]
    pub max_poll_retries: Option<u32>,
}

fn default_true() -> bool {
    true
}


fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl NetworkingConfigurationBuilder {
    /// Creates a builder with defaults for everything but the domain.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            use_secure_connection: true,
            domain: domain.into(),
            port: None,
            subdomain: None,
            use_pinning_certificate: false,
            pinned_certificate: None,
            request_timeout_ms: None,
            request_timeout_secs: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_poll_retries: None,
        }
    }

    /// Sets whether to use `https`.
    pub fn secure(mut self, secure: bool) -> Self {
        self.use_secure_connection = secure;
        self
    }

    /// Sets the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the path prefix.
    pub fn subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    /// Enables certificate pinning against a PEM file.
    pub fn pinned_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.use_pinning_certificate = true;
        self.pinned_certificate = Some(path.into());
        self
    }

    /// Sets the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self.request_timeout_secs = None;
        self
    }

    /// Sets the polling interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Bounds the number of polling retries.
    pub fn max_poll_retries(mut self, retries: u32) -> Self {
        self.max_poll_retries = Some(retries);
        self
    }

    /// Validates the settings and derives the base URL.
    pub fn build(self) -> Result<NetworkingConfiguration, ConfigError> {
        if self.domain.trim().is_empty() {
            return Err(ConfigError::MissingDomain);
        }
        if self.use_pinning_certificate && self.pinned_certificate.is_none() {
            return Err(ConfigError::MissingCertificate);
        }

        let base_url = compose_base_url(
            self.use_secure_connection,
            &self.domain,
            self.port,
            self.subdomain.as_deref(),
        )?;
        debug!(base_url = %base_url, "Networking configuration built");

        let timeout_ms = self
            .request_timeout_ms
            .or_else(|| self.request_timeout_secs.map(|secs| secs.saturating_mul(1000)))
            .unwrap_or(DEFAULT_TIMEOUT_MS)
            .max(1);

        Ok(NetworkingConfiguration {
            use_secure_connection: self.use_secure_connection,
            domain: self.domain,
            port: self.port,
            subdomain: self.subdomain,
            use_pinning_certificate: self.use_pinning_certificate,
            pinned_certificate: self.pinned_certificate,
            request_timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_poll_retries: self.max_poll_retries,
            base_url,
        })
    }
}

/// Assembles `scheme://domain[:port][/subdomain]`.
fn compose_base_url(
    secure: bool,
    domain: &str,
    port: Option<u16>,
    subdomain: Option<&str>,
) -> Result<Url, ConfigError> {
    let scheme = if secure { "https" } else { "http" };
    let invalid = |reason: &str| ConfigError::InvalidBaseUrl(format!("{domain}: {reason}"));

    let mut url =
        Url::parse(&format!("{scheme}://{domain}")).map_err(|e| invalid(&e.to_string()))?;

    if url.host_str().is_none() {
        return Err(invalid("no host"));
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("domain must be a bare host"));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(invalid("domain must not carry credentials"));
    }

    if let Some(port) = port {
        url.set_port(Some(port)).map_err(|()| invalid("port rejected"))?;
    }

    if let Some(subdomain) = subdomain.filter(|s| !s.is_empty()) {
        if subdomain.starts_with('/') {
            url.set_path(subdomain);
        } else {
            url.set_path(&format!("/{subdomain}"));
        }
    }

    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================
