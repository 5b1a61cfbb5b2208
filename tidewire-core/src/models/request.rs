//! Request and raw response values.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use url::Url;

use super::NetworkingMethod;

/// Header that carries the session token.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

// ============================================================================
// HTTP Request
// ============================================================================

/// A fully resolved request handed to the HTTP executor.
#[derive(Clone, PartialEq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: NetworkingMethod,
    /// Absolute URL.
    pub url: Url,
    /// Request parameters (query string or JSON body, by method).
    pub params: Option<Map<String, Value>>,
    /// Request headers.
    pub headers: BTreeMap<String, String>,
}

impl HttpRequest {
    /// Creates a request with no parameters and no headers.
    pub fn new(method: NetworkingMethod, url: Url) -> Self {
        Self {
            method,
            url,
            params: None,
            headers: BTreeMap::new(),
        }
    }

    /// Sets the parameters.
    pub fn with_params(mut self, params: Option<Map<String, Value>>) -> Self {
        self.params = params;
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Returns true if the request carries a session token.
    pub fn is_authenticated(&self) -> bool {
        self.headers.contains_key(AUTHORIZATION_HEADER)
    }
}

// The token must never reach logs through `{:?}`.
impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: BTreeMap<&str, &str> = self
            .headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case(AUTHORIZATION_HEADER) {
                    (name.as_str(), "<redacted>")
                } else {
                    (name.as_str(), value.as_str())
                }
            })
            .collect();

        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("params", &self.params)
            .field("headers", &headers)
            .finish()
    }
}

// ============================================================================
// Raw Response
// ============================================================================

/// A successful (2xx) exchange: the request, the response head, and the body.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The request that produced this response.
    pub request: HttpRequest,
    /// HTTP status code.
    pub status: u16,
    /// Response headers (lowercase names).
    pub headers: BTreeMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Returns a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the body as UTF-8 text, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Splits into `(request, status, body)`.
    pub fn into_parts(self) -> (HttpRequest, u16, Vec<u8>) {
        (self.request, self.status, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let request = HttpRequest::new(
            NetworkingMethod::Get,
            Url::parse("https://example.com/me").unwrap(),
        )
        .with_header(AUTHORIZATION_HEADER, "secret-token");

        let debug = format!("{request:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<redacted>"));
        assert!(request.is_authenticated());
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let request = HttpRequest::new(
            NetworkingMethod::Get,
            Url::parse("https://example.com").unwrap(),
        );
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        let response = RawResponse {
            request,
            status: 200,
            headers,
            body: b"{}".to_vec(),
        };
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.text(), "{}");
    }
}
