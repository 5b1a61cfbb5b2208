//! Output formatting for CLI.

use anyhow::Result;
use serde::Serialize;
use tidewire_core::RawResponse;

use crate::OutputFormat;

/// Renders a serializable value as JSON.
pub fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(output)
}

/// Shows the first and last characters of a token only.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

/// Raw response as printed by the `raw` command.
#[derive(Debug, Serialize)]
pub struct RawOutput<'a> {
    /// Request method.
    pub method: String,
    /// Request URL.
    pub url: String,
    /// Response status.
    pub status: u16,
    /// Response headers.
    pub headers: &'a std::collections::BTreeMap<String, String>,
    /// Response body, as JSON when it parses.
    pub body: serde_json::Value,
}

impl<'a> RawOutput<'a> {
    /// Builds the output view of a response.
    pub fn new(response: &'a RawResponse) -> Self {
        let body = serde_json::from_slice(&response.body)
            .unwrap_or_else(|_| serde_json::Value::String(response.text()));
        Self {
            method: response.request.method.to_string(),
            url: response.request.url.to_string(),
            status: response.status,
            headers: &response.headers,
            body,
        }
    }

    /// Renders the response in the requested format.
    pub fn render(&self, format: OutputFormat, pretty: bool) -> Result<String> {
        match format {
            OutputFormat::Json => to_json(self, pretty),
            OutputFormat::Text => {
                let mut out = format!("{} {}\nHTTP {}\n", self.method, self.url, self.status);
                for (name, value) in self.headers {
                    out.push_str(&format!("{name}: {value}\n"));
                }
                out.push('\n');
                match &self.body {
                    serde_json::Value::String(text) => out.push_str(text),
                    json => out.push_str(&serde_json::to_string_pretty(json)?),
                }
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tidewire_core::{HttpRequest, NetworkingMethod};
    use url::Url;

    fn response(body: &str) -> RawResponse {
        RawResponse {
            request: HttpRequest::new(
                NetworkingMethod::Get,
                Url::parse("https://api.example.com/books").unwrap(),
            ),
            status: 200,
            headers: BTreeMap::from([("content-type".to_string(), "application/json".to_string())]),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("abc"), "***");
        assert_eq!(mask_token("abcdefghijkl"), "abcd…ijkl");
    }

    #[test]
    fn test_to_json_compact_and_pretty() {
        let value = serde_json::json!({"a": 1});
        assert_eq!(to_json(&value, false).unwrap(), r#"{"a":1}"#);
        assert_eq!(to_json(&value, true).unwrap(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_raw_output_text() {
        let response = response(r#"{"id":1}"#);
        let text = RawOutput::new(&response).render(OutputFormat::Text, false).unwrap();

        assert!(text.starts_with("GET https://api.example.com/books\nHTTP 200\n"));
        assert!(text.contains("content-type: application/json"));
        assert!(text.ends_with("{\n  \"id\": 1\n}"));
    }

    #[test]
    fn test_raw_output_json_with_plain_body() {
        let response = response("not json");
        let json = RawOutput::new(&response).render(OutputFormat::Json, false).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["status"], 200);
        assert_eq!(parsed["body"], "not json");
    }
}
