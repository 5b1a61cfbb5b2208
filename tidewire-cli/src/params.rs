//! Parsing of `key=value` command-line arguments.

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};
use thiserror::Error;
use tidewire_core::{CustomErrorMap, CustomRepositoryError};

/// Parses `key=value` pairs into request parameters.
///
/// Values that parse as JSON (numbers, booleans, arrays, objects, quoted
/// strings) keep their type; anything else is sent as a string.
pub fn parse_params(pairs: &[String]) -> Result<Option<Map<String, Value>>> {
    if pairs.is_empty() {
        return Ok(None);
    }

    let mut params = Map::new();
    for pair in pairs {
        let (key, raw) = split_pair(pair)?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(Some(params))
}

/// Splits a dotted path such as `data.user` into segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

fn split_pair(pair: &str) -> Result<(&str, &str)> {
    let (key, value) = pair
        .split_once('=')
        .with_context(|| format!("expected key=value, got '{pair}'"))?;
    if key.is_empty() {
        bail!("empty key in '{pair}'");
    }
    Ok((key, value))
}

// ============================================================================
// Custom Errors
// ============================================================================

/// A custom error named on the command line.
#[derive(Debug, Error)]
#[error("{name}")]
pub struct NamedError {
    name: String,
}

impl CustomRepositoryError for NamedError {
    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Builds a custom error table from `match=Name` arguments.
///
/// A numeric match is a status code, anything else a substring of the
/// failure message.
pub fn parse_error_map(entries: &[String]) -> Result<CustomErrorMap> {
    let mut map = CustomErrorMap::new();
    for entry in entries {
        let (matcher, name) = split_pair(entry)?;
        let error = NamedError {
            name: name.to_string(),
        };
        map = match matcher.parse::<u16>() {
            Ok(status) => map.with_status(status, error),
            Err(_) => map.with_message(matcher, error),
        };
    }
    Ok(map)
}
