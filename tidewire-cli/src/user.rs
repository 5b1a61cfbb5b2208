//! The user type the CLI keeps in its session.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tidewire_core::{AuthenticableUser, DecodeError, decode_json, decode_path};

/// A user as returned by the server.
///
/// Only the token is interpreted; the rest of the user object is kept as
/// loose JSON for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliUser {
    /// Session token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Remaining user fields.
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl CliUser {
    /// A user known only by its token.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            profile: Map::new(),
        }
    }

    /// Decodes a user from a response body.
    ///
    /// `user_path` selects the user object (empty for the whole body) and
    /// `token_path` the token, relative to the body root. The token may also
    /// be absent, in which case the caller supplies one.
    pub fn decode(value: &Value, user_path: &[&str], token_path: &[&str]) -> Result<Self, DecodeError> {
        let profile: Map<String, Value> = if user_path.is_empty() {
            let mut profile: Map<String, Value> = decode_json(value)?;
            if let [key] = token_path {
                profile.remove(*key);
            }
            profile
        } else {
            decode_path(value, user_path)?
        };
        let token: Option<String> = decode_path(value, token_path).ok();

        Ok(Self { token, profile })
    }

    /// A display label: `email`, `name`, or `id`, whichever exists first.
    pub fn label(&self) -> String {
        ["email", "name", "username", "id"]
            .iter()
            .find_map(|key| self.profile.get(*key))
            .map_or_else(
                || "(unknown user)".to_string(),
                |value| match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            )
    }
}

impl AuthenticableUser for CliUser {
    fn session_token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}
