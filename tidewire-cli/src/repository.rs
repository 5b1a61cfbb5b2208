//! JSON repository used by the CLI commands.
//!
//! A thin domain repository over [`Repository`]: every operation decodes
//! to loose JSON and applies the custom error table given on the command
//! line.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tidewire_core::{
    CurrentUserFetcher, CustomErrorMap, NetworkingMethod, RawResponse, RepositoryError, ResultExt,
    SessionManager, decode_json,
};
use tidewire_fetch::Repository;

use crate::user::CliUser;

/// Untyped repository for ad-hoc requests.
#[derive(Debug, Clone)]
pub struct JsonRepository {
    inner: Repository,
    errors: Arc<CustomErrorMap>,
}

impl JsonRepository {
    /// Wraps a repository with a custom error table.
    pub fn new(inner: Repository, errors: CustomErrorMap) -> Self {
        Self {
            inner,
            errors: Arc::new(errors),
        }
    }

    /// Authenticated request decoded as JSON.
    pub async fn fetch(
        &self,
        method: NetworkingMethod,
        path: &str,
        params: Option<Map<String, Value>>,
    ) -> Result<Value, RepositoryError> {
        self.inner
            .perform_request(method, path, params, decode_json)
            .await
            .map_custom_error(&self.errors)
    }

    /// Authenticated request that waits out 202 responses.
    pub async fn poll(
        &self,
        method: NetworkingMethod,
        path: &str,
        params: Option<Map<String, Value>>,
    ) -> Result<Value, RepositoryError> {
        self.inner
            .perform_polling_request(method, path, params, decode_json)
            .await
            .map_custom_error(&self.errors)
    }

    /// Authenticated request returned undecoded.
    pub async fn raw(
        &self,
        method: NetworkingMethod,
        path: &str,
        params: Option<Map<String, Value>>,
    ) -> Result<RawResponse, RepositoryError> {
        self.inner
            .perform_raw_request(method, path, params)
            .await
            .map_custom_error(&self.errors)
    }

    /// Sends credentials and decodes the user from the response.
    pub async fn authenticate(
        &self,
        method: NetworkingMethod,
        path: &str,
        params: Option<Map<String, Value>>,
        user_path: &[&str],
        token_path: &[&str],
    ) -> Result<CliUser, RepositoryError> {
        self.inner
            .perform_authentication_request(method, path, params, |value| {
                CliUser::decode(value, user_path, token_path)
            })
            .await
            .map_custom_error(&self.errors)
    }
}

// ============================================================================
// Current User Fetcher
// ============================================================================

/// Fetches the session's user from a fixed endpoint.
///
/// Such endpoints rarely echo the token, so the fetched user keeps the
/// session's current one.
pub struct CurrentUserEndpoint {
    repository: JsonRepository,
    session: Arc<dyn SessionManager>,
    path: String,
}

impl CurrentUserEndpoint {
    /// Creates a fetcher for `path`.
    pub fn new(
        repository: JsonRepository,
        session: Arc<dyn SessionManager>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            session,
            path: path.into(),
        }
    }
}

#[async_trait]
impl CurrentUserFetcher<CliUser> for CurrentUserEndpoint {
    async fn fetch_current_user(&self) -> Result<CliUser, RepositoryError> {
        let body = self
            .repository
            .fetch(NetworkingMethod::Get, &self.path, None)
            .await?;
        let profile: Map<String, Value> = decode_json(&body).map_err(RepositoryError::Decode)?;

        Ok(CliUser {
            token: self.session.session_token(),
            profile,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
