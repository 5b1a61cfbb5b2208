//! The repository engine.
//!
//! A [`Repository`] turns `(method, path, params, decoder)` into a typed
//! result. It gates on the session, builds the URL, runs the exchange
//! through an [`HttpExecutor`], classifies failures, and decodes bodies.
//! Domain repositories wrap one and expose typed operations.
//!
//! Every call is a single future. Dropping it cancels the in-flight
//! exchange and, for polling calls, any pending retry.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tidewire_core::{
    AUTHORIZATION_HEADER, DecodeError, HttpRequest, NetworkingConfiguration, NetworkingMethod,
    RawResponse, RepositoryError, SessionManager, parse_body,
};
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

use crate::classify::classify_failure;
use crate::error::HttpError;
use crate::host::http::{HttpExecutor, ReqwestExecutor};
use crate::host::scheduler::{DelayScheduler, TokioScheduler};
use crate::polling::{PROCESSING_STATUS, PollPolicy};

/// Callback run whenever a decoder rejects a response.
pub type DecodeErrorHook = Arc<dyn Fn(&DecodeError) + Send + Sync>;

// ============================================================================
// Repository
// ============================================================================

/// Session-aware request engine shared by domain repositories.
#[derive(Clone)]
pub struct Repository {
    config: Arc<NetworkingConfiguration>,
    session: Arc<dyn SessionManager>,
    executor: Arc<dyn HttpExecutor>,
    scheduler: Arc<dyn DelayScheduler>,
    poll_policy: PollPolicy,
    on_decode_error: Option<DecodeErrorHook>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("base_url", &self.config.base_url().as_str())
            .field("poll_policy", &self.poll_policy)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Starts a builder.
    pub fn builder(
        config: Arc<NetworkingConfiguration>,
        session: Arc<dyn SessionManager>,
    ) -> RepositoryBuilder {
        RepositoryBuilder::new(config, session)
    }

    /// Performs an authenticated request and decodes the body.
    ///
    /// Fails with [`RepositoryError::UnauthenticatedSession`] without
    /// touching the network when there is no session.
    #[instrument(skip(self, params, decoder), fields(method = %method, path = %path))]
    pub async fn perform_request<T, D>(
        &self,
        method: NetworkingMethod,
        path: &str,
        params: Option<Map<String, Value>>,
        decoder: D,
    ) -> Result<T, RepositoryError>
    where
        D: Fn(&Value) -> Result<T, DecodeError>,
    {
        let token = self.require_session()?;
        let response = self.perform(method, path, params, Some(&token)).await?;
        self.deserialize(&response.body, &decoder)
    }

    /// Performs an authenticated request, re-issuing it while the server
    /// answers 202.
    ///
    /// Each retry waits the policy interval and re-checks the session. The
    /// chain ends at the first non-202 outcome, which is decoded or
    /// classified like [`Repository::perform_request`]. With a bounded
    /// policy the chain fails with [`RepositoryError::PollingExhausted`]
    /// once the bound is reached, and with
    /// [`RepositoryError::PollingInterrupted`] if the scheduler drops a
    /// wake-up without running it.
    #[instrument(skip(self, params, decoder), fields(method = %method, path = %path))]
    pub async fn perform_polling_request<T, D>(
        &self,
        method: NetworkingMethod,
        path: &str,
        params: Option<Map<String, Value>>,
        decoder: D,
    ) -> Result<T, RepositoryError>
    where
        D: Fn(&Value) -> Result<T, DecodeError>,
    {
        let mut attempts: u32 = 0;

        loop {
            let token = self.require_session()?;
            attempts += 1;

            let response = self.perform(method, path, params.clone(), Some(&token)).await?;
            if response.status != PROCESSING_STATUS {
                debug!(attempts, status = response.status, "Polling finished");
                return self.deserialize(&response.body, &decoder);
            }

            if self.poll_policy.is_exhausted(attempts) {
                warn!(attempts, "Polling bound reached, giving up");
                return Err(RepositoryError::PollingExhausted { attempts });
            }

            debug!(
                attempt = attempts,
                delay_ms = self.poll_policy.interval.as_millis(),
                "Job still processing, scheduling retry"
            );
            if !self.wait(self.poll_policy.interval).await {
                warn!(attempts, "Scheduler dropped the retry, giving up");
                return Err(RepositoryError::PollingInterrupted { attempts });
            }
        }
    }

    /// Performs a request without a session and without an
    /// `Authorization` header. Used for login and signup.
    #[instrument(skip(self, params, decoder), fields(method = %method, path = %path))]
    pub async fn perform_authentication_request<T, D>(
        &self,
        method: NetworkingMethod,
        path: &str,
        params: Option<Map<String, Value>>,
        decoder: D,
    ) -> Result<T, RepositoryError>
    where
        D: Fn(&Value) -> Result<T, DecodeError>,
    {
        let response = self.perform(method, path, params, None).await?;
        self.deserialize(&response.body, &decoder)
    }

    /// Performs an authenticated request and returns the undecoded
    /// exchange, for callers that need the status or headers.
    #[instrument(skip(self, params), fields(method = %method, path = %path))]
    pub async fn perform_raw_request(
        &self,
        method: NetworkingMethod,
        path: &str,
        params: Option<Map<String, Value>>,
    ) -> Result<RawResponse, RepositoryError> {
        let token = self.require_session()?;
        self.perform(method, path, params, Some(&token)).await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn require_session(&self) -> Result<String, RepositoryError> {
        if !self.session.is_logged_in() {
            debug!("No active session, refusing request");
            return Err(RepositoryError::UnauthenticatedSession);
        }
        self.session
            .session_token()
            .ok_or(RepositoryError::UnauthenticatedSession)
    }

    async fn perform(
        &self,
        method: NetworkingMethod,
        path: &str,
        params: Option<Map<String, Value>>,
        token: Option<&str>,
    ) -> Result<RawResponse, RepositoryError> {
        let url = self
            .config
            .url_for(path)
            .ok_or_else(|| RepositoryError::InvalidUrl(path.to_string()))?;

        let mut request = HttpRequest::new(method, url).with_params(params);
        if let Some(token) = token {
            request = request.with_header(AUTHORIZATION_HEADER, token);
        }

        match self.executor.perform(request).await {
            Ok(response) => Ok(response),
            Err(error) => Err(classify_failure(error, self.session.as_ref()).await),
        }
    }

    fn deserialize<T, D>(&self, body: &[u8], decoder: &D) -> Result<T, RepositoryError>
    where
        D: Fn(&Value) -> Result<T, DecodeError>,
    {
        let value = parse_body(body).map_err(|e| {
            warn!(error = %e, bytes = body.len(), "Response is not valid JSON");
            RepositoryError::Json(e)
        })?;

        decoder(&value).map_err(|e| {
            warn!(error = %e, "Response did not match the expected shape");
            if let Some(hook) = &self.on_decode_error {
                hook(&e);
            }
            RepositoryError::Decode(e)
        })
    }

    /// Suspends for `delay` using the scheduler. Dropping the future drops
    /// the task handle, which cancels the pending wake-up.
    ///
    /// Returns false if the scheduler dropped the action without running it.
    async fn wait(&self, delay: Duration) -> bool {
        let (tx, rx) = oneshot::channel();
        let _task = self.scheduler.schedule_after(
            delay,
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        rx.await.is_ok()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Repository`].
pub struct RepositoryBuilder {
    config: Arc<NetworkingConfiguration>,
    session: Arc<dyn SessionManager>,
    executor: Option<Arc<dyn HttpExecutor>>,
    scheduler: Option<Arc<dyn DelayScheduler>>,
    poll_policy: Option<PollPolicy>,
    on_decode_error: Option<DecodeErrorHook>,
}

impl RepositoryBuilder {
    /// Creates a builder with default collaborators.
    pub fn new(config: Arc<NetworkingConfiguration>, session: Arc<dyn SessionManager>) -> Self {
        Self {
            config,
            session,
            executor: None,
            scheduler: None,
            poll_policy: None,
            on_decode_error: None,
        }
    }

    /// Uses a custom HTTP executor.
    pub fn executor(mut self, executor: Arc<dyn HttpExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Uses a custom delay scheduler.
    pub fn scheduler(mut self, scheduler: Arc<dyn DelayScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Overrides the polling policy derived from the configuration.
    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = Some(policy);
        self
    }

    /// Runs `hook` each time a decoder rejects a response.
    pub fn on_decode_error(mut self, hook: impl Fn(&DecodeError) + Send + Sync + 'static) -> Self {
        self.on_decode_error = Some(Arc::new(hook));
        self
    }

    /// Builds the repository. Building the default executor can fail when
    /// the pinned certificate is unreadable.
    pub fn build(self) -> Result<Repository, HttpError> {
        let executor = match self.executor {
            Some(executor) => executor,
            None => Arc::new(ReqwestExecutor::new(&self.config)?),
        };
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(TokioScheduler::new()));
        let poll_policy = self
            .poll_policy
            .unwrap_or_else(|| PollPolicy::from_config(&self.config));

        Ok(Repository {
            config: self.config,
            session: self.session,
            executor,
            scheduler,
            poll_policy,
            on_decode_error: self.on_decode_error,
        })
    }
}
