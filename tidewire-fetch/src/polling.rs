//! Polling policy for long-running server jobs.

use std::time::Duration;

use tidewire_core::NetworkingConfiguration;

/// Status the server answers with while a job is still processing.
pub const PROCESSING_STATUS: u16 = 202;

/// How a polling request waits and when it gives up.
///
/// The delay is fixed: no backoff growth, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between a processing response and the next request.
    pub interval: Duration,
    /// Maximum number of retries after the first request, if bounded.
    pub max_retries: Option<u32>,
}

impl PollPolicy {
    /// Creates an unbounded policy.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_retries: None,
        }
    }

    /// Takes interval and bound from the configuration.
    pub fn from_config(config: &NetworkingConfiguration) -> Self {
        Self {
            interval: config.poll_interval(),
            max_retries: config.max_poll_retries(),
        }
    }

    /// Bounds the number of retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Returns true if no retry may follow the given number of requests.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_retries
            .is_some_and(|max| attempts.saturating_sub(1) >= max)
    }

    /// Upper bound on time spent waiting between polls, if bounded.
    pub fn max_wait(&self) -> Option<Duration> {
        self.max_retries.map(|max| self.interval.saturating_mul(max))
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
