//! Test doubles shared by the fetch integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tidewire_core::{HttpRequest, RawResponse, ResponseError, SessionError, SessionManager};
use tidewire_fetch::{DelayScheduler, HttpExecutor, ScheduledAction, ScheduledTask};

// ============================================================================
// Mock Executor
// ============================================================================

/// Scripted outcome of one exchange.
pub type Scripted = Result<(u16, Vec<u8>), ResponseError>;

/// Executor that replays scripted outcomes. The last outcome repeats.
#[derive(Default)]
pub struct MockExecutor {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
    calls: AtomicUsize,
}

impl MockExecutor {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        })
    }

    pub fn ok(status: u16, body: &str) -> Scripted {
        Ok((status, body.as_bytes().to_vec()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpExecutor for MockExecutor {
    async fn perform(&self, request: HttpRequest) -> Result<RawResponse, ResponseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let next = {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            }
        };

        match next.expect("executor script is empty") {
            Ok((status, body)) => Ok(RawResponse {
                request,
                status,
                headers: BTreeMap::from([(
                    "content-type".to_string(),
                    "application/json".to_string(),
                )]),
                body,
            }),
            Err(error) => Err(error),
        }
    }
}

// ============================================================================
// Mock Session
// ============================================================================

/// Session with a plain token slot.
#[derive(Default)]
pub struct MockSession {
    token: Mutex<Option<String>>,
    expirations: AtomicUsize,
}

impl MockSession {
    pub fn logged_in(token: &str) -> Arc<Self> {
        Arc::new(Self {
            token: Mutex::new(Some(token.to_string())),
            ..Self::default()
        })
    }

    pub fn logged_out() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn expirations(&self) -> usize {
        self.expirations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionManager for MockSession {
    fn is_logged_in(&self) -> bool {
        self.token.lock().unwrap().is_some()
    }

    fn session_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    async fn expire(&self) -> Result<(), SessionError> {
        let mut token = self.token.lock().unwrap();
        if token.take().is_none() {
            return Err(SessionError::NotAuthenticated);
        }
        self.expirations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Recording Scheduler
// ============================================================================

/// Scheduler that records each delay and runs the action right away.
#[derive(Default)]
pub struct RecordingScheduler {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl DelayScheduler for RecordingScheduler {
    fn schedule_after(&self, delay: Duration, action: ScheduledAction) -> ScheduledTask {
        self.delays.lock().unwrap().push(delay);
        action();
        ScheduledTask::completed()
    }
}

/// Scheduler that discards every action without running it.
#[derive(Default)]
pub struct DroppingScheduler {
    scheduled: AtomicUsize,
}

impl DroppingScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scheduled(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }
}

impl DelayScheduler for DroppingScheduler {
    fn schedule_after(&self, _delay: Duration, action: ScheduledAction) -> ScheduledTask {
        self.scheduled.fetch_add(1, Ordering::SeqCst);
        drop(action);
        ScheduledTask::completed()
    }
}
