//! Host APIs used by the repository engine.
//!
//! - [`http`] - HTTP executor with tracing and certificate pinning
//! - [`keychain`] - Secure credential storage (system keychain)
//! - [`scheduler`] - Deferred actions for polling retries

pub mod http;
pub mod keychain;
pub mod scheduler;

// Re-export key types
pub use http::{HttpExecutor, ReqwestExecutor, TrafficLog};
pub use keychain::{KeychainApi, MemoryKeychain, SystemKeychain};
pub use scheduler::{DelayScheduler, ScheduledAction, ScheduledTask, TokioScheduler};
