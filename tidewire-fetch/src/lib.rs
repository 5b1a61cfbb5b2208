// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # tidewire Fetch
//!
//! The repository engine and the host APIs it runs on.
//!
//! ## Host APIs
//!
//! The [`host`] module provides abstractions for system interactions:
//!
//! - [`host::http`] - HTTP executor over reqwest, with traffic logging
//! - [`host::keychain`] - Secure credential storage (system keychain)
//! - [`host::scheduler`] - Deferred actions for polling retries
//!
//! ## Repository
//!
//! - [`Repository`] - Plain, authentication, polling, and raw requests
//! - [`PollPolicy`] - Interval and optional bound for polling
//! - [`classify_failure`] - Executor failure to repository error
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tidewire_core::{NetworkingConfiguration, NetworkingMethod, decode_json};
//! use tidewire_fetch::Repository;
//!
//! let config = Arc::new(NetworkingConfiguration::builder("api.example.com").build()?);
//! let repository = Repository::builder(config, session).build()?;
//!
//! let books: Vec<Book> = repository
//!     .perform_request(NetworkingMethod::Get, "books", None, decode_json)
//!     .await?;
//! ```

// Core modules
pub mod classify;
pub mod error;
pub mod host;
pub mod polling;
pub mod repository;

// Re-export key types at crate root

// Errors
pub use error::{HttpError, KeychainError};

// Host APIs
pub use host::{
    http::{HttpExecutor, ReqwestExecutor, TrafficLog},
    keychain::{KeychainApi, MemoryKeychain, SystemKeychain},
    scheduler::{DelayScheduler, ScheduledAction, ScheduledTask, TokioScheduler},
};

// Repository
pub use classify::classify_failure;
pub use polling::{PROCESSING_STATUS, PollPolicy};
pub use repository::{DecodeErrorHook, Repository, RepositoryBuilder};
