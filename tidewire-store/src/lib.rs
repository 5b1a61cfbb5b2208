// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # tidewire Store
//!
//! Session state management for tidewire.
//!
//! This crate provides:
//!
//! - **SessionStore**: The session state machine with broadcast channels
//! - **TokenVault**: Keychain persistence for the session token
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tidewire_fetch::SystemKeychain;
//! use tidewire_store::SessionStore;
//!
//! let store: Arc<SessionStore<User>> = Arc::new(SessionStore::new(Arc::new(SystemKeychain::new())));
//! store.set_current_user_fetcher(&user_repository);
//!
//! let mut sessions = store.subscribe_session();
//! store.bootstrap().await;
//!
//! while let Ok(logged_in) = sessions.recv().await {
//!     println!("Logged in: {logged_in}");
//! }
//! ```

pub mod session_store;
pub mod token_vault;

pub use session_store::{BootstrapReport, SessionStore};
pub use token_vault::TokenVault;
