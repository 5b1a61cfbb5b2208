// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `tidewire` Core
//!
//! Core types, errors, and collaborator traits shared by every `tidewire`
//! crate.
//!
//! This crate has no I/O of its own. It defines:
//!
//! - The immutable [`NetworkingConfiguration`] and the base URL it derives
//! - The repository error taxonomy ([`RepositoryError`], [`ResponseError`])
//! - Decoding primitives ([`Decoder`], [`decode_json`], [`RawValueEnum`])
//! - The opt-in custom error mapping ([`CustomErrorMap`])
//! - Traits implemented by collaborators ([`SessionManager`],
//!   [`AuthenticableUser`], [`CurrentUserFetcher`])
//!
//! ## Key Types
//!
//! ### Configuration
//! - [`NetworkingConfiguration`] - Scheme, host, port, path prefix, timeouts
//! - [`NetworkingConfigurationBuilder`] - Builder (also the on-disk format)
//!
//! ### Wire
//! - [`NetworkingMethod`] - HTTP verbs
//! - [`HttpRequest`] / [`RawResponse`] - What the executor receives and returns
//!
//! ### Errors
//! - [`RepositoryError`] - What every repository call can fail with
//! - [`ResponseError`] / [`FailureKind`] - Raw transport failure
//! - [`DecodeError`] - A decoder rejected a well-formed JSON value
//! - [`SessionError`] / [`ConfigError`]

pub mod config;
pub mod custom;
pub mod decode;
pub mod error;
pub mod models;
pub mod traits;

// Configuration
pub use config::{NetworkingConfiguration, NetworkingConfigurationBuilder};

// Errors
pub use error::{ConfigError, DecodeError, FailureKind, RepositoryError, ResponseError, SessionError};

// Custom error mapping
pub use custom::{CustomErrorMap, CustomRepositoryError, ErrorMatcher, ResultExt};

// Decoding
pub use decode::{
    Decoder, RawValueEnum, decode_at, decode_json, decode_path, decode_raw_value, parse_body,
};

// Models
pub use models::{AUTHORIZATION_HEADER, HttpRequest, NetworkingMethod, RawResponse};

// Traits
pub use traits::{AuthenticableUser, CurrentUserFetcher, SessionManager};
