//! CLI command implementations.

pub mod config;
pub mod request;
pub mod session;
