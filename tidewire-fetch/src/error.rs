//! Host API error types.

use thiserror::Error;

// ============================================================================
// HTTP Error
// ============================================================================

/// Errors building the HTTP executor.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The underlying client could not be built.
    #[error("Client error: {0}")]
    Client(#[from] reqwest::Error),

    /// The pinned certificate could not be read.
    #[error("Certificate error: {0}")]
    Certificate(String),
}

// ============================================================================
// Keychain Error
// ============================================================================

/// Error type for keychain operations.
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Access denied.
    #[error("Access denied to keychain")]
    AccessDenied,

    /// Keychain unavailable.
    #[error("Keychain unavailable: {0}")]
    Unavailable(String),

    /// Platform error.
    #[error("Platform error: {0}")]
    Platform(String),

    /// Generic error.
    #[error("Keychain error: {0}")]
    Other(String),
}

impl From<keyring::Error> for KeychainError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(e) => KeychainError::Platform(e.to_string()),
            keyring::Error::NoStorageAccess(_) => KeychainError::AccessDenied,
            keyring::Error::Ambiguous(_) => {
                KeychainError::Other("Ambiguous credential entry".to_string())
            }
            _ => KeychainError::Other(err.to_string()),
        }
    }
}

impl From<KeychainError> for tidewire_core::SessionError {
    fn from(err: KeychainError) -> Self {
        tidewire_core::SessionError::Storage(err.to_string())
    }
}
