//! Secure credential storage using the system keychain.
//!
//! This module provides access to the system's secure credential storage:
//! - macOS: Keychain Services
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KDE Wallet)
//!
//! [`MemoryKeychain`] keeps secrets in process memory instead, for tests and
//! throwaway sessions.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use keyring::Entry;
use tracing::{debug, warn};

use crate::error::KeychainError;

/// Service name prefix for `tidewire` credentials.
const SERVICE_PREFIX: &str = "tidewire";

// ============================================================================
// Keychain API Trait
// ============================================================================

/// API for secure credential storage.
#[async_trait]
pub trait KeychainApi: Send + Sync {
    /// Get a credential from the keychain.
    ///
    /// # Returns
    /// * `Ok(Some(secret))` - Credential found
    /// * `Ok(None)` - Credential not found
    /// * `Err(e)` - Error accessing keychain
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError>;

    /// Set a credential in the keychain, replacing any previous value.
    async fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), KeychainError>;

    /// Delete a credential from the keychain. Deleting a missing entry
    /// succeeds.
    async fn delete(&self, service: &str, account: &str) -> Result<(), KeychainError>;

    /// Check if a credential exists.
    async fn exists(&self, service: &str, account: &str) -> bool {
        matches!(self.get(service, account).await, Ok(Some(_)))
    }
}

// ============================================================================
// System Keychain Implementation
// ============================================================================

/// Default implementation using the system keychain via the `keyring` crate.
#[derive(Debug, Clone, Default)]
pub struct SystemKeychain;

impl SystemKeychain {
    /// Creates a new system keychain instance.
    pub fn new() -> Self {
        Self
    }

    /// Builds the full service name with prefix.
    fn full_service(service: &str) -> String {
        format!("{SERVICE_PREFIX}:{service}")
    }

    /// Creates a keyring entry.
    fn entry(service: &str, account: &str) -> Result<Entry, KeychainError> {
        let full_service = Self::full_service(service);
        Entry::new(&full_service, account).map_err(|e| KeychainError::Platform(e.to_string()))
    }
}

#[async_trait]
impl KeychainApi for SystemKeychain {
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        debug!(service = %service, account = %account, "Getting credential from keychain");

        let entry = Self::entry(service, account)?;

        match entry.get_password() {
            Ok(secret) if !secret.is_empty() => Ok(Some(secret)),
            Ok(_) | Err(keyring::Error::NoEntry) => {
                debug!(service = %service, account = %account, "Credential not found");
                Ok(None)
            }
            Err(e) => {
                warn!(service = %service, account = %account, error = %e, "Failed to get credential");
                Err(e.into())
            }
        }
    }

    async fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), KeychainError> {
        debug!(service = %service, account = %account, "Setting credential in keychain");

        let entry = Self::entry(service, account)?;

        entry.set_password(secret).map_err(|e| {
            warn!(service = %service, account = %account, error = %e, "Failed to set credential");
            KeychainError::from(e)
        })
    }

    async fn delete(&self, service: &str, account: &str) -> Result<(), KeychainError> {
        debug!(service = %service, account = %account, "Deleting credential from keychain");

        let entry = Self::entry(service, account)?;

        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                warn!(service = %service, account = %account, error = %e, "Failed to delete credential");
                Err(e.into())
            }
        }
    }
}

// ============================================================================
// In-Memory Keychain
// ============================================================================

/// Keychain that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryKeychain {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryKeychain {
    /// Creates an empty in-memory keychain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a keychain pre-seeded with one credential.
    pub fn with_entry(service: &str, account: &str, secret: &str) -> Self {
        let keychain = Self::new();
        keychain.insert(service, account, secret);
        keychain
    }

    fn insert(&self, service: &str, account: &str, secret: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((service.to_string(), account.to_string()), secret.to_string());
    }
}

#[async_trait]
impl KeychainApi for MemoryKeychain {
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&(service.to_string(), account.to_string())).cloned())
    }

    async fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), KeychainError> {
        self.insert(service, account, secret);
        Ok(())
    }

    async fn delete(&self, service: &str, account: &str) -> Result<(), KeychainError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(service.to_string(), account.to_string()));
        Ok(())
    }
}

// ============================================================================
// Well-Known Credential Keys
// ============================================================================

/// Service names.
pub mod services {
    /// Session credentials.
    pub const SESSION: &str = "session";
}

/// Account names.
pub mod accounts {
    /// The persisted session token.
    pub const CURRENT_TOKEN: &str = "current_token";
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_service_name() {
        assert_eq!(SystemKeychain::full_service("session"), "tidewire:session");
    }

    #[tokio::test]
    async fn test_memory_keychain_roundtrip() {
        let keychain = MemoryKeychain::new();
        assert_eq!(keychain.get(services::SESSION, accounts::CURRENT_TOKEN).await.unwrap(), None);

        keychain.set(services::SESSION, accounts::CURRENT_TOKEN, "abc").await.unwrap();
        assert!(keychain.exists(services::SESSION, accounts::CURRENT_TOKEN).await);

        keychain.delete(services::SESSION, accounts::CURRENT_TOKEN).await.unwrap();
        assert!(!keychain.exists(services::SESSION, accounts::CURRENT_TOKEN).await);

        // Deleting twice is fine
        keychain.delete(services::SESSION, accounts::CURRENT_TOKEN).await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_keychain_seeded() {
        let keychain = MemoryKeychain::with_entry("session", "current_token", "seed");
        assert_eq!(
            keychain.get("session", "current_token").await.unwrap().as_deref(),
            Some("seed")
        );
    }

    // Note: SystemKeychain operations require platform access and are not
    // exercised in unit tests.
}
