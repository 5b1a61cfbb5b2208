//! Persistence of the session token.
//!
//! The token is the only durable piece of session state. It lives in the
//! keychain under one well-known entry; the user object is never stored.

use std::sync::Arc;

use tidewire_core::SessionError;
use tidewire_fetch::KeychainApi;
use tidewire_fetch::host::keychain::{accounts, services};
use tracing::debug;

/// Reads and writes the persisted session token.
#[derive(Clone)]
pub struct TokenVault {
    keychain: Arc<dyn KeychainApi>,
}

impl std::fmt::Debug for TokenVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVault")
            .field("service", &services::SESSION)
            .field("account", &accounts::CURRENT_TOKEN)
            .finish_non_exhaustive()
    }
}

impl TokenVault {
    /// Creates a vault over the given keychain.
    pub fn new(keychain: Arc<dyn KeychainApi>) -> Self {
        Self { keychain }
    }

    /// Loads the persisted token, if any.
    pub async fn load(&self) -> Result<Option<String>, SessionError> {
        let token = self
            .keychain
            .get(services::SESSION, accounts::CURRENT_TOKEN)
            .await?;
        debug!(found = token.is_some(), "Loaded persisted session token");
        Ok(token)
    }

    /// Persists a token, replacing any previous one.
    pub async fn save(&self, token: &str) -> Result<(), SessionError> {
        self.keychain
            .set(services::SESSION, accounts::CURRENT_TOKEN, token)
            .await?;
        debug!("Persisted session token");
        Ok(())
    }

    /// Removes the persisted token. Removing a missing token succeeds.
    pub async fn clear(&self) -> Result<(), SessionError> {
        self.keychain
            .delete(services::SESSION, accounts::CURRENT_TOKEN)
            .await?;
        debug!("Cleared persisted session token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewire_fetch::MemoryKeychain;

    #[tokio::test]
    async fn test_vault_roundtrip() {
        let keychain = Arc::new(MemoryKeychain::new());
        let vault = TokenVault::new(keychain.clone());

        assert_eq!(vault.load().await.unwrap(), None);

        vault.save("abc").await.unwrap();
        assert_eq!(vault.load().await.unwrap().as_deref(), Some("abc"));
        assert!(keychain.exists(services::SESSION, accounts::CURRENT_TOKEN).await);

        vault.clear().await.unwrap();
        assert_eq!(vault.load().await.unwrap(), None);
        vault.clear().await.unwrap();
    }
}
