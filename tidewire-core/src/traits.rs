//! Trait definitions for `tidewire` collaborators.
//!
//! The repository talks to the session only through [`SessionManager`], so
//! the session store can live in a crate that depends on the fetch layer
//! without a dependency cycle.

use async_trait::async_trait;

use crate::error::{RepositoryError, SessionError};

/// A user value that can carry a session token.
pub trait AuthenticableUser: Send + Sync {
    /// The token identifying this user's session, if any.
    fn session_token(&self) -> Option<&str>;
}

/// Session state as seen by a repository.
///
/// Reads must be cheap and callable from any thread. `expire` is only
/// invoked by the repository when the server rejects a session.
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Returns true if a session token is present.
    fn is_logged_in(&self) -> bool;

    /// Returns the current session token.
    fn session_token(&self) -> Option<String>;

    /// Ends the session because the server rejected its token.
    async fn expire(&self) -> Result<(), SessionError>;
}

/// Fetches the full user object for a restored session.
#[async_trait]
pub trait CurrentUserFetcher<U>: Send + Sync {
    /// Fetches the user the current session belongs to.
    async fn fetch_current_user(&self) -> Result<U, RepositoryError>;
}
