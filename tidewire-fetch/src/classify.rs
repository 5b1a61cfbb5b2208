//! Maps executor failures onto the repository error taxonomy.

use tidewire_core::{RepositoryError, ResponseError, SessionManager};
use tracing::{debug, info, warn};

/// Classifies a failed exchange.
///
/// - Connectivity failures become [`RepositoryError::NoNetworkConnection`].
/// - A 401 expires the active session, if any, and becomes
///   [`RepositoryError::UnauthenticatedSession`].
/// - Everything else becomes [`RepositoryError::Request`].
pub async fn classify_failure(error: ResponseError, session: &dyn SessionManager) -> RepositoryError {
    if error.is_no_network() {
        warn!(message = %error.message, "No network connection");
        return RepositoryError::NoNetworkConnection;
    }

    if error.is_unauthorized() {
        if session.is_logged_in() {
            match session.expire().await {
                Ok(()) => info!("Session rejected by server, expired"),
                // Another request expired it first
                Err(e) => debug!(error = %e, "Session already gone"),
            }
        }
        return RepositoryError::UnauthenticatedSession;
    }

    debug!(kind = %error.kind, status = ?error.status, "Request failed");
    RepositoryError::Request(error)
}
