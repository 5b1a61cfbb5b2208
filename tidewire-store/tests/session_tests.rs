//! Session store tests covering bootstrap, persistence failures, and the
//! repository's 401 handling.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tidewire_core::{
    AuthenticableUser, CurrentUserFetcher, HttpRequest, NetworkingConfiguration,
    NetworkingMethod, RawResponse, RepositoryError, ResponseError, SessionError, decode_json,
};
use tidewire_fetch::host::keychain::{accounts, services};
use tidewire_fetch::{HttpExecutor, KeychainApi, KeychainError, MemoryKeychain, Repository};
use tidewire_store::SessionStore;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
struct Member {
    name: String,
    token: Option<String>,
}

impl Member {
    fn new(name: &str, token: &str) -> Self {
        Self {
            name: name.to_string(),
            token: Some(token.to_string()),
        }
    }
}

impl AuthenticableUser for Member {
    fn session_token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

fn seeded_keychain(token: &str) -> Arc<MemoryKeychain> {
    Arc::new(MemoryKeychain::with_entry(
        services::SESSION,
        accounts::CURRENT_TOKEN,
        token,
    ))
}

// ============================================================================
// Doubles
// ============================================================================

struct StaticFetcher {
    result: Result<Member, ()>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    fn ok(member: Member) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(member),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            result: Err(()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CurrentUserFetcher<Member> for StaticFetcher {
    async fn fetch_current_user(&self) -> Result<Member, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .map_err(|()| RepositoryError::NoNetworkConnection)
    }
}

/// Fetcher that blocks until released.
struct GatedFetcher {
    gate: Notify,
    member: Member,
}

#[async_trait]
impl CurrentUserFetcher<Member> for GatedFetcher {
    async fn fetch_current_user(&self) -> Result<Member, RepositoryError> {
        self.gate.notified().await;
        Ok(self.member.clone())
    }
}

/// Keychain whose writes and deletes always fail.
struct LockedKeychain {
    inner: MemoryKeychain,
}

#[async_trait]
impl KeychainApi for LockedKeychain {
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        self.inner.get(service, account).await
    }

    async fn set(&self, _: &str, _: &str, _: &str) -> Result<(), KeychainError> {
        Err(KeychainError::AccessDenied)
    }

    async fn delete(&self, _: &str, _: &str) -> Result<(), KeychainError> {
        Err(KeychainError::AccessDenied)
    }
}

/// Executor that rejects every request with 401.
struct RejectingExecutor;

#[async_trait]
impl HttpExecutor for RejectingExecutor {
    async fn perform(&self, _request: HttpRequest) -> Result<RawResponse, ResponseError> {
        Err(ResponseError::status(401, "Unauthorized", b""))
    }
}

/// Executor that answers every request with the given JSON.
struct JsonExecutor(&'static str);

#[async_trait]
impl HttpExecutor for JsonExecutor {
    async fn perform(&self, request: HttpRequest) -> Result<RawResponse, ResponseError> {
        Ok(RawResponse {
            request,
            status: 200,
            headers: BTreeMap::new(),
            body: self.0.as_bytes().to_vec(),
        })
    }
}

// ============================================================================
// Bootstrap
// ============================================================================

#[tokio::test]
async fn test_bootstrap_fetches_user() {
    let store: Arc<SessionStore<Member>> = Arc::new(SessionStore::new(seeded_keychain("saved")));
    let fetcher = StaticFetcher::ok(Member::new("lin", "saved"));
    store.set_current_user_fetcher(&fetcher);

    let mut sessions = store.subscribe_session();
    let mut users = store.subscribe_user();

    let report = store.bootstrap().await;
    assert!(report.restored);
    assert!(report.user_fetch_started());
    report.wait().await;

    assert!(sessions.recv().await.unwrap());
    assert_eq!(users.recv().await.unwrap().unwrap().name, "lin");
    assert_eq!(store.current_user().unwrap().name, "lin");
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bootstrap_logged_out_skips_fetch() {
    let store: Arc<SessionStore<Member>> = Arc::new(SessionStore::new(Arc::new(MemoryKeychain::new())));
    let fetcher = StaticFetcher::ok(Member::new("lin", "saved"));
    store.set_current_user_fetcher(&fetcher);

    let report = store.bootstrap().await;
    assert!(!report.restored);
    assert!(!report.user_fetch_started());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_bootstrap_fetch_failure_is_published() {
    let store: Arc<SessionStore<Member>> = Arc::new(SessionStore::new(seeded_keychain("saved")));
    let fetcher = StaticFetcher::failing();
    store.set_current_user_fetcher(&fetcher);
    let mut failures = store.subscribe_bootstrap_errors();

    store.bootstrap().await.wait().await;

    let failure = failures.recv().await.unwrap();
    assert!(matches!(*failure, RepositoryError::NoNetworkConnection));
    assert!(store.is_logged_in());
    assert_eq!(store.current_user(), None);
}

#[tokio::test]
async fn test_dropped_fetcher_is_not_called() {
    let store: Arc<SessionStore<Member>> = Arc::new(SessionStore::new(seeded_keychain("saved")));
    let fetcher = StaticFetcher::ok(Member::new("lin", "saved"));
    store.set_current_user_fetcher(&fetcher);
    drop(fetcher);

    let report = store.bootstrap().await;
    assert!(report.restored);
    assert!(!report.user_fetch_started());
}

#[tokio::test]
async fn test_user_fetched_after_logout_is_discarded() {
    let store: Arc<SessionStore<Member>> = Arc::new(SessionStore::new(seeded_keychain("saved")));
    let fetcher = Arc::new(GatedFetcher {
        gate: Notify::new(),
        member: Member::new("lin", "saved"),
    });
    store.set_current_user_fetcher(&fetcher);

    let report = store.bootstrap().await;
    store.logout().await.unwrap();

    fetcher.gate.notify_one();
    report.wait().await;

    assert!(!store.is_logged_in());
    assert_eq!(store.current_user(), None);
}

// ============================================================================
// Persistence failures
// ============================================================================

#[tokio::test]
async fn test_keychain_failure_leaves_state_unchanged() {
    let keychain = Arc::new(LockedKeychain {
        inner: MemoryKeychain::new(),
    });
    let store: SessionStore<Member> = SessionStore::new(keychain);
    let mut sessions = store.subscribe_session();

    let err = store.login(Member::new("lin", "t1")).await.unwrap_err();
    assert!(matches!(err, SessionError::Storage(_)));
    assert!(!store.is_logged_in());
    assert!(sessions.try_recv().is_err());
}

#[tokio::test]
async fn test_logout_failure_keeps_session() {
    let keychain = Arc::new(LockedKeychain {
        inner: MemoryKeychain::with_entry(services::SESSION, accounts::CURRENT_TOKEN, "t1"),
    });
    let store: Arc<SessionStore<Member>> = Arc::new(SessionStore::new(keychain));
    store.bootstrap().await;

    let err = store.logout().await.unwrap_err();
    assert!(matches!(err, SessionError::Storage(_)));
    assert!(store.is_logged_in());
}

// ============================================================================
// Repository integration
// ============================================================================

fn config() -> Arc<NetworkingConfiguration> {
    Arc::new(NetworkingConfiguration::builder("api.example.com").build().unwrap())
}

#[tokio::test]
async fn test_unauthorized_response_expires_store() {
    let keychain = Arc::new(MemoryKeychain::new());
    let store: Arc<SessionStore<Member>> = Arc::new(SessionStore::new(keychain.clone()));
    store.login(Member::new("lin", "revoked")).await.unwrap();

    let mut sessions = store.subscribe_session();
    let mut users = store.subscribe_user();

    let repository = Repository::builder(config(), store.clone())
        .executor(Arc::new(RejectingExecutor))
        .build()
        .unwrap();

    let result: Result<serde_json::Value, _> = repository
        .perform_request(NetworkingMethod::Get, "books", None, decode_json)
        .await;

    assert!(matches!(result, Err(RepositoryError::UnauthenticatedSession)));
    assert!(!store.is_logged_in());
    assert!(!sessions.recv().await.unwrap());
    assert_eq!(users.recv().await.unwrap(), None);
    assert_eq!(
        keychain
            .get(services::SESSION, accounts::CURRENT_TOKEN)
            .await
            .unwrap(),
        None
    );
}

/// Fetcher backed by a repository that itself holds the store.
struct MemberRepository {
    repository: Repository,
}

#[async_trait]
impl CurrentUserFetcher<Member> for MemberRepository {
    async fn fetch_current_user(&self) -> Result<Member, RepositoryError> {
        self.repository
            .perform_request(NetworkingMethod::Get, "me", None, |value| {
                let name: String = tidewire_core::decode_at(value, "name")?;
                Ok(Member {
                    name,
                    token: tidewire_core::decode_at(value, "token")?,
                })
            })
            .await
    }
}

#[tokio::test]
async fn test_repository_backed_fetcher_does_not_leak() {
    let store: Arc<SessionStore<Member>> = Arc::new(SessionStore::new(seeded_keychain("saved")));
    let fetcher = Arc::new(MemberRepository {
        repository: Repository::builder(config(), store.clone())
            .executor(Arc::new(JsonExecutor(r#"{"name": "lin", "token": "saved"}"#)))
            .build()
            .unwrap(),
    });
    store.set_current_user_fetcher(&fetcher);

    store.bootstrap().await.wait().await;
    assert_eq!(store.current_user().unwrap().name, "lin");

    let weak_store = Arc::downgrade(&store);
    drop(fetcher);
    drop(store);
    assert!(weak_store.upgrade().is_none());
}
