// Session store lifecycle against mock collaborators
use newsgate::backend::{Backend, BackendError};
use newsgate::credentials::CredentialStore;
use newsgate::identity::IdentityProvider;
use newsgate::models::auth::{AuthenticationError, Notice};
use newsgate::models::{AuthCheck, Role};
use newsgate::session::SessionStore;
use newsgate::testing::mock::{MockBackend, MockIdentityProvider};
use newsgate::testing::TestFixtures;
use std::sync::Arc;
use std::time::Duration;

fn start(
    provider: &Arc<MockIdentityProvider>,
    backend: &Arc<MockBackend>,
    credentials: CredentialStore,
) -> SessionStore {
    SessionStore::start(
        Arc::clone(provider) as Arc<dyn IdentityProvider>,
        Arc::clone(backend) as Arc<dyn Backend>,
        credentials,
    )
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_identity_events_drive_the_session() {
    let provider = Arc::new(MockIdentityProvider::signed_out());
    let backend = Arc::new(MockBackend::with_user(Role::Admin, false));
    let store = start(&provider, &backend, CredentialStore::in_memory());
    let mut handle = store.handle();

    assert!(handle.resolved().await.is_anonymous());

    provider.emit(Some(TestFixtures::identity()));
    let mut seen = Vec::new();
    while handle.changed().await {
        let session = handle.snapshot();
        seen.push(session.auth_check);
        if session.is_authenticated() {
            assert_eq!(session.role, Role::Admin);
            break;
        }
    }
    assert_eq!(seen.last(), Some(&AuthCheck::Authenticated));

    provider.emit(None);
    wait_until(|| store.snapshot().is_anonymous()).await;
    assert!(store.snapshot().identity.is_none());
}

#[tokio::test]
async fn test_sign_out_discards_in_flight_enrichment() {
    let provider = Arc::new(MockIdentityProvider::signed_in(TestFixtures::identity()));
    let backend = Arc::new(MockBackend::with_user(Role::Admin, true));
    let gate = backend.hold_user_data();
    let store = start(&provider, &backend, CredentialStore::in_memory());

    // Enrichment has started and is blocked on the backend
    wait_until(|| backend.user_data_calls() == 1).await;
    assert!(store.snapshot().is_checking());

    let notice = store.sign_out().await.unwrap();
    assert_eq!(notice, Notice::success("Logged out successfully!"));
    assert!(store.snapshot().is_anonymous());

    // The stale admin record arrives after sign-out and must not resurrect the session
    gate.add_permits(1);
    wait_until(|| backend.user_data_completed() == 1).await;
    tokio::task::yield_now().await;

    let session = store.snapshot();
    assert!(session.is_anonymous());
    assert_ne!(session.role, Role::Admin);
}

#[tokio::test]
async fn test_backend_failure_yields_least_privilege() {
    let provider = Arc::new(MockIdentityProvider::signed_in(TestFixtures::identity()));
    let backend = Arc::new(MockBackend::with_user(Role::Premium, true));
    backend.fail_user_data(BackendError::Status {
        status: 503,
        body: "maintenance".to_string(),
    });
    let store = start(&provider, &backend, CredentialStore::in_memory());

    let session = store.handle().resolved().await;
    assert!(session.is_authenticated());
    assert_eq!(session.identity, Some(TestFixtures::identity()));
    assert_eq!(session.role, Role::Reader);
    assert!(!session.has_premium());
    assert!(!session.enriched);
}

#[tokio::test]
async fn test_refresh_picks_up_new_entitlement() {
    let provider = Arc::new(MockIdentityProvider::signed_in(TestFixtures::identity()));
    let backend = Arc::new(MockBackend::with_user(Role::Reader, false));
    let store = start(&provider, &backend, CredentialStore::in_memory());
    assert!(!store.handle().resolved().await.has_premium());

    backend.set_user(Role::Premium, true);
    let session = store.refresh().await;

    assert!(session.has_premium());
    assert_eq!(session.role, Role::Premium);
    assert_eq!(store.snapshot(), session);
}

#[tokio::test]
async fn test_sign_in_waits_for_the_single_enrichment() {
    let provider = Arc::new(MockIdentityProvider::signed_out());
    let backend = Arc::new(MockBackend::with_user(Role::Admin, false));
    let store = start(&provider, &backend, CredentialStore::in_memory());
    store.handle().resolved().await;

    let gate = backend.hold_user_data();
    let signing_in = tokio::spawn({
        let store = store.clone();
        async move {
            store
                .sign_in(&TestFixtures::password_credentials())
                .await
        }
    });

    wait_until(|| backend.user_data_calls() == 1).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    // Sign-in is still waiting on the listener's fetch rather than starting its own
    assert!(!signing_in.is_finished());
    assert_eq!(backend.user_data_calls(), 1);

    gate.add_permits(1);
    let outcome = signing_in.await.unwrap().unwrap();

    assert!(outcome.session.is_authenticated());
    assert_eq!(outcome.session.role, Role::Admin);
    assert_eq!(backend.user_data_calls(), 1);
    assert_eq!(store.snapshot(), outcome.session);
}

#[tokio::test]
async fn test_sign_in_persists_token_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token");
    let provider = Arc::new(MockIdentityProvider::signed_out());
    let backend = Arc::new(MockBackend::with_user(Role::Reader, false));
    let store = start(&provider, &backend, CredentialStore::file(&token_path));
    store.handle().resolved().await;

    let outcome = store
        .sign_in(&TestFixtures::password_credentials())
        .await
        .unwrap();

    assert!(outcome.session.is_authenticated());
    assert_eq!(
        std::fs::read_to_string(&token_path).unwrap().trim(),
        MockBackend::BACKEND_TOKEN
    );
    assert_eq!(store.bearer().await.unwrap(), MockBackend::BACKEND_TOKEN);

    wait_until(|| !backend.last_login_uids().is_empty()).await;

    store.sign_out().await.unwrap();
    assert!(!token_path.exists());
    assert!(matches!(
        store.bearer().await,
        Err(AuthenticationError::NotSignedIn)
    ));
}

#[tokio::test]
async fn test_register_warns_when_backend_profile_fails() {
    let provider = Arc::new(MockIdentityProvider::signed_out());
    let backend = Arc::new(MockBackend::with_user(Role::Reader, false));
    backend.fail_registration();
    let store = start(&provider, &backend, CredentialStore::in_memory());
    store.handle().resolved().await;

    let outcome = store
        .register(&TestFixtures::password_credentials())
        .await
        .unwrap();

    assert!(outcome.session.is_authenticated());
    assert!(outcome
        .notices
        .contains(&Notice::warning("User saved failed to backend!")));
    assert!(outcome
        .notices
        .contains(&Notice::success("Registration successful!")));
}

#[tokio::test]
async fn test_register_rejection_maps_to_message() {
    let provider = Arc::new(MockIdentityProvider::signed_out());
    provider.reject_with("EMAIL_EXISTS");
    let backend = Arc::new(MockBackend::with_user(Role::Reader, false));
    let store = start(&provider, &backend, CredentialStore::in_memory());
    store.handle().resolved().await;

    let err = store
        .register(&TestFixtures::password_credentials())
        .await
        .unwrap_err();

    assert_eq!(err.registration_message(), "Email already in use.");
    assert!(backend.registered_uids().is_empty());
    assert!(store.snapshot().is_anonymous());
}

#[tokio::test]
async fn test_failed_provider_sign_out_keeps_session() {
    let provider = Arc::new(MockIdentityProvider::signed_in(TestFixtures::identity()));
    provider.fail_sign_out();
    let backend = Arc::new(MockBackend::with_user(Role::Reader, false));
    let store = start(&provider, &backend, CredentialStore::in_memory());
    store.handle().resolved().await;

    let err = store.sign_out().await.unwrap_err();

    assert!(matches!(err, AuthenticationError::ProviderUnavailable(_)));
    assert!(store.snapshot().is_authenticated());
}
