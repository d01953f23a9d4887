use async_trait::async_trait;
use campaign_portal::{
    auth::Claims,
    error::AppError,
    models::{
        Campaign, CreateCampaignRequest, DashboardStats, Location, NewLocation, Role, SiteSettings,
        UpdateCampaignRequest, UpdateSettingsRequest, User,
    },
    provider::{AuthProviderState, MockAuthProvider, ProviderIdentity},
    repository::{CampaignScope, Repository},
    session::{AuthStatus, LoginOutcome, SessionStore},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

const TEST_SECRET: &str = "session-test-secret";

// --- Mock Repository for Session Logic ---

// Serves one user document and records verification-flag syncs.
#[derive(Default)]
struct SessionRepo {
    user: Mutex<Option<User>>,
    verified_calls: Mutex<Vec<(Uuid, bool)>>,
}

impl SessionRepo {
    fn with_user(user: User) -> Self {
        Self {
            user: Mutex::new(Some(user)),
            verified_calls: Mutex::new(vec![]),
        }
    }

    fn verified_calls(&self) -> Vec<(Uuid, bool)> {
        self.verified_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Repository for SessionRepo {
    async fn get_user(&self, _id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.user.lock().unwrap().clone())
    }
    async fn set_email_verified(&self, id: Uuid, verified: bool) -> Result<(), AppError> {
        self.verified_calls.lock().unwrap().push((id, verified));
        if let Some(user) = self.user.lock().unwrap().as_mut() {
            if user.id == id {
                user.email_verified = verified;
            }
        }
        Ok(())
    }

    // Unused parts of the contract.
    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(vec![])
    }
    async fn get_user_by_email(&self, _email: &str) -> Result<Option<User>, AppError> {
        Ok(None)
    }
    async fn create_user(&self, user: User) -> Result<User, AppError> {
        Ok(user)
    }
    async fn update_user_name(&self, _id: Uuid, _name: &str) -> Result<Option<User>, AppError> {
        Ok(None)
    }
    async fn delete_user(&self, _id: Uuid) -> Result<bool, AppError> {
        Ok(false)
    }
    async fn list_campaigns(&self, _scope: CampaignScope) -> Result<Vec<Campaign>, AppError> {
        Ok(vec![])
    }
    async fn get_campaign(&self, _id: Uuid) -> Result<Option<Campaign>, AppError> {
        Ok(None)
    }
    async fn create_campaign(&self, _req: CreateCampaignRequest) -> Result<Campaign, AppError> {
        Ok(Campaign::default())
    }
    async fn update_campaign(
        &self,
        _id: Uuid,
        _patch: UpdateCampaignRequest,
    ) -> Result<Option<Campaign>, AppError> {
        Ok(None)
    }
    async fn delete_campaign(&self, _id: Uuid) -> Result<bool, AppError> {
        Ok(false)
    }
    async fn list_locations(&self, _campaign_id: Uuid) -> Result<Vec<Location>, AppError> {
        Ok(vec![])
    }
    async fn add_location(
        &self,
        _campaign_id: Uuid,
        _location: NewLocation,
    ) -> Result<Location, AppError> {
        Ok(Location::default())
    }
    async fn get_settings(&self) -> Result<Option<SiteSettings>, AppError> {
        Ok(None)
    }
    async fn upsert_settings(
        &self,
        _patch: UpdateSettingsRequest,
    ) -> Result<SiteSettings, AppError> {
        Ok(SiteSettings::default())
    }
    async fn get_stats(&self) -> Result<DashboardStats, AppError> {
        Ok(DashboardStats::default())
    }
}

// --- Test Utilities ---

fn user_doc(id: Uuid, role: Role) -> User {
    User {
        id,
        email: "person@example.com".to_string(),
        name: "Person".to_string(),
        role,
        email_verified: false,
    }
}

/// Polls the store until the predicate holds or the timeout elapses.
async fn wait_for<F>(store: &SessionStore, predicate: F)
where
    F: Fn(&campaign_portal::session::SessionState) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if predicate(&store.state().await) {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("session state did not converge in time");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// --- Login Flow ---

#[tokio::test]
async fn test_login_success_authenticates_and_mints_token() {
    let (provider, id) = MockAuthProvider::new().with_account("person@example.com", "pw", true);
    let provider = Arc::new(provider);
    let repo = Arc::new(SessionRepo::with_user(user_doc(id, Role::Admin)));
    let store = SessionStore::new(
        provider.clone() as AuthProviderState,
        repo.clone(),
        TEST_SECRET,
    );

    let outcome = store.login("person@example.com", "pw").await;

    let token = match outcome {
        LoginOutcome::Success { token } => token,
        other => panic!("expected success, got {:?}", other),
    };

    // The token decodes with our secret and names the identity.
    let data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(TEST_SECRET.as_bytes()),
        &Validation::default(),
    )
    .expect("token should validate");
    assert_eq!(data.claims.sub, id);

    // The provider's verification flag was synced into the User document.
    assert_eq!(repo.verified_calls(), vec![(id, true)]);

    let state = store.state().await;
    assert_eq!(state.status, AuthStatus::Authenticated);
    assert_eq!(state.role, Some(Role::Admin));
    assert!(state.identity.is_some());
}

#[tokio::test]
async fn test_login_unverified_signs_out_and_assigns_no_role() {
    let (provider, id) = MockAuthProvider::new().with_account("person@example.com", "pw", false);
    let provider = Arc::new(provider);
    let repo = Arc::new(SessionRepo::with_user(user_doc(id, Role::Admin)));
    let store = SessionStore::new(
        provider.clone() as AuthProviderState,
        repo.clone(),
        TEST_SECRET,
    );

    let outcome = store.login("person@example.com", "pw").await;
    assert_eq!(outcome, LoginOutcome::EmailNotVerified);

    // Immediately signed back out at the provider.
    assert_eq!(provider.sign_out_count(), 1);
    // No verification sync, no role, no session.
    assert!(repo.verified_calls().is_empty());

    // The ambient listener may still be draining the sign-in/sign-out pair,
    // so assert the settled state.
    wait_for(&store, |s| s.identity.is_none() && s.role.is_none()).await;
    assert_eq!(store.state().await.status, AuthStatus::Idle);
}

#[tokio::test]
async fn test_login_provider_failure_collapses_to_generic_error() {
    let provider = Arc::new(MockAuthProvider::new_failing());
    let repo = Arc::new(SessionRepo::default());
    let store = SessionStore::new(provider as AuthProviderState, repo, TEST_SECRET);

    let outcome = store.login("person@example.com", "pw").await;
    assert_eq!(outcome, LoginOutcome::Error);
    assert_eq!(store.state().await.status, AuthStatus::Error);
}

#[tokio::test]
async fn test_login_wrong_password_is_an_error_outcome() {
    let (provider, id) = MockAuthProvider::new().with_account("person@example.com", "pw", true);
    let provider = Arc::new(provider);
    let repo = Arc::new(SessionRepo::with_user(user_doc(id, Role::User)));
    let store = SessionStore::new(provider as AuthProviderState, repo, TEST_SECRET);

    let outcome = store.login("person@example.com", "wrong").await;
    assert_eq!(outcome, LoginOutcome::Error);
}

#[tokio::test]
async fn test_login_without_user_document_defaults_role_to_user() {
    let (provider, _id) = MockAuthProvider::new().with_account("person@example.com", "pw", true);
    let provider = Arc::new(provider);
    // Repository has no matching User document at all.
    let repo = Arc::new(SessionRepo::default());
    let store = SessionStore::new(provider as AuthProviderState, repo, TEST_SECRET);

    let outcome = store.login("person@example.com", "pw").await;
    assert!(matches!(outcome, LoginOutcome::Success { .. }));
    assert_eq!(store.state().await.role, Some(Role::User));
}

// --- Logout / Resend ---

#[tokio::test]
async fn test_logout_clears_identity_and_role() {
    let (provider, id) = MockAuthProvider::new().with_account("person@example.com", "pw", true);
    let provider = Arc::new(provider);
    let repo = Arc::new(SessionRepo::with_user(user_doc(id, Role::User)));
    let store = SessionStore::new(
        provider.clone() as AuthProviderState,
        repo,
        TEST_SECRET,
    );

    store.login("person@example.com", "pw").await;
    store.logout().await;

    wait_for(&store, |s| s.identity.is_none() && s.role.is_none()).await;
    assert_eq!(store.state().await.status, AuthStatus::Idle);
    assert!(provider.sign_out_count() >= 1);
}

#[tokio::test]
async fn test_resend_verification_marks_status() {
    let provider = Arc::new(MockAuthProvider::new());
    let repo = Arc::new(SessionRepo::default());
    let store = SessionStore::new(
        provider.clone() as AuthProviderState,
        repo,
        TEST_SECRET,
    );

    store
        .resend_verification_email("person@example.com")
        .await
        .expect("resend should succeed");

    assert_eq!(provider.resend_count(), 1);
    assert_eq!(store.state().await.status, AuthStatus::VerificationEmailSent);
}

// --- Ambient Listener ---

#[tokio::test]
async fn test_listener_resolves_role_for_verified_identity() {
    let id = Uuid::new_v4();
    let provider = Arc::new(MockAuthProvider::new());
    let repo = Arc::new(SessionRepo::with_user(User {
        email_verified: true,
        ..user_doc(id, Role::Admin)
    }));
    let store = SessionStore::new(
        provider.clone() as AuthProviderState,
        repo,
        TEST_SECRET,
    );

    provider.emit_auth_state(Some(ProviderIdentity {
        id,
        email: "person@example.com".to_string(),
        email_verified: true,
    }));

    wait_for(&store, |s| s.role == Some(Role::Admin)).await;
}

#[tokio::test]
async fn test_listener_clears_role_for_unverified_identity() {
    let id = Uuid::new_v4();
    let provider = Arc::new(MockAuthProvider::new());
    let repo = Arc::new(SessionRepo::with_user(user_doc(id, Role::Admin)));
    let store = SessionStore::new(
        provider.clone() as AuthProviderState,
        repo,
        TEST_SECRET,
    );

    // Verified identity first, so a role is present...
    provider.emit_auth_state(Some(ProviderIdentity {
        id,
        email: "person@example.com".to_string(),
        email_verified: true,
    }));
    wait_for(&store, |s| s.role.is_some()).await;

    // ...then an unverified change must clear it again.
    provider.emit_auth_state(Some(ProviderIdentity {
        id,
        email: "person@example.com".to_string(),
        email_verified: false,
    }));
    wait_for(&store, |s| s.role.is_none()).await;
}

#[tokio::test]
async fn test_listener_clears_identity_on_sign_out() {
    let id = Uuid::new_v4();
    let provider = Arc::new(MockAuthProvider::new());
    let repo = Arc::new(SessionRepo::with_user(user_doc(id, Role::User)));
    let store = SessionStore::new(
        provider.clone() as AuthProviderState,
        repo,
        TEST_SECRET,
    );

    provider.emit_auth_state(Some(ProviderIdentity {
        id,
        email: "person@example.com".to_string(),
        email_verified: true,
    }));
    wait_for(&store, |s| s.identity.is_some()).await;

    provider.emit_auth_state(None);
    wait_for(&store, |s| s.identity.is_none() && s.role.is_none()).await;
}

#[tokio::test]
async fn test_shutdown_stops_the_listener() {
    let id = Uuid::new_v4();
    let provider = Arc::new(MockAuthProvider::new());
    let repo = Arc::new(SessionRepo::with_user(User {
        email_verified: true,
        ..user_doc(id, Role::Admin)
    }));
    let store = SessionStore::new(
        provider.clone() as AuthProviderState,
        repo,
        TEST_SECRET,
    );

    store.shutdown();

    // Emissions after teardown no longer reach the store.
    provider.emit_auth_state(Some(ProviderIdentity {
        id,
        email: "person@example.com".to_string(),
        email_verified: true,
    }));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let state = store.state().await;
    assert!(state.identity.is_none());
    assert_eq!(state.role, None);
}
