use jsonwebtoken::{EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    auth::Claims,
    error::{self, AppError},
    models::Role,
    provider::{AuthProviderState, ProviderIdentity},
    repository::RepositoryState,
};

/// Lifetime of a minted session token.
const TOKEN_TTL_SECS: u64 = 60 * 60 * 24;

/// AuthStatus
///
/// The session status machine. `Authenticated` is only ever reached through
/// a verified identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum AuthStatus {
    #[default]
    Idle,
    Loading,
    Authenticated,
    Error,
    VerificationEmailSent,
}

/// SessionState
///
/// Transient, never persisted: the current identity, its resolved role, and
/// the status machine. Reconstructed from the provider's ambient auth state
/// for the lifetime of the running service.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub identity: Option<ProviderIdentity>,
    pub role: Option<Role>,
    pub status: AuthStatus,
}

/// LoginStatus
///
/// Wire form of the login outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum LoginStatus {
    Success,
    EmailNotVerified,
    Error,
}

/// LoginResponse
///
/// Output schema of POST /auth/login. The token is present only on success;
/// the message is always one of the fixed user-facing strings.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub status: LoginStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// LoginOutcome
///
/// Internal result of a login attempt, before it is shaped for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success { token: String },
    EmailNotVerified,
    Error,
}

impl LoginOutcome {
    pub fn into_response(self) -> LoginResponse {
        match self {
            LoginOutcome::Success { token } => LoginResponse {
                status: LoginStatus::Success,
                token: Some(token),
                message: None,
            },
            LoginOutcome::EmailNotVerified => LoginResponse {
                status: LoginStatus::EmailNotVerified,
                token: None,
                message: None,
            },
            LoginOutcome::Error => LoginResponse {
                status: LoginStatus::Error,
                token: None,
                message: Some(error::LOGIN_FAILED.to_string()),
            },
        }
    }
}

/// SessionStore
///
/// The explicitly constructed, dependency-injected session service. Holds the
/// current authenticated identity, its verification state, and its resolved
/// role; exposes login/logout/resend operations.
///
/// The ambient listener is spawned exactly once in `new` and consumes the
/// provider's auth-state channel: a present-and-verified identity loads the
/// corresponding User document and resolves the role (default `user` when the
/// field is missing); anything else clears the role. `shutdown` tears the
/// listener down.
pub struct SessionStore {
    provider: AuthProviderState,
    repo: RepositoryState,
    jwt_secret: String,
    state: Arc<RwLock<SessionState>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(provider: AuthProviderState, repo: RepositoryState, jwt_secret: &str) -> Self {
        let state = Arc::new(RwLock::new(SessionState::default()));
        let listener = Self::spawn_listener(provider.clone(), repo.clone(), state.clone());
        Self {
            provider,
            repo,
            jwt_secret: jwt_secret.to_string(),
            state,
            listener: Mutex::new(Some(listener)),
        }
    }

    /// The single ambient subscription for this store's lifetime.
    fn spawn_listener(
        provider: AuthProviderState,
        repo: RepositoryState,
        state: Arc<RwLock<SessionState>>,
    ) -> JoinHandle<()> {
        let mut rx = provider.auth_state();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let identity = rx.borrow_and_update().clone();
                match identity {
                    Some(identity) if identity.email_verified => {
                        // Verified identity: resolve the role from the User
                        // document, defaulting to an ordinary user.
                        let role = match repo.get_user(identity.id).await {
                            Ok(user) => user.map(|u| u.role).unwrap_or_default(),
                            Err(e) => {
                                tracing::error!(error = %e, "role resolution failed");
                                Role::User
                            }
                        };
                        let mut guard = state.write().await;
                        guard.identity = Some(identity);
                        guard.role = Some(role);
                    }
                    other => {
                        // Absent or unverified identity never holds a role.
                        let mut guard = state.write().await;
                        guard.identity = other;
                        guard.role = None;
                    }
                }
            }
        })
    }

    /// Current session state snapshot.
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// login
    ///
    /// Authenticates against the identity provider. An unverified identity is
    /// immediately signed back out and reported as `EmailNotVerified` without
    /// populating role or session state. On success the provider's
    /// verification flag is synced into the User document, a session token is
    /// minted, and the status becomes `Authenticated`. Provider failures are
    /// logged and collapsed into the generic `Error` outcome.
    pub async fn login(&self, email: &str, password: &str) -> LoginOutcome {
        {
            let mut guard = self.state.write().await;
            guard.status = AuthStatus::Loading;
        }

        let identity = match self.provider.sign_in(email, password).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::error!(error = %e, "login failed");
                let mut guard = self.state.write().await;
                *guard = SessionState {
                    status: AuthStatus::Error,
                    ..SessionState::default()
                };
                return LoginOutcome::Error;
            }
        };

        if !identity.email_verified {
            if let Err(e) = self.provider.sign_out().await {
                tracing::warn!(error = %e, "sign-out after unverified login failed");
            }
            let mut guard = self.state.write().await;
            *guard = SessionState::default();
            return LoginOutcome::EmailNotVerified;
        }

        // Sync the provider's verification flag into the User document.
        if let Err(e) = self.repo.set_email_verified(identity.id, true).await {
            tracing::error!(error = %e, "verification flag sync failed");
            let mut guard = self.state.write().await;
            *guard = SessionState {
                status: AuthStatus::Error,
                ..SessionState::default()
            };
            return LoginOutcome::Error;
        }

        let role = match self.repo.get_user(identity.id).await {
            Ok(user) => user.map(|u| u.role).unwrap_or_default(),
            Err(e) => {
                tracing::error!(error = %e, "role resolution failed during login");
                Role::User
            }
        };

        let token = match self.mint_token(&identity) {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(error = %e, "token minting failed");
                let mut guard = self.state.write().await;
                guard.status = AuthStatus::Error;
                return LoginOutcome::Error;
            }
        };

        let mut guard = self.state.write().await;
        *guard = SessionState {
            identity: Some(identity),
            role: Some(role),
            status: AuthStatus::Authenticated,
        };
        LoginOutcome::Success { token }
    }

    /// logout
    ///
    /// Clears identity and role and resets the status to idle. A provider
    /// failure is logged with the fixed message and does not keep the local
    /// session alive.
    pub async fn logout(&self) {
        if let Err(e) = self.provider.sign_out().await {
            tracing::error!(error = %e, "{}", error::LOGOUT_FAILED);
        }
        let mut guard = self.state.write().await;
        *guard = SessionState::default();
    }

    /// resend_verification_email
    ///
    /// Follow-up to an `EmailNotVerified` login: triggers a provider-side
    /// resend for the address and marks the session accordingly.
    pub async fn resend_verification_email(&self, email: &str) -> Result<(), AppError> {
        self.provider.send_verification_email(email).await?;
        let mut guard = self.state.write().await;
        guard.status = AuthStatus::VerificationEmailSent;
        Ok(())
    }

    fn mint_token(&self, identity: &ProviderIdentity) -> Result<String, jsonwebtoken::errors::Error> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before unix epoch")
            .as_secs();
        let claims = Claims {
            sub: identity.id,
            iat: now as usize,
            exp: (now + TOKEN_TTL_SECS) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
    }

    /// shutdown
    ///
    /// Tears down the ambient listener. Safe to call more than once.
    pub fn shutdown(&self) {
        if let Some(handle) = self.listener.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
