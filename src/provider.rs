use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::AppError;

/// ProviderIdentity
///
/// The identity record the hosted auth service resolves for a set of
/// credentials. The id doubles as the primary key of the mirrored User
/// document in our own store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    pub id: Uuid,
    pub email: String,
    pub email_verified: bool,
}

/// AuthProvider
///
/// Abstract contract for the hosted identity provider: email/password
/// sign-in and sign-up, verification email resend, sign-out, and the ambient
/// auth-state change channel. The trait keeps the real HTTP client
/// (HostedAuthClient) swappable for the in-memory mock in tests.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderIdentity, AppError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<ProviderIdentity, AppError>;

    /// Invalidates the provider-side session and clears the ambient state.
    async fn sign_out(&self) -> Result<(), AppError>;

    /// Triggers a provider-side resend of the verification email.
    async fn send_verification_email(&self, email: &str) -> Result<(), AppError>;

    /// Subscribes to the provider's auth-state change notifications. The
    /// channel carries the current identity (or None after sign-out).
    fn auth_state(&self) -> watch::Receiver<Option<ProviderIdentity>>;
}

/// AuthProviderState
///
/// The concrete type used to share the provider across the application state.
pub type AuthProviderState = Arc<dyn AuthProvider>;

// --- Wire payloads of the hosted provider ---

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: Uuid,
    email: String,
    // Set once the verification link has been applied.
    email_confirmed_at: Option<String>,
}

impl ProviderUser {
    fn into_identity(self) -> ProviderIdentity {
        ProviderIdentity {
            id: self.id,
            email: self.email,
            email_verified: self.email_confirmed_at.is_some(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    user: ProviderUser,
}

/// HostedAuthClient
///
/// HTTP client for the hosted identity provider. Every request carries the
/// project API key; credentials travel in the JSON body and are never logged.
pub struct HostedAuthClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    state_tx: watch::Sender<Option<ProviderIdentity>>,
}

impl HostedAuthClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let (state_tx, _) = watch::channel(None);
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            state_tx,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl AuthProvider for HostedAuthClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderIdentity, AppError> {
        let response = self
            .http
            .post(self.endpoint("/auth/v1/token?grant_type=password"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "sign-in rejected with status {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;

        let identity = token.user.into_identity();
        // Ambient auth-state notification.
        let _ = self.state_tx.send(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<ProviderIdentity, AppError> {
        let response = self
            .http
            .post(self.endpoint("/auth/v1/signup"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            // Duplicate email, weak password, etc.
            return Err(AppError::Provider(format!(
                "sign-up rejected with status {}",
                response.status()
            )));
        }

        let user: ProviderUser = response
            .json()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;

        // The provider sends the initial verification email itself; the new
        // identity is not signed in until that link is applied.
        Ok(user.into_identity())
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        let result = self
            .http
            .post(self.endpoint("/auth/v1/logout"))
            .header("apikey", &self.api_key)
            .send()
            .await;

        // The ambient state clears regardless of what the network said.
        let _ = self.state_tx.send(None);

        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(AppError::Provider(e.to_string())),
        }
    }

    async fn send_verification_email(&self, email: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(self.endpoint("/auth/v1/resend"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "type": "signup", "email": email }))
            .send()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "resend rejected with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn auth_state(&self) -> watch::Receiver<Option<ProviderIdentity>> {
        self.state_tx.subscribe()
    }
}

// --- The Mock Implementation (For Unit Tests) ---

/// MockAuthProvider
///
/// In-memory provider for tests: a fixed set of accounts, optional blanket
/// failure, and counters for the verification resend flow.
pub struct MockAuthProvider {
    accounts: Mutex<HashMap<String, (String, ProviderIdentity)>>,
    pub should_fail: bool,
    resend_count: Mutex<u32>,
    sign_out_count: Mutex<u32>,
    state_tx: watch::Sender<Option<ProviderIdentity>>,
}

impl Default for MockAuthProvider {
    fn default() -> Self {
        let (state_tx, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            should_fail: false,
            resend_count: Mutex::new(0),
            sign_out_count: Mutex::new(0),
            state_tx,
        }
    }
}

impl MockAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Registers an account the mock will accept, returning its identity id.
    pub fn with_account(self, email: &str, password: &str, verified: bool) -> (Self, Uuid) {
        let identity = ProviderIdentity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            email_verified: verified,
        };
        let id = identity.id;
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), identity));
        (self, id)
    }

    pub fn resend_count(&self) -> u32 {
        *self.resend_count.lock().unwrap()
    }

    pub fn sign_out_count(&self) -> u32 {
        *self.sign_out_count.lock().unwrap()
    }

    /// Test hook: pushes an identity change into the ambient channel as the
    /// hosted provider would.
    pub fn emit_auth_state(&self, identity: Option<ProviderIdentity>) {
        let _ = self.state_tx.send(identity);
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderIdentity, AppError> {
        if self.should_fail {
            return Err(AppError::Provider("mock provider failure requested".into()));
        }
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(email) {
            Some((stored, identity)) if stored == password => {
                let identity = identity.clone();
                let _ = self.state_tx.send(Some(identity.clone()));
                Ok(identity)
            }
            _ => Err(AppError::Provider("invalid credentials".into())),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<ProviderIdentity, AppError> {
        if self.should_fail {
            return Err(AppError::Provider("mock provider failure requested".into()));
        }
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(email) {
            return Err(AppError::Provider("email already registered".into()));
        }
        let identity = ProviderIdentity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            email_verified: false,
        };
        accounts.insert(email.to_string(), (password.to_string(), identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        *self.sign_out_count.lock().unwrap() += 1;
        let _ = self.state_tx.send(None);
        if self.should_fail {
            return Err(AppError::Provider("mock provider failure requested".into()));
        }
        Ok(())
    }

    async fn send_verification_email(&self, _email: &str) -> Result<(), AppError> {
        if self.should_fail {
            return Err(AppError::Provider("mock provider failure requested".into()));
        }
        *self.resend_count.lock().unwrap() += 1;
        Ok(())
    }

    fn auth_state(&self) -> watch::Receiver<Option<ProviderIdentity>> {
        self.state_tx.subscribe()
    }
}
