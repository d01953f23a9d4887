use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The RBAC field on a User document. Stored as text in the `users` table;
/// a NULL column decodes to `Role::User` at the repository boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    /// Decodes the nullable `role` column. An absent role means an ordinary
    /// user, never an admin.
    pub fn from_db(value: Option<&str>) -> Self {
        match value {
            Some("admin") => Role::Admin,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

/// CampaignStatus
///
/// Closed campaign lifecycle state. Stored as text; anything the store hands
/// back that is not `active` reads as inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum CampaignStatus {
    Active,
    #[default]
    Inactive,
}

impl CampaignStatus {
    pub fn from_db(value: &str) -> Self {
        match value {
            "active" => CampaignStatus::Active,
            _ => CampaignStatus::Inactive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Active => "active",
            CampaignStatus::Inactive => "inactive",
        }
    }
}

/// User
///
/// The canonical identity record in the `users` table, mirroring the external
/// identity provider. `email_verified` is synced from the provider on login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct User {
    // Primary key, shared with the provider's identity id.
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    pub email_verified: bool,
}

/// Campaign
///
/// An advertising campaign owned by exactly one User. The owner reference is
/// weak (no foreign-key constraint is assumed by the application).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub status: CampaignStatus,
    // Owner reference into `users`.
    pub user_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Location
///
/// A geolocated pin scoped under its parent Campaign; it has no top-level
/// existence of its own. Latitude/longitude are free-form strings exactly as
/// submitted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Location {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub latitude: String,
    pub longitude: String,
    pub image_urls: Vec<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// SiteSettings
///
/// The singleton document holding the site-wide marketing images. Created
/// lazily on first write (upsert semantics).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct SiteSettings {
    pub homepage_image_url: Option<String>,
    pub consult_image_url: Option<String>,
    #[ts(type = "string")]
    pub last_updated: DateTime<Utc>,
}

/// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Input payload for POST /auth/login. The password is forwarded to the
/// identity provider and never persisted or logged here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// RegisterRequest
///
/// Input payload for the public sign-up endpoint (POST /register).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// ResendVerificationRequest
///
/// Follow-up to an `emailNotVerified` login outcome.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ResendVerificationRequest {
    pub email: String,
}

/// CreateUserRequest
///
/// Admin-callable provisioning payload (POST /admin/users). The password is
/// passed through to the identity provider only.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
}

/// UpdateUserRequest
///
/// Admin edit of a user record. Only the display name is mutable; email and
/// verification state belong to the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    pub name: String,
}

/// CreateCampaignRequest
///
/// Input payload for creating a campaign. Name and owner are required; the
/// repository rejects the write otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCampaignRequest {
    pub name: String,
    #[serde(default)]
    pub status: CampaignStatus,
    pub user_id: Uuid,
}

impl CreateCampaignRequest {
    /// Required-field check, enforced at the storage boundary rather than by
    /// UI state.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("campaign name is required".into()));
        }
        if self.user_id.is_nil() {
            return Err(AppError::Validation("campaign owner is required".into()));
        }
        Ok(())
    }
}

/// UpdateCampaignRequest
///
/// Partial update of the mutable campaign fields. A patch carrying neither
/// field is rejected before any write happens.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCampaignRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CampaignStatus>,
}

impl UpdateCampaignRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.status.is_none()
    }

    /// True when applying this patch to `current` would change nothing.
    pub fn is_noop_for(&self, current: &Campaign) -> bool {
        let name_unchanged = self.name.as_ref().is_none_or(|n| n == &current.name);
        let status_unchanged = self.status.is_none_or(|s| s == current.status);
        name_unchanged && status_unchanged
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.is_empty() {
            return Err(AppError::Validation("nothing to update".into()));
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("campaign name is required".into()));
            }
        }
        Ok(())
    }
}

/// NewLocation
///
/// The fully assembled location record handed to the repository after the
/// Upload Pipeline has collected the image URLs.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewLocation {
    pub name: String,
    pub description: Option<String>,
    pub latitude: String,
    pub longitude: String,
    pub image_urls: Vec<String>,
}

impl NewLocation {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("location name is required".into()));
        }
        if self.latitude.trim().is_empty() || self.longitude.trim().is_empty() {
            return Err(AppError::Validation(
                "latitude and longitude are required".into(),
            ));
        }
        Ok(())
    }
}

/// UpdateSettingsRequest
///
/// Partial upsert of the singleton SiteSettings document. Fields left as
/// `None` keep whatever the store already holds.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateSettingsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage_image_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub consult_image_url: Option<String>,
}

/// --- Dashboard Schemas (Output) ---

/// DashboardStats
///
/// Counters for the admin landing page (GET /admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_campaigns: i64,
    pub active_campaigns: i64,
    pub total_locations: i64,
}
