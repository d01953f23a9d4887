use crate::error::AppError;
use crate::models::{
    Campaign, CampaignStatus, CreateCampaignRequest, DashboardStats, Location, NewLocation, Role,
    SiteSettings, UpdateCampaignRequest, UpdateSettingsRequest, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// CampaignScope
///
/// Listing scope for campaigns: admins see everything, everyone else sees
/// only the campaigns they own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignScope {
    All,
    OwnedBy(Uuid),
}

/// Repository Trait
///
/// The abstract contract for all persistence operations, shared as an
/// `Arc<dyn Repository>` so handlers never depend on the concrete store.
/// Required-field validation happens inside the write methods; a caller
/// cannot reach the store with an invalid document.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn list_users(&self) -> Result<Vec<User>, AppError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn create_user(&self, user: User) -> Result<User, AppError>;
    /// Admin edit: the display name is the only mutable user field.
    async fn update_user_name(&self, id: Uuid, name: &str) -> Result<Option<User>, AppError>;
    /// Login sync of the provider's verification flag.
    async fn set_email_verified(&self, id: Uuid, verified: bool) -> Result<(), AppError>;
    /// Transitive cascade: locations of owned campaigns, then the campaigns,
    /// then the user document, all inside one transaction.
    async fn delete_user(&self, id: Uuid) -> Result<bool, AppError>;

    // --- Campaigns ---
    /// Ordered by name ascending.
    async fn list_campaigns(&self, scope: CampaignScope) -> Result<Vec<Campaign>, AppError>;
    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, AppError>;
    async fn create_campaign(&self, req: CreateCampaignRequest) -> Result<Campaign, AppError>;
    /// Partial update of the mutable fields only. An empty patch is rejected;
    /// a no-op patch returns the current document without writing.
    async fn update_campaign(
        &self,
        id: Uuid,
        patch: UpdateCampaignRequest,
    ) -> Result<Option<Campaign>, AppError>;
    /// Cascade: child locations first, then the campaign document, atomically.
    async fn delete_campaign(&self, id: Uuid) -> Result<bool, AppError>;

    // --- Locations ---
    async fn list_locations(&self, campaign_id: Uuid) -> Result<Vec<Location>, AppError>;
    async fn add_location(
        &self,
        campaign_id: Uuid,
        location: NewLocation,
    ) -> Result<Location, AppError>;

    // --- Site settings (singleton) ---
    async fn get_settings(&self) -> Result<Option<SiteSettings>, AppError>;
    async fn upsert_settings(
        &self,
        patch: UpdateSettingsRequest,
    ) -> Result<SiteSettings, AppError>;

    // --- Dashboard ---
    async fn get_stats(&self) -> Result<DashboardStats, AppError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Row mappings (validated on read) ---

// The store's documents decode through these row structs so the nullable
// `role` column and free-form status text turn into closed enums in exactly
// one place.

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    role: Option<String>,
    email_verified: bool,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            name: row.name,
            role: Role::from_db(row.role.as_deref()),
            email_verified: row.email_verified,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: Uuid,
    name: String,
    status: String,
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<CampaignRow> for Campaign {
    fn from(row: CampaignRow) -> Self {
        Campaign {
            id: row.id,
            name: row.name,
            status: CampaignStatus::from_db(&row.status),
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

const USER_COLUMNS: &str = "id, email, name, role, email_verified";
const CAMPAIGN_COLUMNS: &str = "id, name, status, user_id, created_at";
const LOCATION_COLUMNS: &str =
    "id, campaign_id, name, description, latitude, longitude, image_urls, created_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by Postgres.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY name ASC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn create_user(&self, user: User) -> Result<User, AppError> {
        if user.email.trim().is_empty() {
            return Err(AppError::Validation("email is required".into()));
        }
        if user.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".into()));
        }

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, email, name, role, email_verified) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(user.email_verified)
        .fetch_one(&self.pool)
        .await?;
        Ok(User::from(row))
    }

    async fn update_user_name(&self, id: Uuid, name: &str) -> Result<Option<User>, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("name is required".into()));
        }
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET name = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn set_email_verified(&self, id: Uuid, verified: bool) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET email_verified = $2 WHERE id = $1")
            .bind(id)
            .bind(verified)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// delete_user
    ///
    /// Transitive cascade inside one transaction: the locations of every
    /// owned campaign go first, then the campaigns, then the user document.
    /// A failure at any step rolls the whole cascade back, so there is no
    /// partially deleted state to reconcile afterwards.
    async fn delete_user(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM locations WHERE campaign_id IN \
             (SELECT id FROM campaigns WHERE user_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::CascadeDelete(e.to_string()))?;

        sqlx::query("DELETE FROM campaigns WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::CascadeDelete(e.to_string()))?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// list_campaigns
    ///
    /// Scope-aware listing via QueryBuilder for safe parameterization,
    /// ordered by name ascending.
    async fn list_campaigns(&self, scope: CampaignScope) -> Result<Vec<Campaign>, AppError> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM campaigns", CAMPAIGN_COLUMNS));

        if let CampaignScope::OwnedBy(user_id) = scope {
            builder.push(" WHERE user_id = ");
            builder.push_bind(user_id);
        }

        builder.push(" ORDER BY name ASC");

        let rows = builder
            .build_query_as::<CampaignRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Campaign::from).collect())
    }

    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, AppError> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {} FROM campaigns WHERE id = $1",
            CAMPAIGN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Campaign::from))
    }

    async fn create_campaign(&self, req: CreateCampaignRequest) -> Result<Campaign, AppError> {
        req.validate()?;

        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "INSERT INTO campaigns (id, name, status, user_id, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) RETURNING {}",
            CAMPAIGN_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(req.name.trim())
        .bind(req.status.as_str())
        .bind(req.user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(Campaign::from(row))
    }

    /// update_campaign
    ///
    /// Partial update of `name`/`status` only, using COALESCE so unset patch
    /// fields keep their stored values. A patch identical to the stored
    /// document skips the write entirely.
    async fn update_campaign(
        &self,
        id: Uuid,
        patch: UpdateCampaignRequest,
    ) -> Result<Option<Campaign>, AppError> {
        patch.validate()?;

        let Some(current) = self.get_campaign(id).await? else {
            return Ok(None);
        };
        if patch.is_noop_for(&current) {
            return Ok(Some(current));
        }

        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "UPDATE campaigns SET \
                name = COALESCE($2, name), \
                status = COALESCE($3, status) \
             WHERE id = $1 RETURNING {}",
            CAMPAIGN_COLUMNS
        ))
        .bind(id)
        .bind(patch.name.as_deref().map(str::trim))
        .bind(patch.status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Campaign::from))
    }

    /// delete_campaign
    ///
    /// Cascade protocol: all child locations are deleted before the campaign
    /// document itself, inside one transaction. A child failure rolls back
    /// the campaign deletion too, so no orphaned locations and no half-gone
    /// parents can result.
    async fn delete_campaign(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM locations WHERE campaign_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::CascadeDelete(e.to_string()))?;

        let result = sqlx::query("DELETE FROM campaigns WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_locations(&self, campaign_id: Uuid) -> Result<Vec<Location>, AppError> {
        let locations = sqlx::query_as::<_, Location>(&format!(
            "SELECT {} FROM locations WHERE campaign_id = $1 ORDER BY created_at ASC",
            LOCATION_COLUMNS
        ))
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(locations)
    }

    async fn add_location(
        &self,
        campaign_id: Uuid,
        location: NewLocation,
    ) -> Result<Location, AppError> {
        location.validate()?;

        let created = sqlx::query_as::<_, Location>(&format!(
            "INSERT INTO locations \
                (id, campaign_id, name, description, latitude, longitude, image_urls, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) RETURNING {}",
            LOCATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(campaign_id)
        .bind(location.name.trim())
        .bind(&location.description)
        .bind(&location.latitude)
        .bind(&location.longitude)
        .bind(&location.image_urls)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_settings(&self) -> Result<Option<SiteSettings>, AppError> {
        let settings = sqlx::query_as::<_, SiteSettings>(
            "SELECT homepage_image_url, consult_image_url, last_updated \
             FROM site_settings WHERE id = TRUE",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings)
    }

    /// upsert_settings
    ///
    /// Singleton upsert: the row is created on first write; afterwards only
    /// the provided fields change and `last_updated` is restamped.
    async fn upsert_settings(
        &self,
        patch: UpdateSettingsRequest,
    ) -> Result<SiteSettings, AppError> {
        let settings = sqlx::query_as::<_, SiteSettings>(
            "INSERT INTO site_settings (id, homepage_image_url, consult_image_url, last_updated) \
             VALUES (TRUE, $1, $2, NOW()) \
             ON CONFLICT (id) DO UPDATE SET \
                homepage_image_url = COALESCE($1, site_settings.homepage_image_url), \
                consult_image_url = COALESCE($2, site_settings.consult_image_url), \
                last_updated = NOW() \
             RETURNING homepage_image_url, consult_image_url, last_updated",
        )
        .bind(&patch.homepage_image_url)
        .bind(&patch.consult_image_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(settings)
    }

    /// get_stats
    ///
    /// Compiles the counters for the administrative dashboard in one call.
    async fn get_stats(&self) -> Result<DashboardStats, AppError> {
        let total_users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let total_campaigns = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM campaigns")
            .fetch_one(&self.pool)
            .await?;
        let active_campaigns = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM campaigns WHERE status = 'active'",
        )
        .fetch_one(&self.pool)
        .await?;
        let total_locations = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM locations")
            .fetch_one(&self.pool)
            .await?;

        Ok(DashboardStats {
            total_users,
            total_campaigns,
            active_campaigns,
            total_locations,
        })
    }
}
