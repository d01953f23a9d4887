use async_trait::async_trait;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use campaign_portal::{
    AppState,
    auth::{AuthUser, GuardOutcome, RequireAdmin},
    config::AppConfig,
    error::AppError,
    handlers::{self, SessionQuery},
    listing::{CampaignFilter, UserFilter},
    models::{
        Campaign, CampaignStatus, CreateCampaignRequest, DashboardStats, Location, NewLocation,
        Role, SiteSettings, UpdateCampaignRequest, UpdateSettingsRequest, UpdateUserRequest, User,
    },
    provider::MockAuthProvider,
    repository::{CampaignScope, Repository},
    session::SessionStore,
    storage::MockStorageService,
};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// --- MOCK REPOSITORY IMPLEMENTATION ---

// Central control point for handler tests: canned outputs per method, plus a
// recorder for the listing scope the handler computed.
pub struct MockRepoControl {
    pub users_to_return: Vec<User>,
    pub user_to_return: Option<User>,
    pub campaigns_to_return: Vec<Campaign>,
    pub campaign_to_return: Option<Campaign>,
    pub locations_to_return: Vec<Location>,
    pub delete_result: bool,
    pub stats_to_return: DashboardStats,
    pub settings_to_return: Option<SiteSettings>,
    pub last_scope: Mutex<Option<CampaignScope>>,
}

impl Default for MockRepoControl {
    fn default() -> Self {
        MockRepoControl {
            users_to_return: vec![],
            user_to_return: Some(User::default()),
            campaigns_to_return: vec![],
            campaign_to_return: Some(Campaign::default()),
            locations_to_return: vec![],
            delete_result: false,
            stats_to_return: DashboardStats::default(),
            settings_to_return: None,
            last_scope: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Repository for MockRepoControl {
    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(self.users_to_return.clone())
    }
    async fn get_user(&self, _id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.user_to_return.clone())
    }
    async fn get_user_by_email(&self, _email: &str) -> Result<Option<User>, AppError> {
        Ok(self.user_to_return.clone())
    }
    async fn create_user(&self, user: User) -> Result<User, AppError> {
        Ok(user)
    }
    async fn update_user_name(&self, _id: Uuid, name: &str) -> Result<Option<User>, AppError> {
        Ok(self.user_to_return.clone().map(|mut u| {
            u.name = name.to_string();
            u
        }))
    }
    async fn set_email_verified(&self, _id: Uuid, _verified: bool) -> Result<(), AppError> {
        Ok(())
    }
    async fn delete_user(&self, _id: Uuid) -> Result<bool, AppError> {
        Ok(self.delete_result)
    }

    async fn list_campaigns(&self, scope: CampaignScope) -> Result<Vec<Campaign>, AppError> {
        *self.last_scope.lock().unwrap() = Some(scope);
        Ok(self.campaigns_to_return.clone())
    }
    async fn get_campaign(&self, _id: Uuid) -> Result<Option<Campaign>, AppError> {
        Ok(self.campaign_to_return.clone())
    }
    async fn create_campaign(&self, req: CreateCampaignRequest) -> Result<Campaign, AppError> {
        req.validate()?;
        Ok(Campaign {
            id: Uuid::new_v4(),
            name: req.name,
            status: req.status,
            user_id: req.user_id,
            ..Campaign::default()
        })
    }
    async fn update_campaign(
        &self,
        _id: Uuid,
        patch: UpdateCampaignRequest,
    ) -> Result<Option<Campaign>, AppError> {
        patch.validate()?;
        Ok(self.campaign_to_return.clone())
    }
    async fn delete_campaign(&self, _id: Uuid) -> Result<bool, AppError> {
        Ok(self.delete_result)
    }

    async fn list_locations(&self, _campaign_id: Uuid) -> Result<Vec<Location>, AppError> {
        Ok(self.locations_to_return.clone())
    }
    async fn add_location(
        &self,
        campaign_id: Uuid,
        location: NewLocation,
    ) -> Result<Location, AppError> {
        location.validate()?;
        Ok(Location {
            id: Uuid::new_v4(),
            campaign_id,
            name: location.name,
            description: location.description,
            latitude: location.latitude,
            longitude: location.longitude,
            image_urls: location.image_urls,
            ..Location::default()
        })
    }

    async fn get_settings(&self) -> Result<Option<SiteSettings>, AppError> {
        Ok(self.settings_to_return.clone())
    }
    async fn upsert_settings(
        &self,
        patch: UpdateSettingsRequest,
    ) -> Result<SiteSettings, AppError> {
        let current = self.settings_to_return.clone().unwrap_or_default();
        Ok(SiteSettings {
            homepage_image_url: patch.homepage_image_url.or(current.homepage_image_url),
            consult_image_url: patch.consult_image_url.or(current.consult_image_url),
            last_updated: current.last_updated,
        })
    }

    async fn get_stats(&self) -> Result<DashboardStats, AppError> {
        Ok(self.stats_to_return.clone())
    }
}

// --- TEST UTILITIES ---

const TEST_ID: Uuid = Uuid::from_u128(123);
const TEST_ADMIN_ID: Uuid = Uuid::from_u128(456);

// Creates an AppState using mock components
fn create_test_state(repo_control: MockRepoControl, storage_control: MockStorageService) -> AppState {
    create_shared_state(Arc::new(repo_control), storage_control)
}

// Variant that keeps the concrete mock accessible to the test for assertions.
fn create_shared_state(
    repo_control: Arc<MockRepoControl>,
    storage_control: MockStorageService,
) -> AppState {
    let repo: Arc<dyn Repository> = repo_control;
    let config = AppConfig::default();
    let provider = Arc::new(MockAuthProvider::new());
    let session = Arc::new(SessionStore::new(
        provider.clone(),
        repo.clone(),
        &config.jwt_secret,
    ));
    AppState {
        repo,
        storage: Arc::new(storage_control),
        provider,
        session,
        config,
    }
}

// AuthUser fixtures for direct handler calls
fn admin_user() -> AuthUser {
    AuthUser {
        id: TEST_ADMIN_ID,
        email: "admin@example.com".to_string(),
        role: Role::Admin,
    }
}
fn plain_user() -> AuthUser {
    AuthUser {
        id: TEST_ID,
        email: "user@example.com".to_string(),
        role: Role::User,
    }
}

fn campaign_named(name: &str, owner: Uuid) -> Campaign {
    Campaign {
        id: Uuid::new_v4(),
        name: name.to_string(),
        status: CampaignStatus::Active,
        user_id: owner,
        ..Campaign::default()
    }
}

// --- LIST VIEW HANDLER TESTS ---

#[tokio::test]
async fn test_list_campaigns_admin_scope_is_all() {
    let repo = Arc::new(MockRepoControl::default());
    let state = create_shared_state(repo.clone(), MockStorageService::new());

    let result = handlers::list_campaigns(
        admin_user(),
        State(state),
        Query(CampaignFilter::default()),
    )
    .await;
    assert!(result.is_ok());

    assert_eq!(*repo.last_scope.lock().unwrap(), Some(CampaignScope::All));
}

#[tokio::test]
async fn test_list_campaigns_user_scope_is_owned() {
    let repo = Arc::new(MockRepoControl::default());
    let state = create_shared_state(repo.clone(), MockStorageService::new());

    let result = handlers::list_campaigns(
        plain_user(),
        State(state),
        Query(CampaignFilter::default()),
    )
    .await;
    assert!(result.is_ok());

    assert_eq!(
        *repo.last_scope.lock().unwrap(),
        Some(CampaignScope::OwnedBy(TEST_ID))
    );
}

#[tokio::test]
async fn test_list_campaigns_filters_and_paginates_in_memory() {
    let mut campaigns: Vec<Campaign> = (1..=25)
        .map(|i| campaign_named(&format!("Campaign {:02}", i), TEST_ADMIN_ID))
        .collect();
    campaigns.push(campaign_named("Offbeat", TEST_ADMIN_ID));

    let state = create_test_state(
        MockRepoControl {
            campaigns_to_return: campaigns,
            ..MockRepoControl::default()
        },
        MockStorageService::new(),
    );

    // Page 2 of the unfiltered 26 items holds the remainder beyond PAGE_SIZE.
    let Json(page) = handlers::list_campaigns(
        admin_user(),
        State(state.clone()),
        Query(CampaignFilter {
            page: Some(2),
            ..CampaignFilter::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(page.total_items, 26);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.items.len(), 6);

    // The search predicate narrows before pagination.
    let Json(filtered) = handlers::list_campaigns(
        admin_user(),
        State(state),
        Query(CampaignFilter {
            search: Some("offbeat".to_string()),
            ..CampaignFilter::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(filtered.total_items, 1);
    assert_eq!(filtered.items[0].name, "Offbeat");
}

// --- CAMPAIGN DETAIL / EDIT TESTS ---

#[tokio::test]
async fn test_get_campaign_details_not_found() {
    let state = create_test_state(
        MockRepoControl {
            campaign_to_return: None,
            ..MockRepoControl::default()
        },
        MockStorageService::new(),
    );

    let result = handlers::get_campaign_details(admin_user(), State(state), Path(TEST_ID)).await;
    assert!(matches!(result.unwrap_err(), AppError::NotFound(_)));
}

#[tokio::test]
async fn test_get_campaign_details_hides_foreign_campaign_from_non_admin() {
    let foreign = campaign_named("Someone else's", TEST_ADMIN_ID);
    let state = create_test_state(
        MockRepoControl {
            campaign_to_return: Some(foreign),
            ..MockRepoControl::default()
        },
        MockStorageService::new(),
    );

    let result = handlers::get_campaign_details(plain_user(), State(state), Path(TEST_ID)).await;
    assert!(matches!(result.unwrap_err(), AppError::NotFound(_)));
}

#[tokio::test]
async fn test_get_campaign_details_owner_and_admin_see_it() {
    let owned = campaign_named("Mine", TEST_ID);
    let state = create_test_state(
        MockRepoControl {
            campaign_to_return: Some(owned.clone()),
            ..MockRepoControl::default()
        },
        MockStorageService::new(),
    );

    let Json(for_owner) =
        handlers::get_campaign_details(plain_user(), State(state.clone()), Path(owned.id))
            .await
            .unwrap();
    assert_eq!(for_owner.id, owned.id);

    let Json(for_admin) =
        handlers::get_campaign_details(admin_user(), State(state), Path(owned.id))
            .await
            .unwrap();
    assert_eq!(for_admin.id, owned.id);
}

#[tokio::test]
async fn test_update_campaign_rejects_empty_patch() {
    let owned = campaign_named("Mine", TEST_ID);
    let state = create_test_state(
        MockRepoControl {
            campaign_to_return: Some(owned),
            ..MockRepoControl::default()
        },
        MockStorageService::new(),
    );

    let result = handlers::update_campaign(
        plain_user(),
        State(state),
        Path(TEST_ID),
        Json(UpdateCampaignRequest::default()),
    )
    .await;
    assert!(matches!(result.unwrap_err(), AppError::Validation(_)));
}

// --- ADMIN HANDLER TESTS ---

#[tokio::test]
async fn test_delete_campaign_status_mapping() {
    let state = create_test_state(
        MockRepoControl {
            delete_result: true,
            ..MockRepoControl::default()
        },
        MockStorageService::new(),
    );
    let status = handlers::delete_campaign(
        RequireAdmin(admin_user()),
        State(state),
        Path(TEST_ID),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let state = create_test_state(MockRepoControl::default(), MockStorageService::new());
    let result =
        handlers::delete_campaign(RequireAdmin(admin_user()), State(state), Path(TEST_ID)).await;
    assert!(matches!(result.unwrap_err(), AppError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_user_status_mapping() {
    let state = create_test_state(
        MockRepoControl {
            delete_result: true,
            ..MockRepoControl::default()
        },
        MockStorageService::new(),
    );
    let status = handlers::delete_user(RequireAdmin(admin_user()), State(state), Path(TEST_ID))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_get_admin_stats_returns_counters() {
    let state = create_test_state(
        MockRepoControl {
            stats_to_return: DashboardStats {
                total_users: 3,
                total_campaigns: 7,
                active_campaigns: 2,
                total_locations: 11,
            },
            ..MockRepoControl::default()
        },
        MockStorageService::new(),
    );

    let Json(stats) = handlers::get_admin_stats(RequireAdmin(admin_user()), State(state))
        .await
        .unwrap();
    assert_eq!(stats.total_campaigns, 7);
    assert_eq!(stats.total_locations, 11);
}

#[tokio::test]
async fn test_get_admin_users_filters_by_search() {
    let users = vec![
        User {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            ..User::default()
        },
        User {
            id: Uuid::new_v4(),
            email: "bob@example.com".to_string(),
            name: "Bob".to_string(),
            ..User::default()
        },
    ];
    let state = create_test_state(
        MockRepoControl {
            users_to_return: users,
            ..MockRepoControl::default()
        },
        MockStorageService::new(),
    );

    let Json(page) = handlers::get_admin_users(
        RequireAdmin(admin_user()),
        State(state),
        Query(UserFilter {
            search: Some("alice".to_string()),
            page: None,
        }),
    )
    .await
    .unwrap();
    assert_eq!(page.total_items, 1);
    assert_eq!(page.items[0].name, "Alice");
}

#[tokio::test]
async fn test_create_campaign_validation_flows_through() {
    let state = create_test_state(MockRepoControl::default(), MockStorageService::new());

    let invalid = handlers::create_campaign(
        RequireAdmin(admin_user()),
        State(state.clone()),
        Json(CreateCampaignRequest {
            name: "".to_string(),
            status: CampaignStatus::Active,
            user_id: TEST_ID,
        }),
    )
    .await;
    assert!(matches!(invalid.unwrap_err(), AppError::Validation(_)));

    let (status, Json(created)) = handlers::create_campaign(
        RequireAdmin(admin_user()),
        State(state),
        Json(CreateCampaignRequest {
            name: "Launch".to_string(),
            status: CampaignStatus::Active,
            user_id: TEST_ID,
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created.name, "Launch");
}

#[tokio::test]
async fn test_update_user_maps_missing_to_not_found() {
    let state = create_test_state(
        MockRepoControl {
            user_to_return: None,
            ..MockRepoControl::default()
        },
        MockStorageService::new(),
    );

    let result = handlers::update_user(
        RequireAdmin(admin_user()),
        State(state),
        Path(TEST_ID),
        Json(UpdateUserRequest {
            name: "Renamed".to_string(),
        }),
    )
    .await;
    assert!(matches!(result.unwrap_err(), AppError::NotFound(_)));
}

// --- SESSION / SETTINGS HANDLER TESTS ---

#[tokio::test]
async fn test_get_session_idle_redirects_to_login() {
    let state = create_test_state(MockRepoControl::default(), MockStorageService::new());

    let Json(response) = handlers::get_session(
        State(state),
        Query(SessionQuery {
            required_role: Some(Role::Admin),
        }),
    )
    .await;

    assert_eq!(response.outcome, GuardOutcome::RedirectToLogin);
    assert!(response.role.is_none());
}

#[tokio::test]
async fn test_get_settings_defaults_when_absent() {
    let state = create_test_state(MockRepoControl::default(), MockStorageService::new());
    let Json(settings) = handlers::get_settings(State(state)).await.unwrap();
    assert!(settings.homepage_image_url.is_none());
    assert!(settings.consult_image_url.is_none());
}

#[tokio::test]
async fn test_get_me_returns_user_document() {
    let me = User {
        id: TEST_ID,
        email: "user@example.com".to_string(),
        name: "Me".to_string(),
        role: Role::User,
        email_verified: true,
    };
    let state = create_test_state(
        MockRepoControl {
            user_to_return: Some(me.clone()),
            ..MockRepoControl::default()
        },
        MockStorageService::new(),
    );

    let Json(user) = handlers::get_me(plain_user(), State(state)).await.unwrap();
    assert_eq!(user.email, me.email);
}
