use crate::{
    AppState,
    auth::{AuthUser, RequireAdmin, SessionResponse, guard_outcome},
    error::AppError,
    listing::{self, CampaignFilter, Page, UserFilter},
    media,
    models::{
        Campaign, CreateCampaignRequest, CreateUserRequest, DashboardStats, Location, LoginRequest,
        NewLocation, RegisterRequest, ResendVerificationRequest, Role, SiteSettings,
        UpdateCampaignRequest, UpdateSettingsRequest, UpdateUserRequest, User,
    },
    repository::CampaignScope,
    session::LoginResponse,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

/// SessionQuery
///
/// Query parameters of GET /auth/session: the role the caller wants the
/// guard decision for, if any.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SessionQuery {
    pub required_role: Option<Role>,
}

// --- Auth & Session Handlers ---

/// register
///
/// [Public Route] Signs a new account up with the identity provider and
/// mirrors it as a User document (role `user`, unverified). The provider
/// sends the verification email itself; the account stays unusable until the
/// link is applied.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses((status = 201, description = "Registered", body = User))
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    if state.repo.get_user_by_email(&payload.email).await?.is_some() {
        return Err(AppError::Validation("email is already registered".into()));
    }

    // Step 1: create the identity at the provider.
    let identity = state
        .provider
        .sign_up(&payload.email, &payload.password)
        .await?;

    // Step 2: mirror the User document under the provider's id.
    let user = state
        .repo
        .create_user(User {
            id: identity.id,
            email: identity.email,
            name: payload.name,
            role: Role::User,
            email_verified: false,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// login
///
/// [Public Route] Email/password login. The response status is one of
/// `success` (with a bearer token), `emailNotVerified`, or `error` with the
/// fixed failure message; provider details never reach the client.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses((status = 200, description = "Login outcome", body = LoginResponse))
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Json<LoginResponse> {
    let outcome = state.session.login(&payload.email, &payload.password).await;
    Json(outcome.into_response())
}

/// logout
///
/// [Public Route] Clears the session. Always succeeds from the client's
/// point of view; provider failures are logged.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out"))
)]
pub async fn logout(State(state): State<AppState>) -> StatusCode {
    state.session.logout().await;
    StatusCode::NO_CONTENT
}

/// resend_verification
///
/// [Public Route] Triggers a provider-side resend of the verification email
/// after an `emailNotVerified` login outcome.
#[utoipa::path(
    post,
    path = "/auth/resend-verification",
    request_body = ResendVerificationRequest,
    responses((status = 202, description = "Verification email queued"))
)]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(payload): Json<ResendVerificationRequest>,
) -> Result<StatusCode, AppError> {
    state.session.resend_verification_email(&payload.email).await?;
    Ok(StatusCode::ACCEPTED)
}

/// get_session
///
/// [Public Route] Snapshot of the session store plus the route-guard decision
/// for the role the caller asked about. The dashboard shell drives its
/// redirect/loading behavior off this endpoint.
#[utoipa::path(
    get,
    path = "/auth/session",
    params(SessionQuery),
    responses((status = 200, description = "Session snapshot", body = SessionResponse))
)]
pub async fn get_session(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Json<SessionResponse> {
    let session = state.session.state().await;
    let outcome = guard_outcome(&session, query.required_role);
    Json(SessionResponse {
        status: session.status,
        email: session.identity.map(|i| i.email),
        role: session.role,
        outcome,
    })
}

/// get_me
///
/// [Authenticated Route] The requesting user's own document.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = User))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    state
        .repo
        .get_user(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("user"))
}

// --- Campaign Handlers ---

/// list_campaigns
///
/// [Authenticated Route] Campaign list view. Admins see every campaign,
/// everyone else sees only their own. The collection is fetched once and
/// filtered/paginated in memory, so typing in the search box never triggers
/// further store reads.
#[utoipa::path(
    get,
    path = "/campaigns",
    params(CampaignFilter),
    responses((status = 200, description = "Filtered, paginated campaigns"))
)]
pub async fn list_campaigns(
    user: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<CampaignFilter>,
) -> Result<Json<Page<Campaign>>, AppError> {
    let scope = match user.role {
        Role::Admin => CampaignScope::All,
        Role::User => CampaignScope::OwnedBy(user.id),
    };

    let campaigns = state.repo.list_campaigns(scope).await?;
    let filtered: Vec<Campaign> = campaigns
        .into_iter()
        .filter(|c| filter.matches(c))
        .collect();

    Ok(Json(listing::paginate(&filtered, filter.page.unwrap_or(1))))
}

/// get_campaign_details
///
/// [Authenticated Route] Single campaign view for its owner or an admin.
/// Anyone else gets the same inline not-found as a dangling deep link.
#[utoipa::path(
    get,
    path = "/campaigns/{id}",
    params(("id" = Uuid, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Found", body = Campaign),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_campaign_details(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Campaign>, AppError> {
    let campaign = state
        .repo
        .get_campaign(id)
        .await?
        .ok_or(AppError::NotFound("campaign"))?;

    if user.role != Role::Admin && campaign.user_id != user.id {
        return Err(AppError::NotFound("campaign"));
    }

    Ok(Json(campaign))
}

/// get_campaign_locations
///
/// [Authenticated Route] All location pins under a campaign, for the map
/// view. Same visibility rule as the campaign itself.
#[utoipa::path(
    get,
    path = "/campaigns/{id}/locations",
    params(("id" = Uuid, Path, description = "Campaign ID")),
    responses((status = 200, description = "Locations", body = [Location]))
)]
pub async fn get_campaign_locations(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Location>>, AppError> {
    let campaign = state
        .repo
        .get_campaign(id)
        .await?
        .ok_or(AppError::NotFound("campaign"))?;

    if user.role != Role::Admin && campaign.user_id != user.id {
        return Err(AppError::NotFound("campaign"));
    }

    Ok(Json(state.repo.list_locations(id).await?))
}

/// update_campaign
///
/// [Authenticated Route] Owner or admin edit of the mutable campaign fields.
/// An unchanged patch is answered with the stored document without writing.
#[utoipa::path(
    put,
    path = "/campaigns/{id}",
    request_body = UpdateCampaignRequest,
    responses((status = 200, description = "Updated", body = Campaign))
)]
pub async fn update_campaign(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateCampaignRequest>,
) -> Result<Json<Campaign>, AppError> {
    let campaign = state
        .repo
        .get_campaign(id)
        .await?
        .ok_or(AppError::NotFound("campaign"))?;

    if user.role != Role::Admin && campaign.user_id != user.id {
        return Err(AppError::NotFound("campaign"));
    }

    state
        .repo
        .update_campaign(id, patch)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("campaign"))
}

/// get_shared_campaign
///
/// [Public Route] Resolves the campaign behind a shared submission link. A
/// dangling id renders as an inline not-found, not a redirect.
#[utoipa::path(
    get,
    path = "/campaigns/{id}/shared",
    params(("id" = Uuid, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Found", body = Campaign),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_shared_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Campaign>, AppError> {
    state
        .repo
        .get_campaign(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("campaign"))
}

/// submit_location
///
/// [Public Route] The location-submission form behind a shared campaign
/// link. Multipart payload: `name`, optional `description`, `latitude` and
/// `longitude` (or a pasted `map_url` to extract them from), plus up to five
/// `images` parts — anything beyond the fifth is dropped at intake.
///
/// Each accepted image runs through the upload pipeline in turn: normalize,
/// store under a timestamped key, collect the public URL. One location
/// document is written at the end with all URLs attached.
#[utoipa::path(
    post,
    path = "/campaigns/{id}/submissions",
    responses(
        (status = 201, description = "Location created", body = Location),
        (status = 404, description = "Campaign not found"),
        (status = 422, description = "Missing required fields")
    )
)]
pub async fn submit_location(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Location>), AppError> {
    // The shared link must point at a live campaign before anything uploads.
    state
        .repo
        .get_campaign(campaign_id)
        .await?
        .ok_or(AppError::NotFound("campaign"))?;

    let mut name = String::new();
    let mut description: Option<String> = None;
    let mut latitude = String::new();
    let mut longitude = String::new();
    let mut map_url: Option<String> = None;
    let mut images: Vec<(String, Vec<u8>)> = Vec::new();
    let mut dropped = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed form: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => {
                name = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
            }
            "description" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                if !text.trim().is_empty() {
                    description = Some(text);
                }
            }
            "latitude" => {
                latitude = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
            }
            "longitude" => {
                longitude = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
            }
            "map_url" => {
                map_url = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                );
            }
            "images" => {
                if images.len() >= media::MAX_IMAGES_PER_SUBMISSION {
                    dropped += 1;
                    continue;
                }
                let filename = field.file_name().unwrap_or("image").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Upload(e.to_string()))?;
                images.push((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    if dropped > 0 {
        tracing::debug!(dropped, "dropped images beyond the submission cap");
    }

    // A pasted map link fills in coordinates the submitter left blank.
    if latitude.trim().is_empty() || longitude.trim().is_empty() {
        if let Some(url) = &map_url {
            match media::parse_coordinates(url) {
                Some((lat, lng)) => {
                    latitude = lat;
                    longitude = lng;
                }
                None => {
                    return Err(AppError::Validation(
                        "could not extract coordinates from the map link".into(),
                    ));
                }
            }
        }
    }

    // Upload pipeline, one image at a time: normalize, store, collect URL.
    // A storage failure aborts this submission only.
    let destination = format!("locations/{}", campaign_id);
    let mut image_urls = Vec::with_capacity(images.len());
    for (filename, bytes) in images {
        let normalized = media::compress(
            &bytes,
            media::MAX_IMAGE_WIDTH,
            media::MAX_IMAGE_HEIGHT,
            media::JPEG_QUALITY,
        );
        let url = media::upload(
            state.storage.as_ref(),
            &destination,
            &filename,
            normalized,
            "image/jpeg",
        )
        .await?;
        image_urls.push(url);
    }

    let location = state
        .repo
        .add_location(
            campaign_id,
            NewLocation {
                name,
                description,
                latitude,
                longitude,
                image_urls,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(location)))
}

// --- Admin Handlers ---

/// get_admin_stats
///
/// [Admin Route] Dashboard counters.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses((status = 200, description = "Stats", body = DashboardStats))
)]
pub async fn get_admin_stats(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(state.repo.get_stats().await?))
}

/// get_admin_users
///
/// [Admin Route] User list view, filtered and paginated in memory like the
/// campaign list.
#[utoipa::path(
    get,
    path = "/admin/users",
    params(UserFilter),
    responses((status = 200, description = "Filtered, paginated users"))
)]
pub async fn get_admin_users(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Page<User>>, AppError> {
    let users = state.repo.list_users().await?;
    let filtered: Vec<User> = users.into_iter().filter(|u| filter.matches(u)).collect();
    Ok(Json(listing::paginate(&filtered, filter.page.unwrap_or(1))))
}

/// create_user
///
/// [Admin Route] Provisions an account: creates the identity at the provider
/// and mirrors the User document with the chosen role. The new identity
/// still has to verify its email before it can sign in.
#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = CreateUserRequest,
    responses((status = 201, description = "Created", body = User))
)]
pub async fn create_user(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let identity = state
        .provider
        .sign_up(&payload.email, &payload.password)
        .await?;

    let user = state
        .repo
        .create_user(User {
            id: identity.id,
            email: identity.email,
            name: payload.name,
            role: payload.role,
            email_verified: false,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// update_user
///
/// [Admin Route] Edits a user's display name. Email and verification state
/// belong to the identity provider and are not writable here.
#[utoipa::path(
    put,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses((status = 200, description = "Updated", body = User))
)]
pub async fn update_user(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    state
        .repo
        .update_user_name(id, &payload.name)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("user"))
}

/// delete_user
///
/// [Admin Route] Deletes a user and, transitively, every campaign they own
/// and every location under those campaigns. The cascade is atomic: either
/// the user and all dependents are gone, or nothing is.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.repo.delete_user(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("user"))
    }
}

/// create_campaign
///
/// [Admin Route] Creates a campaign for a selected owner. Name and owner are
/// required; the repository rejects the write otherwise.
#[utoipa::path(
    post,
    path = "/admin/campaigns",
    request_body = CreateCampaignRequest,
    responses((status = 201, description = "Created", body = Campaign))
)]
pub async fn create_campaign(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(payload): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<Campaign>), AppError> {
    let campaign = state.repo.create_campaign(payload).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// delete_campaign
///
/// [Admin Route] Cascade-deletes a campaign: all of its locations first,
/// then the campaign document, atomically.
#[utoipa::path(
    delete,
    path = "/admin/campaigns/{id}",
    params(("id" = Uuid, Path, description = "Campaign ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_campaign(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.repo.delete_campaign(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("campaign"))
    }
}

// --- Settings Handlers ---

/// get_settings
///
/// [Public Route] The site-wide image settings consumed by the marketing
/// pages. Absent settings read as the empty document rather than an error.
#[utoipa::path(
    get,
    path = "/settings",
    responses((status = 200, description = "Site settings", body = SiteSettings))
)]
pub async fn get_settings(State(state): State<AppState>) -> Result<Json<SiteSettings>, AppError> {
    Ok(Json(state.repo.get_settings().await?.unwrap_or_default()))
}

/// update_settings
///
/// [Admin Route] Multipart upsert of the homepage/consult images. Each
/// provided image is normalized and stored with replace semantics: the
/// previously stored object is deleted best-effort before the new URL is
/// persisted on the singleton document.
#[utoipa::path(
    put,
    path = "/admin/settings",
    responses((status = 200, description = "Updated settings", body = SiteSettings))
)]
pub async fn update_settings(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SiteSettings>, AppError> {
    let current = state.repo.get_settings().await?.unwrap_or_default();
    let mut patch = UpdateSettingsRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed form: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        let slot = match field_name.as_str() {
            "homepage_image" => "homepage",
            "consult_image" => "consult",
            _ => continue,
        };

        let filename = field.file_name().unwrap_or("image").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Upload(e.to_string()))?;

        let normalized = media::compress(
            &bytes,
            media::MAX_IMAGE_WIDTH,
            media::MAX_IMAGE_HEIGHT,
            media::JPEG_QUALITY,
        );

        let old_url = match slot {
            "homepage" => current.homepage_image_url.as_deref(),
            _ => current.consult_image_url.as_deref(),
        };

        let url = media::replace(
            state.storage.as_ref(),
            old_url,
            "settings",
            &filename,
            normalized,
            "image/jpeg",
        )
        .await?;

        match slot {
            "homepage" => patch.homepage_image_url = Some(url),
            _ => patch.consult_image_url = Some(url),
        }
    }

    Ok(Json(state.repo.upsert_settings(patch).await?))
}
