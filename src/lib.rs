use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod listing;
pub mod media;
pub mod models;
pub mod provider;
pub mod repository;
pub mod session;
pub mod storage;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser; // The resolved authenticated user identity.
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry point (main.rs).
pub use config::AppConfig;
pub use provider::{AuthProviderState, HostedAuthClient, MockAuthProvider};
pub use repository::{PostgresRepository, RepositoryState};
pub use session::SessionStore;
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation (Swagger JSON) for the
/// application, aggregating every path and schema decorated with the
/// `#[utoipa::path]` and `#[derive(utoipa::ToSchema)]` macros. Served at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register, handlers::login, handlers::logout,
        handlers::resend_verification, handlers::get_session, handlers::get_me,
        handlers::list_campaigns, handlers::get_campaign_details,
        handlers::get_campaign_locations, handlers::update_campaign,
        handlers::get_shared_campaign, handlers::submit_location,
        handlers::get_admin_stats, handlers::get_admin_users,
        handlers::create_user, handlers::update_user, handlers::delete_user,
        handlers::create_campaign, handlers::delete_campaign,
        handlers::get_settings, handlers::update_settings
    ),
    components(
        schemas(
            models::User, models::Campaign, models::Location, models::SiteSettings,
            models::Role, models::CampaignStatus, models::LoginRequest,
            models::RegisterRequest, models::ResendVerificationRequest,
            models::CreateUserRequest, models::UpdateUserRequest,
            models::CreateCampaignRequest, models::UpdateCampaignRequest,
            models::NewLocation, models::UpdateSettingsRequest, models::DashboardStats,
            session::LoginResponse, session::LoginStatus, session::AuthStatus,
            auth::SessionResponse, auth::GuardOutcome,
        )
    ),
    tags(
        (name = "campaign-portal", description = "Campaign & Location Portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, thread-safe container holding all application services and
/// configuration, shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: document access via the PgPool connection.
    pub repo: RepositoryState,
    /// Storage Layer: S3/MinIO object writes, deletes, and URL resolution.
    pub storage: StorageState,
    /// Identity provider client (hosted auth service).
    pub provider: AuthProviderState,
    /// The session service: login/logout flows and the ambient auth listener.
    pub session: Arc<SessionStore>,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Allow handlers and extractors to pull individual components from the shared
// AppState without depending on the rest of it.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AuthProviderState {
    fn from_ref(app_state: &AppState) -> AuthProviderState {
        app_state.provider.clone()
    }
}

impl FromRef<AppState> for Arc<SessionStore> {
    fn from_ref(app_state: &AppState) -> Arc<SessionStore> {
        app_state.session.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for the authenticated route tree. The `AuthUser`
/// extractor performs the JWT validation and store lookup; when it rejects,
/// the request is redirected to the login page before any handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware, and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: no middleware applied.
        .merge(public::public_routes())
        // Authenticated Routes: protected by the auth middleware; the role is
        // re-resolved inside the extractor on every request.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Admin Routes: nested under '/admin'. The role check lives in the
        // `RequireAdmin` extractor each handler takes.
        .nest("/admin", admin::admin_routes())
        // Apply the unified state to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (applied outermost)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID generation for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request tracing spans carrying the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Customizes the TraceLayer span: includes the `x-request-id` header (when
/// present) next to the HTTP method and URI so every log line for a request
/// correlates on one id.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
