use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Admin Router Module
///
/// Routes exclusively accessible to the 'admin' role: user management,
/// campaign provisioning and cascade deletion, the dashboard counters, and
/// the site-wide image settings.
///
/// Access Control:
/// Every handler takes the `RequireAdmin` extractor, which authenticates the
/// request and then checks the freshly resolved role; a signed-in non-admin
/// is redirected to the dashboard landing page rather than shown an error.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        // Core dashboard counters (users, campaigns, active campaigns, pins).
        .route("/stats", get(handlers::get_admin_stats))
        // GET/POST /admin/users
        // Filtered, paginated user list; provisioning of a new account via
        // the identity provider plus the mirrored User document.
        .route(
            "/users",
            get(handlers::get_admin_users).post(handlers::create_user),
        )
        // PUT/DELETE /admin/users/{id}
        // Display-name edit, and the transitive cascade delete
        // (locations of owned campaigns -> campaigns -> user).
        .route(
            "/users/{id}",
            put(handlers::update_user).delete(handlers::delete_user),
        )
        // POST /admin/campaigns
        // Creates a campaign for a selected owner.
        .route("/campaigns", post(handlers::create_campaign))
        // DELETE /admin/campaigns/{id}
        // Cascade delete: child locations first, then the campaign, atomically.
        .route("/campaigns/{id}", delete(handlers::delete_campaign))
        // PUT /admin/settings
        // Multipart upsert of the homepage/consultation images with replace
        // semantics on the previously stored objects.
        .route("/settings", put(handlers::update_settings))
}
