use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes for any signed-in, email-verified user. Every handler here relies
/// on the `AuthUser` extractor middleware on the layer above this module, so
/// each receives a validated identity with a freshly resolved role; ownership
/// checks happen inside the handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The requesting user's own document (profile, role, verification).
        .route("/me", get(handlers::get_me))
        // GET /campaigns?search=&status=&page=
        // Campaign list view: admins see all campaigns, everyone else their
        // own. Filtering and pagination run in memory over the one fetch.
        .route("/campaigns", get(handlers::list_campaigns))
        // GET/PUT /campaigns/{id}
        // Detail view and partial edit of the mutable fields (name, status).
        // Owner or admin only; everyone else sees a not-found.
        .route(
            "/campaigns/{id}",
            get(handlers::get_campaign_details).put(handlers::update_campaign),
        )
        // GET /campaigns/{id}/locations
        // The campaign's location pins for the map view.
        .route(
            "/campaigns/{id}/locations",
            get(handlers::get_campaign_locations),
        )
}
