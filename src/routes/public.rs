use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session: health, the auth flows themselves,
/// the site-wide image settings consumed by the marketing pages, and the
/// shared-link location submission form.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Sign-up against the identity provider plus the mirrored User
        // document. The provider sends the verification email.
        .route("/register", post(handlers::register))
        // POST /auth/login | /auth/logout | /auth/resend-verification
        // The session store operations. Login reports success,
        // emailNotVerified, or the generic error outcome.
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route(
            "/auth/resend-verification",
            post(handlers::resend_verification),
        )
        // GET /auth/session?required_role=...
        // Session snapshot plus the route-guard decision; the dashboard shell
        // redirects or renders based on this.
        .route("/auth/session", get(handlers::get_session))
        // GET /settings
        // Site-wide marketing images (homepage, consultation page).
        .route("/settings", get(handlers::get_settings))
        // GET /campaigns/{id}/shared
        // Resolves a shared submission link. A dangling campaign id renders
        // as an inline not-found message, not a redirect.
        .route(
            "/campaigns/{id}/shared",
            get(handlers::get_shared_campaign),
        )
        // POST /campaigns/{id}/submissions
        // The unauthenticated location-submission form: multipart fields plus
        // up to five images through the upload pipeline.
        .route(
            "/campaigns/{id}/submissions",
            post(handlers::submit_location),
        )
}
