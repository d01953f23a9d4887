/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules:
/// access control is applied explicitly at the module level (via Axum layers),
/// so a protected endpoint cannot be exposed by accident.
///
/// The three modules map directly to the defined access levels.

/// Routes accessible to any client (marketing pages, auth flows, the shared
/// submission form). Anything these return is public by construction.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
/// Requires a validated, email-verified session.
pub mod authenticated;

/// Routes restricted exclusively to users with the 'admin' role.
/// Non-admins are redirected to the dashboard landing page.
pub mod admin;
