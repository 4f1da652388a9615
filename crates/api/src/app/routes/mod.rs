use core::str::FromStr;

use axum::{routing::get, Router};

use shor_core::DomainError;

use crate::app::errors::ApiError;

pub mod auth;
pub mod bookings;
pub mod classes;
pub mod gigs;
pub mod profiles;
pub mod rbac;
pub mod studios;
pub mod system;
pub mod users;

/// Endpoints reachable without a session.
pub fn public_router() -> Router {
    auth::public_router()
}

/// Endpoints that require a bearer session.
pub fn protected_router() -> Router {
    Router::new()
        .merge(auth::router())
        .nest("/rbac", rbac::router())
        .route("/audit-log", get(rbac::list_audit_log))
        .nest("/users", users::router())
        .nest("/profiles", profiles::router())
        .nest("/studios", studios::router())
        .nest("/classes", classes::router())
        .nest("/bookings", bookings::router())
        .nest("/gigs", gigs::router())
        .route("/applications", get(gigs::list_my_applications))
        .route("/whoami", get(system::whoami))
}

/// Parse a path segment into a typed id; malformed ids are validation errors.
pub(crate) fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    Ok(raw.parse::<T>()?)
}
