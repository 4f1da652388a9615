//! HTTP application wiring.
//!
//! - `services.rs`: store, identity provider, enricher and registrar
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request bodies and query strings
//! - `errors.rs`: error responses

use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router.
///
/// `/health` and `/api/auth/{register,login,...}` are public; everything else
/// under `/api` requires a session.
pub fn build_app(services: Arc<AppServices>) -> Router {
    let protected = routes::protected_router().route_layer(from_fn_with_state(
        services.auth_state(),
        middleware::auth_middleware,
    ));
    let api = routes::public_router().merge(protected);

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", api)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
