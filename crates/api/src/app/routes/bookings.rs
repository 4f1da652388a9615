//! The caller's own class and studio bookings.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use serde_json::json;

use shor_auth::permissions::{class_bookings, studio_bookings};
use shor_core::{ClassBookingId, StudioBookingId};

use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::parse_id;
use crate::app::services::AppServices;
use crate::authz::{require, require_owner};
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/classes", get(list_class_bookings))
        .route("/classes/:id", delete(cancel_class_booking))
        .route("/studios", get(list_studio_bookings))
        .route("/studios/:id", delete(cancel_studio_booking))
}

/// GET /bookings/classes
pub async fn list_class_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
) -> ApiResult {
    require(&ctx, &class_bookings::READ)?;
    let bookings = services.store.list_class_bookings(ctx.user_id()).await?;
    Ok(Json(json!({ "bookings": bookings })).into_response())
}

/// DELETE /bookings/classes/:id - cancels and frees the seat
pub async fn cancel_class_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&ctx, &class_bookings::DELETE)?;
    let id: ClassBookingId = parse_id(&id)?;
    let booking = services
        .store
        .find_class_booking(id)
        .await?
        .ok_or_else(|| ApiError::not_found("booking"))?;
    require_owner(&ctx, booking.user_id, "booking")?;
    let booking = services.store.cancel_class_booking(id).await?;
    Ok(Json(json!({ "booking": booking })).into_response())
}

/// GET /bookings/studios
pub async fn list_studio_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
) -> ApiResult {
    require(&ctx, &studio_bookings::READ)?;
    let bookings = services.store.list_studio_bookings(ctx.user_id()).await?;
    Ok(Json(json!({ "bookings": bookings })).into_response())
}

/// DELETE /bookings/studios/:id
pub async fn cancel_studio_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&ctx, &studio_bookings::DELETE)?;
    let id: StudioBookingId = parse_id(&id)?;
    let booking = services
        .store
        .find_studio_booking(id)
        .await?
        .ok_or_else(|| ApiError::not_found("booking"))?;
    require_owner(&ctx, booking.user_id, "booking")?;
    let booking = services.store.cancel_studio_booking(id).await?;
    Ok(Json(json!({ "booking": booking })).into_response())
}
