use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use shor_auth::permissions::{studio_bookings, studios};
use shor_core::StudioId;
use shor_infra::model::{NewStudioBooking, StudioFilter};

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::parse_id;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_studios))
        .route("/:id", get(get_studio))
        .route("/:id/bookings", post(book_studio))
}

/// GET /studios?city=&page=&limit=
pub async fn list_studios(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Query(filter): Query<StudioFilter>,
    Query(page): Query<dto::PageQuery>,
) -> ApiResult {
    require(&ctx, &studios::READ)?;
    let page = page.page();
    let studios = services.store.list_studios(&filter, page).await?;
    Ok(Json(json!({
        "studios": studios,
        "page": page.page,
        "limit": page.limit,
    }))
    .into_response())
}

/// GET /studios/:id
pub async fn get_studio(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&ctx, &studios::READ)?;
    let id: StudioId = parse_id(&id)?;
    let studio = services
        .store
        .find_studio(id)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| ApiError::not_found("studio"))?;
    Ok(Json(json!({ "studio": studio })).into_response())
}

/// POST /studios/:id/bookings - price is the hourly price prorated by duration
pub async fn book_studio(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::BookStudioRequest>,
) -> ApiResult {
    require(&ctx, &studio_bookings::CREATE)?;
    let studio_id: StudioId = parse_id(&id)?;
    let booking = services
        .store
        .book_studio(NewStudioBooking {
            studio_id,
            user_id: ctx.user_id(),
            booking_date: body.booking_date,
            start_time: body.start_time,
            end_time: body.end_time,
            notes: body.notes,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "booking": booking }))).into_response())
}
