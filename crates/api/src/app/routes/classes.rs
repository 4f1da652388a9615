use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::info;

use shor_auth::permissions::{class_bookings, classes};
use shor_core::ClassId;
use shor_infra::model::{ClassFilter, NewClass, NewClassBooking};

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::parse_id;
use crate::app::services::AppServices;
use crate::authz::{require, require_ownership};
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_classes).post(create_class))
        .route("/:id", get(get_class).delete(delete_class))
        .route("/:id/bookings", post(book_class))
}

/// GET /classes?style=&level=&studioId=&artistId=&page=&limit=
pub async fn list_classes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Query(filter): Query<ClassFilter>,
    Query(page): Query<dto::PageQuery>,
) -> ApiResult {
    require(&ctx, &classes::READ)?;
    let page = page.page();
    let classes = services.store.list_classes(&filter, page).await?;
    Ok(Json(json!({
        "classes": classes,
        "page": page.page,
        "limit": page.limit,
    }))
    .into_response())
}

/// GET /classes/:id
pub async fn get_class(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&ctx, &classes::READ)?;
    let id: ClassId = parse_id(&id)?;
    let class = services
        .store
        .find_class(id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| ApiError::not_found("class"))?;
    Ok(Json(json!({ "class": class })).into_response())
}

/// POST /classes - the caller teaches it, so they need an artist profile
pub async fn create_class(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Json(mut body): Json<NewClass>,
) -> ApiResult {
    require(&ctx, &classes::CREATE)?;
    let artist_id = ctx
        .user()
        .artist_id
        .ok_or_else(|| ApiError::Forbidden("an artist profile is required to create classes".into()))?;
    body.artist_id = Some(artist_id);
    let class = services.store.create_class(body).await?;
    info!(class_id = %class.id, %artist_id, "class created");
    Ok((StatusCode::CREATED, Json(json!({ "class": class }))).into_response())
}

/// DELETE /classes/:id - soft delete by the teaching artist or an admin
pub async fn delete_class(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&ctx, &classes::DELETE)?;
    let id: ClassId = parse_id(&id)?;
    let class = services
        .store
        .find_class(id)
        .await?
        .ok_or_else(|| ApiError::not_found("class"))?;
    require_ownership(&ctx, ctx.user().artist_id == Some(class.artist_id), "class")?;
    let class = services.store.deactivate_class(id).await?;
    Ok(Json(json!({ "class": class })).into_response())
}

/// POST /classes/:id/bookings - takes one seat
pub async fn book_class(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::BookClassRequest>,
) -> ApiResult {
    require(&ctx, &class_bookings::CREATE)?;
    let class_id: ClassId = parse_id(&id)?;
    let booking = services
        .store
        .book_class(NewClassBooking {
            class_id,
            user_id: ctx.user_id(),
            notes: body.notes,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "booking": booking }))).into_response())
}
