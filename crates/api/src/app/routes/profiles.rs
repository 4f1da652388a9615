//! Extension profiles (artist, studio, student) of the calling user.

use std::sync::Arc;

use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde_json::json;

use shor_auth::permissions::{studios, users};
use shor_infra::model::{ArtistUpdate, StudentUpdate, StudioUpdate};

use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/me", get(my_profiles))
        .route("/artist", put(update_artist))
        .route("/studio", put(update_studio))
        .route("/student", put(update_student))
}

/// GET /profiles/me
pub async fn my_profiles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
) -> ApiResult {
    let me = ctx.user_id();
    let artist = services.store.find_artist_by_user(me).await?;
    let studio = services.store.find_studio_by_user(me).await?;
    let student = services.store.find_student_by_user(me).await?;
    Ok(Json(json!({
        "user": ctx.user(),
        "artist": artist,
        "studio": studio,
        "student": student,
    }))
    .into_response())
}

/// PUT /profiles/artist - only the owner of an artist profile
pub async fn update_artist(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<ArtistUpdate>,
) -> ApiResult {
    require(&ctx, &users::UPDATE)?;
    if ctx.user().artist_id.is_none() {
        return Err(ApiError::not_found("artist profile"));
    }
    if body.experience.is_some_and(|e| e < 0)
        || body.rate_per_hour.is_some_and(|r| r < 0)
        || body.rate_per_class.is_some_and(|r| r < 0)
    {
        return Err(ApiError::validation("experience and rates must not be negative"));
    }
    let artist = services.store.update_artist(ctx.user_id(), &body).await?;
    Ok(Json(json!({ "artist": artist })).into_response())
}

/// PUT /profiles/studio - only the owner of a studio
pub async fn update_studio(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<StudioUpdate>,
) -> ApiResult {
    require(&ctx, &studios::UPDATE)?;
    if ctx.user().studio_id.is_none() {
        return Err(ApiError::not_found("studio"));
    }
    if body.capacity.is_some_and(|c| c < 0)
        || body.price_per_hour.is_some_and(|p| p < 0)
        || body.rental_fee_per_class.is_some_and(|p| p < 0)
    {
        return Err(ApiError::validation("capacity and prices must not be negative"));
    }
    let studio = services.store.update_studio(ctx.user_id(), &body).await?;
    Ok(Json(json!({ "studio": studio })).into_response())
}

/// PUT /profiles/student - creates the student row on first use
pub async fn update_student(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<StudentUpdate>,
) -> ApiResult {
    require(&ctx, &users::UPDATE)?;
    let student = services.store.upsert_student(ctx.user_id(), &body).await?;
    Ok(Json(json!({ "student": student })).into_response())
}
