//! Gigs and gig applications.

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

use shor_auth::permissions::{gig_applications, gigs};
use shor_core::{GigApplicationId, GigId};
use shor_infra::model::{ApplicationReview, Gig, GigFilter, NewGig, NewGigApplication};

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::parse_id;
use crate::app::services::AppServices;
use crate::authz::{require, require_owner};
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_gigs).post(create_gig))
        .route("/:id", get(get_gig).delete(cancel_gig))
        .route("/:id/applications", get(list_applications).post(apply))
        .route("/:id/applications/:application_id/review", post(review_application))
}

async fn load_gig(services: &AppServices, raw: &str) -> Result<Gig, ApiError> {
    let id: GigId = parse_id(raw)?;
    services
        .store
        .find_gig(id)
        .await?
        .ok_or_else(|| ApiError::not_found("gig"))
}

/// GET /gigs?city=&status=&danceForm=&page=&limit=
pub async fn list_gigs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Query(filter): Query<GigFilter>,
    Query(page): Query<dto::PageQuery>,
) -> ApiResult {
    require(&ctx, &gigs::READ)?;
    let page = page.page();
    let gigs = services.store.list_gigs(&filter, page).await?;
    Ok(Json(json!({
        "gigs": gigs,
        "page": page.page,
        "limit": page.limit,
    }))
    .into_response())
}

/// GET /gigs/:id
pub async fn get_gig(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&ctx, &gigs::READ)?;
    let gig = load_gig(&services, &id).await?;
    if !gig.is_active {
        return Err(ApiError::not_found("gig"));
    }
    Ok(Json(json!({ "gig": gig })).into_response())
}

/// POST /gigs - the caller hosts it
pub async fn create_gig(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Json(mut body): Json<NewGig>,
) -> ApiResult {
    require(&ctx, &gigs::CREATE)?;
    body.host_id = Some(ctx.user_id());
    let gig = services.store.create_gig(body).await?;
    info!(gig_id = %gig.id, host_id = %gig.host_id, "gig created");
    Ok((StatusCode::CREATED, Json(json!({ "gig": gig }))).into_response())
}

/// DELETE /gigs/:id - host or admin; the gig is cancelled and hidden
pub async fn cancel_gig(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&ctx, &gigs::DELETE)?;
    let gig = load_gig(&services, &id).await?;
    require_owner(&ctx, gig.host_id, "gig")?;
    let gig = services.store.cancel_gig(gig.id).await?;
    Ok(Json(json!({ "gig": gig })).into_response())
}

/// POST /gigs/:id/applications
pub async fn apply(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
    Json(mut body): Json<NewGigApplication>,
) -> ApiResult {
    require(&ctx, &gig_applications::CREATE)?;
    let gig_id: GigId = parse_id(&id)?;
    body.gig_id = Some(gig_id);
    body.user_id = Some(ctx.user_id());
    let application = services.store.apply_to_gig(body).await?;
    Ok((StatusCode::CREATED, Json(json!({ "application": application }))).into_response())
}

/// GET /gigs/:id/applications - host or admin
pub async fn list_applications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&ctx, &gig_applications::READ)?;
    let gig = load_gig(&services, &id).await?;
    require_owner(&ctx, gig.host_id, "gig")?;
    let applications = services.store.list_gig_applications(gig.id).await?;
    Ok(Json(json!({ "applications": applications })).into_response())
}

/// GET /applications - the caller's own applications
pub async fn list_my_applications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
) -> ApiResult {
    require(&ctx, &gig_applications::READ)?;
    let applications = services.store.list_user_applications(ctx.user_id()).await?;
    Ok(Json(json!({ "applications": applications })).into_response())
}

/// POST /gigs/:id/applications/:application_id/review - host only
pub async fn review_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path((id, application_id)): Path<(String, String)>,
    Json(body): Json<dto::ReviewApplicationRequest>,
) -> ApiResult {
    require(&ctx, &gig_applications::UPDATE)?;
    let gig = load_gig(&services, &id).await?;
    if gig.host_id != ctx.user_id() {
        return Err(ApiError::Forbidden("only the gig host can review applications".into()));
    }
    let application_id: GigApplicationId = parse_id(&application_id)?;
    let application = services
        .store
        .find_gig_application(application_id)
        .await?
        .filter(|a| a.gig_id == gig.id)
        .ok_or_else(|| ApiError::not_found("application"))?;

    let review = ApplicationReview {
        decision: body.status,
        reviewer: ctx.user_id(),
        notes: body.notes,
    };
    let (application, gig) = services.store.review_application(application.id, &review).await?;
    info!(application_id = %application.id, status = %application.status, "application reviewed");
    Ok(Json(json!({
        "application": application,
        "gig": gig,
    }))
    .into_response())
}
