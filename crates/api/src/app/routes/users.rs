use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::info;

use shor_auth::permissions::users;
use shor_core::UserId;
use shor_infra::model::AuditContext;

use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::parse_id;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::SessionContext;
use crate::middleware::client_info;

pub fn router() -> Router {
    Router::new().route("/:id", get(get_user).delete(deactivate_user))
}

/// GET /users/:id
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&ctx, &users::READ)?;
    let id: UserId = parse_id(&id)?;
    let user = services
        .store
        .find_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("user"))?;
    Ok(Json(json!({ "user": user })).into_response())
}

/// DELETE /users/:id - soft deactivation; the user's sessions are dropped
pub async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult {
    require(&ctx, &users::DELETE)?;
    let id: UserId = parse_id(&id)?;
    let audit = AuditContext::new(Some(ctx.user_id()), client_info(&headers));
    let user = services.store.deactivate_user(id, &audit).await?;
    info!(user_id = %id, by = %ctx.user_id(), "user deactivated");
    Ok(Json(json!({ "user": user })).into_response())
}
