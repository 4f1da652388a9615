//! RBAC endpoints: catalog listing, grants, authorization explanations and
//! the audit log.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use serde_json::json;
use validator::Validate;

use shor_auth::permissions::{system, users};
use shor_auth::{explain_authorization, Permission, Principal};
use shor_core::UserId;
use shor_infra::model::AuditContext;

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::parse_id;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::SessionContext;
use crate::middleware::client_info;

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles))
        .route("/permissions", get(list_permissions).post(create_permission))
        .route("/explain", get(explain))
        .route("/users/:id/roles", get(user_roles).post(assign_role))
        .route("/users/:id/roles/:role", delete(revoke_role))
        .route("/users/:id/permissions", get(user_permissions))
}

fn audit_context(ctx: &SessionContext, headers: &HeaderMap) -> AuditContext {
    AuditContext::new(Some(ctx.user_id()), client_info(headers))
}

async fn existing_user(services: &AppServices, raw: &str) -> Result<UserId, ApiError> {
    let id: UserId = parse_id(raw)?;
    match services.store.find_user(id).await? {
        Some(_) => Ok(id),
        None => Err(ApiError::not_found("user")),
    }
}

/// GET /rbac/roles - every role with the permissions it grants
pub async fn list_roles(Extension(services): Extension<Arc<AppServices>>) -> ApiResult {
    let roles = services.store.list_roles().await?;
    Ok(Json(json!({ "roles": roles })).into_response())
}

/// GET /rbac/permissions - the action catalog
pub async fn list_permissions(Extension(services): Extension<Arc<AppServices>>) -> ApiResult {
    let permissions = services.store.list_actions().await?;
    Ok(Json(json!({ "permissions": permissions })).into_response())
}

/// POST /rbac/permissions - add an action to the catalog
pub async fn create_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    headers: HeaderMap,
    Json(body): Json<dto::CreateActionRequest>,
) -> ApiResult {
    require(&ctx, &system::MANAGE_PERMISSIONS)?;
    body.validate()?;
    let action = services
        .store
        .add_action(&body.into_action(), &audit_context(&ctx, &headers))
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "permission": action }))).into_response())
}

/// GET /rbac/explain?permission=X[&userId=Y]
///
/// Any caller may explain their own decisions; explaining someone else's
/// requires `read_user_roles`.
pub async fn explain(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Query(query): Query<dto::ExplainQuery>,
) -> ApiResult {
    query.validate()?;
    let principal = match query.user_id {
        Some(id) if id != ctx.user_id() => {
            require(&ctx, &users::READ_ROLES)?;
            if services.store.find_user(id).await?.is_none() {
                return Err(ApiError::not_found("user"));
            }
            Principal {
                user_id: id,
                roles: services.store.active_roles(id).await?,
                permissions: services.store.resolve_permissions(id).await?,
            }
        }
        _ => ctx.principal().clone(),
    };

    let required = Permission::new(query.permission);
    let granting = services.store.roles_granting(required.as_str()).await?;
    let explanation = explain_authorization(&principal, &required, |_| granting.clone());
    Ok(Json(json!({ "explanation": explanation })).into_response())
}

/// GET /rbac/users/:id/roles
pub async fn user_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&ctx, &users::READ_ROLES)?;
    let id = existing_user(&services, &id).await?;
    let roles = services.store.active_roles(id).await?;
    let grants = services.store.list_grants(id).await?;
    Ok(Json(json!({
        "userId": id,
        "roles": roles,
        "grants": grants,
    }))
    .into_response())
}

/// GET /rbac/users/:id/permissions
pub async fn user_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&ctx, &users::READ_ROLES)?;
    let id = existing_user(&services, &id).await?;
    let permissions = services.store.resolve_permissions(id).await?;
    Ok(Json(json!({
        "userId": id,
        "permissions": permissions,
    }))
    .into_response())
}

/// POST /rbac/users/:id/roles
pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<dto::AssignRoleRequest>,
) -> ApiResult {
    require(&ctx, &users::MANAGE_ROLES)?;
    body.validate()?;
    let id: UserId = parse_id(&id)?;
    let grant = services
        .store
        .assign_role(id, body.role.trim(), body.notes, &audit_context(&ctx, &headers))
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "grant": grant }))).into_response())
}

/// DELETE /rbac/users/:id/roles/:role - soft revoke
pub async fn revoke_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    headers: HeaderMap,
    Path((id, role)): Path<(String, String)>,
) -> ApiResult {
    require(&ctx, &users::MANAGE_ROLES)?;
    let id: UserId = parse_id(&id)?;
    let grant = services
        .store
        .revoke_role(id, &role, &audit_context(&ctx, &headers))
        .await?;
    Ok(Json(json!({ "grant": grant })).into_response())
}

/// GET /audit-log
pub async fn list_audit_log(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Query(query): Query<dto::AuditLogQuery>,
) -> ApiResult {
    require(&ctx, &system::READ_AUDIT_LOG)?;
    let query = query.into_query();
    let entries = services.store.list_audit(&query).await?;
    Ok(Json(json!({
        "entries": entries,
        "page": query.page.page,
        "limit": query.page.limit,
    }))
    .into_response())
}
