//! Identity endpoints: registration, sign-in, sessions and token flows.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use tracing::info;
use validator::Validate;

use shor_core::SessionId;
use shor_infra::Registration;

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::parse_id;
use crate::app::services::AppServices;
use crate::context::SessionContext;
use crate::middleware::{client_info, extract_bearer};

pub fn public_router() -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/resend-verification", post(resend_verification))
}

pub fn router() -> Router {
    Router::new()
        .route("/auth/me", get(me).put(update_me))
        .route("/auth/change-password", post(change_password))
        .route("/auth/sessions", get(list_sessions).delete(revoke_other_sessions))
        .route("/auth/sessions/:id", delete(revoke_session))
}

fn success() -> ApiResult {
    Ok(Json(json!({ "success": true })).into_response())
}

/// POST /auth/register
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Json(body): Json<Registration>,
) -> ApiResult {
    let registered = services.registrar.register(body, client_info(&headers)).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "token": registered.token,
            "role": registered.role,
            "user": registered.session.user,
            "session": registered.session.session,
        })),
    )
        .into_response())
}

/// POST /auth/login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Json(body): Json<dto::LoginRequest>,
) -> ApiResult {
    body.validate()?;
    let signed = services
        .identity
        .sign_in(&body.email, &body.password, &client_info(&headers))
        .await?;
    let token = signed.session.token.clone();
    let enriched = services.enricher.enrich(signed.user, signed.session).await;
    Ok(Json(json!({
        "token": token,
        "user": enriched.user,
        "session": enriched.session,
    }))
    .into_response())
}

/// POST /auth/logout. Succeeds with or without a session.
pub async fn logout(Extension(services): Extension<Arc<AppServices>>, headers: HeaderMap) -> ApiResult {
    if let Some(token) = extract_bearer(&headers) {
        services.identity.sign_out(token).await?;
    }
    success()
}

/// GET /auth/me
pub async fn me(Extension(ctx): Extension<SessionContext>) -> ApiResult {
    let enriched = ctx.enriched();
    Ok(Json(json!({
        "user": enriched.user,
        "session": enriched.session,
    }))
    .into_response())
}

/// PUT /auth/me
pub async fn update_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<dto::UpdateProfileRequest>,
) -> ApiResult {
    body.validate()?;
    let update = body.into_update();
    if update.is_empty() {
        return Err(ApiError::validation("no profile fields to update"));
    }
    let user = services.store.update_profile(ctx.user_id(), &update).await?;
    Ok(Json(json!({ "user": user })).into_response())
}

/// POST /auth/change-password. Other sessions of the user are revoked.
pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<dto::ChangePasswordRequest>,
) -> ApiResult {
    body.validate()?;
    services
        .identity
        .change_password(
            ctx.user_id(),
            &body.current_password,
            &body.new_password,
            Some(ctx.session_id()),
        )
        .await?;
    success()
}

/// GET /auth/sessions
pub async fn list_sessions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
) -> ApiResult {
    let sessions = services.identity.list_sessions(ctx.user_id()).await?;
    Ok(Json(json!({
        "sessions": sessions,
        "currentSessionId": ctx.session_id(),
    }))
    .into_response())
}

/// DELETE /auth/sessions/:id
pub async fn revoke_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let session_id: SessionId = parse_id(&id)?;
    if !services.identity.revoke_session(ctx.user_id(), session_id).await? {
        return Err(ApiError::not_found("session"));
    }
    success()
}

/// DELETE /auth/sessions. Revokes every session except the current one.
pub async fn revoke_other_sessions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
) -> ApiResult {
    let revoked = services
        .identity
        .revoke_sessions(ctx.user_id(), Some(ctx.session_id()))
        .await?;
    info!(user_id = %ctx.user_id(), revoked, "other sessions revoked");
    Ok(Json(json!({ "revoked": revoked })).into_response())
}

/// POST /auth/forgot-password. Unknown emails get the same answer.
pub async fn forgot_password(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::EmailRequest>,
) -> ApiResult {
    body.validate()?;
    services.identity.forget_password(&body.email).await?;
    success()
}

/// POST /auth/reset-password
pub async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ResetPasswordRequest>,
) -> ApiResult {
    body.validate()?;
    services
        .identity
        .reset_password(&body.token, &body.new_password)
        .await?;
    success()
}

/// POST /auth/verify-email
pub async fn verify_email(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::TokenRequest>,
) -> ApiResult {
    body.validate()?;
    let user = services.identity.verify_email(&body.token).await?;
    Ok(Json(json!({ "user": user })).into_response())
}

/// POST /auth/resend-verification
pub async fn resend_verification(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::EmailRequest>,
) -> ApiResult {
    body.validate()?;
    services.identity.send_verification_email(&body.email).await?;
    success()
}
