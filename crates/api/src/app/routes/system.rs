use axum::{extract::Extension, response::IntoResponse, Json};
use serde_json::json;

use crate::context::SessionContext;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn whoami(Extension(ctx): Extension<SessionContext>) -> impl IntoResponse {
    let user = ctx.user();
    Json(json!({
        "userId": ctx.user_id(),
        "sessionId": ctx.session_id(),
        "userType": user.user_type,
        "roles": user.roles,
    }))
}
