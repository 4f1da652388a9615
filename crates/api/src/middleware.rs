use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use shor_auth::{ClientInfo, IdentityProvider, SessionEnricher};

use crate::app::errors::ApiError;
use crate::context::SessionContext;

#[derive(Clone)]
pub struct AuthState {
    pub identity: Arc<dyn IdentityProvider>,
    pub enricher: Arc<dyn SessionEnricher>,
}

/// Resolve the bearer token to an enriched session, or reject with 401.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())
        .ok_or_else(|| ApiError::Unauthenticated("missing bearer token".into()))?;

    let (session, user) = state
        .identity
        .get_session(token)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("invalid or expired session".into()))?;
    debug!(user_id = %user.id, session_id = %session.id, "session resolved");

    let enriched = state.enricher.enrich(user, session).await;
    req.extensions_mut().insert(SessionContext::new(enriched));

    Ok(next.run(req).await)
}

/// `Authorization: Bearer <token>`, when present and non-empty.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Request metadata recorded on sessions and audit entries.
pub fn client_info(headers: &HeaderMap) -> ClientInfo {
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    ClientInfo {
        ip_address: text("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string())),
        user_agent: text(header::USER_AGENT.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_requires_prefix_and_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_bearer(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok123"));
        assert_eq!(extract_bearer(&headers), Some("tok123"));
    }

    #[test]
    fn client_info_takes_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.7, 172.16.0.1"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.0"));
        let info = client_info(&headers);
        assert_eq!(info.ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(info.user_agent.as_deref(), Some("curl/8.0"));
    }
}
