/// Authentication extractors and request metadata
use crate::{account::AuthUser, audit::SourceMeta, context::AppContext, error::ApiError};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// The authenticated principal, re-loaded from storage on every request so
/// deactivation and role changes take effect immediately
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppContext> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Authentication("Missing authorization header".to_string()))?;

        let claims = state.sessions.decode_access_token(&token)?;
        let user = state.sessions.load_auth_user(claims.sub).await?;

        Ok(CurrentUser(user))
    }
}

/// Client source metadata for audit records; never fails
#[derive(Debug, Clone)]
pub struct ClientMeta(pub SourceMeta);

#[async_trait]
impl FromRequestParts<AppContext> for ClientMeta {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let ip_address = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string());
        let user_agent = parts
            .headers
            .get("user-agent")
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        Ok(ClientMeta(SourceMeta {
            ip_address,
            user_agent,
        }))
    }
}
