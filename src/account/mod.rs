/// Credential and session management
///
/// Handles login, token refresh, logout, and password lifecycle operations.

mod manager;
pub mod password;

pub use manager::SessionManager;

use crate::authz::{PermissionMap, Role};
use crate::users::User;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Login request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Issued session tokens plus the authenticated profile
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub force_password_change: bool,
}

/// Token refresh request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh response: a new access token only; the refresh token is not rotated
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Logout request; a missing or unknown token is not an error
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Change-password request for the authenticated principal
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Admin-only password reset for another principal
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub user_id: Uuid,
    pub new_password: String,
    pub force_change: Option<bool>,
}

/// Claims embedded in a short-lived access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub department_id: Option<Uuid>,
    pub permissions: PermissionMap,
    pub token_use: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims embedded in a long-lived refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub jti: Uuid,
    pub token_use: String,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated principal attached to a request. Loaded from the store
/// on every request so deactivation and role changes take effect immediately.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub department_id: Option<Uuid>,
    pub permissions: PermissionMap,
}
