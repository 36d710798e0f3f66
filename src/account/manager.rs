/// Session issuance and password lifecycle
use super::{
    password, AccessClaims, AuthUser, ChangePasswordRequest, LoginRequest, LogoutRequest,
    RefreshClaims, RefreshRequest, RefreshResponse, ResetPasswordRequest, SessionTokens,
};
use crate::audit::{AuditRecorder, SourceMeta};
use crate::authz::{PermissionMap, Role};
use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::users::User;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

/// Clock skew tolerance when validating token timestamps, in seconds
const LEEWAY_SECS: u64 = 300;

/// Manages login sessions, refresh tokens, and password changes
#[derive(Clone)]
pub struct SessionManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
    audit: AuditRecorder,
}

impl SessionManager {
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>, audit: AuditRecorder) -> Self {
        Self { db, config, audit }
    }

    /// Authenticate a principal and issue an access/refresh token pair.
    ///
    /// Unknown username, wrong password, and deactivated account all fail
    /// with the same undifferentiated 401 so the response does not reveal
    /// which accounts exist.
    pub async fn login(&self, req: &LoginRequest, meta: &SourceMeta) -> ApiResult<SessionTokens> {
        let row = sqlx::query(
            r#"
            SELECT u.id, u.username, u.email, u.password_hash, u.first_name,
                   u.last_name, u.role, u.department_id, d.name AS department_name,
                   u.manager_id, u.is_active, u.last_login, u.force_password_change,
                   u.created_at, u.updated_at
            FROM users u
            LEFT JOIN departments d ON u.department_id = d.id
            WHERE u.username = ? AND u.is_active = 1
            "#,
        )
        .bind(&req.username)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            tracing::warn!(username = %req.username, "Login failed: unknown or inactive account");
            return Err(ApiError::Authentication("Invalid credentials".to_string()));
        };

        let stored_hash: String = row.get("password_hash");
        if !password::verify_password(&req.password, &stored_hash) {
            tracing::warn!(username = %req.username, "Login failed: bad password");
            return Err(ApiError::Authentication("Invalid credentials".to_string()));
        }

        let mut user = User::from_row(&row)?;
        let permissions = self.permissions_for_role(user.role).await?;

        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(now)
            .bind(user.id)
            .execute(&self.db)
            .await?;
        user.last_login = Some(now);

        let access_token = self.generate_access_token(&user, &permissions)?;
        let refresh_token = self.issue_refresh_token(user.id).await?;

        self.audit
            .record(Some(user.id), "LOGIN", "user", Some(user.id), None, None, meta)
            .await;

        tracing::info!(username = %user.username, role = %user.role, "Login succeeded");

        Ok(SessionTokens {
            force_password_change: user.force_password_change,
            access_token,
            refresh_token,
            user,
        })
    }

    /// Exchange a valid refresh token for a new access token. The refresh
    /// token itself is not rotated and stays valid until logout or expiry.
    pub async fn refresh(&self, req: &RefreshRequest) -> ApiResult<RefreshResponse> {
        let claims = self.decode_refresh_token(&req.refresh_token)?;

        // The token must still be on record: logout and password changes
        // revoke persisted rows even before the JWT itself expires
        let expires_at: Option<chrono::DateTime<Utc>> = sqlx::query_scalar(
            "SELECT expires_at FROM refresh_tokens WHERE token = ? AND user_id = ?",
        )
        .bind(&req.refresh_token)
        .bind(claims.sub)
        .fetch_optional(&self.db)
        .await?;

        match expires_at {
            Some(expires_at) if expires_at > Utc::now() => {}
            _ => {
                return Err(ApiError::Authentication(
                    "Invalid or expired token".to_string(),
                ))
            }
        }

        let row = sqlx::query(
            r#"
            SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.role,
                   u.department_id, d.name AS department_name, u.manager_id,
                   u.is_active, u.last_login, u.force_password_change,
                   u.created_at, u.updated_at
            FROM users u
            LEFT JOIN departments d ON u.department_id = d.id
            WHERE u.id = ? AND u.is_active = 1
            "#,
        )
        .bind(claims.sub)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ApiError::Authentication("Invalid or expired token".to_string()))?;

        let user = User::from_row(&row)?;
        let permissions = self.permissions_for_role(user.role).await?;
        let access_token = self.generate_access_token(&user, &permissions)?;

        Ok(RefreshResponse { access_token })
    }

    /// Revoke a refresh token. Unknown or absent tokens are a no-op: logout
    /// is idempotent.
    pub async fn logout(
        &self,
        actor: Option<&AuthUser>,
        req: &LogoutRequest,
        meta: &SourceMeta,
    ) -> ApiResult<()> {
        if let Some(ref token) = req.refresh_token {
            sqlx::query("DELETE FROM refresh_tokens WHERE token = ?")
                .bind(token)
                .execute(&self.db)
                .await?;
        }

        if let Some(actor) = actor {
            self.audit
                .record(Some(actor.id), "LOGOUT", "user", Some(actor.id), None, None, meta)
                .await;
        }

        Ok(())
    }

    /// Change the caller's own password. Requires the current password and
    /// revokes every refresh token the principal holds.
    pub async fn change_password(
        &self,
        actor: &AuthUser,
        req: &ChangePasswordRequest,
        meta: &SourceMeta,
    ) -> ApiResult<()> {
        let stored_hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
                .bind(actor.id)
                .fetch_optional(&self.db)
                .await?;

        let Some(stored_hash) = stored_hash else {
            return Err(ApiError::Authentication("Invalid credentials".to_string()));
        };
        if !password::verify_password(&req.current_password, &stored_hash) {
            return Err(ApiError::Authentication(
                "Current password is incorrect".to_string(),
            ));
        }

        password::require_strength(&req.new_password)?;
        let new_hash = password::hash_password(&req.new_password)?;
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, force_password_change = 0,
                password_changed_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(new_hash)
        .bind(now)
        .bind(now)
        .bind(actor.id)
        .execute(&self.db)
        .await?;

        // Every outstanding session must re-authenticate
        self.revoke_all_tokens(actor.id).await?;

        self.audit
            .record(
                Some(actor.id),
                "PASSWORD_CHANGED",
                "user",
                Some(actor.id),
                None,
                None,
                meta,
            )
            .await;

        Ok(())
    }

    /// Admin-initiated password reset for another principal. The target is
    /// forced to change the password at next login unless the request says
    /// otherwise.
    pub async fn reset_password(
        &self,
        actor: &AuthUser,
        req: &ResetPasswordRequest,
        meta: &SourceMeta,
    ) -> ApiResult<()> {
        match actor.role {
            Role::Admin => {}
            Role::DepartmentManager | Role::TeamLead | Role::Employee | Role::Auditor => {
                return Err(ApiError::Authorization(
                    "Only administrators can reset passwords".to_string(),
                ))
            }
        }

        password::require_strength(&req.new_password)?;
        let new_hash = password::hash_password(&req.new_password)?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, force_password_change = ?,
                password_changed_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(new_hash)
        .bind(req.force_change.unwrap_or(true))
        .bind(now)
        .bind(now)
        .bind(req.user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("User not found".to_string()));
        }

        self.revoke_all_tokens(req.user_id).await?;

        self.audit
            .record(
                Some(actor.id),
                "PASSWORD_RESET",
                "user",
                Some(req.user_id),
                None,
                None,
                meta,
            )
            .await;

        Ok(())
    }

    /// Delete every refresh token a principal holds
    pub async fn revoke_all_tokens(&self, user_id: Uuid) -> ApiResult<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Remove expired refresh token rows; run periodically in the background
    pub async fn clean_expired_tokens(&self) -> ApiResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(Utc::now())
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    /// Decode and validate an access token
    pub fn decode_access_token(&self, token: &str) -> ApiResult<AccessClaims> {
        let mut validation = Validation::default();
        validation.leeway = LEEWAY_SECS;

        let data = decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|_| ApiError::Authentication("Invalid or expired token".to_string()))?;

        if data.claims.token_use != "access" {
            return Err(ApiError::Authentication(
                "Invalid or expired token".to_string(),
            ));
        }

        Ok(data.claims)
    }

    /// Re-load the authenticated principal from storage. Claims alone are
    /// not trusted for authorization: deactivation and role changes take
    /// effect on the next request, not at token expiry.
    pub async fn load_auth_user(&self, user_id: Uuid) -> ApiResult<AuthUser> {
        let row = sqlx::query(
            "SELECT id, username, role, department_id FROM users WHERE id = ? AND is_active = 1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ApiError::Authentication("Invalid or expired token".to_string()))?;

        let role_str: String = row.get("role");
        let role = Role::from_str(&role_str)?;
        let permissions = self.permissions_for_role(role).await?;

        Ok(AuthUser {
            id: row.get("id"),
            username: row.get("username"),
            role,
            department_id: row.get("department_id"),
            permissions,
        })
    }

    async fn permissions_for_role(&self, role: Role) -> ApiResult<PermissionMap> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT permissions FROM roles WHERE name = ?")
                .bind(role.as_str())
                .fetch_optional(&self.db)
                .await?;

        match raw {
            Some(raw) => PermissionMap::from_json(&raw),
            None => Ok(role.default_permissions()),
        }
    }

    fn generate_access_token(&self, user: &User, permissions: &PermissionMap) -> ApiResult<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            department_id: user.department_id,
            permissions: permissions.clone(),
            token_use: "access".to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.config.authentication.access_token_minutes))
                .timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))
    }

    async fn issue_refresh_token(&self, user_id: Uuid) -> ApiResult<String> {
        let now = Utc::now();
        let expires_at = now + Duration::days(self.config.authentication.refresh_token_days);
        let claims = RefreshClaims {
            sub: user_id,
            jti: Uuid::new_v4(),
            token_use: "refresh".to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))?;

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token, expires_at, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&token)
        .bind(expires_at)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(token)
    }

    fn decode_refresh_token(&self, token: &str) -> ApiResult<RefreshClaims> {
        let mut validation = Validation::default();
        validation.leeway = LEEWAY_SECS;

        let data = decode::<RefreshClaims>(
            token,
            &DecodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|_| ApiError::Authentication("Invalid or expired token".to_string()))?;

        if data.claims.token_use != "refresh" {
            return Err(ApiError::Authentication(
                "Invalid or expired token".to_string(),
            ));
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    async fn setup() -> (SqlitePool, SessionManager) {
        let pool = testutil::setup_pool().await;
        let config = Arc::new(testutil::test_config());
        let audit = AuditRecorder::new(pool.clone());
        let manager = SessionManager::new(pool.clone(), config, audit);
        (pool, manager)
    }

    fn login_req(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_issues_tokens_and_audits() {
        let (pool, manager) = setup().await;
        testutil::insert_user(&pool, "jdoe", Role::Employee, None).await;

        let session = manager
            .login(&login_req("jdoe", testutil::TEST_PASSWORD), &SourceMeta::default())
            .await
            .unwrap();

        assert_eq!(session.user.username, "jdoe");
        assert!(!session.force_password_change);
        assert!(session.user.last_login.is_some());

        let claims = manager.decode_access_token(&session.access_token).unwrap();
        assert_eq!(claims.sub, session.user.id);
        assert_eq!(claims.role, Role::Employee);
        assert_eq!(claims.token_use, "access");

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs WHERE action = 'LOGIN'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_bad_password_and_unknown_user_look_identical() {
        let (pool, manager) = setup().await;
        testutil::insert_user(&pool, "jdoe", Role::Employee, None).await;

        let wrong = manager
            .login(&login_req("jdoe", "Wrong@Pass1"), &SourceMeta::default())
            .await
            .unwrap_err();
        let unknown = manager
            .login(&login_req("nobody", testutil::TEST_PASSWORD), &SourceMeta::default())
            .await
            .unwrap_err();

        assert_eq!(wrong.to_string(), unknown.to_string());
        assert!(matches!(wrong, ApiError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_inactive_account_cannot_login() {
        let (pool, manager) = setup().await;
        let user = testutil::insert_user(&pool, "jdoe", Role::Employee, None).await;
        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
            .bind(user.id)
            .execute(&pool)
            .await
            .unwrap();

        let err = manager
            .login(&login_req("jdoe", testutil::TEST_PASSWORD), &SourceMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_refresh_returns_new_access_without_rotating() {
        let (pool, manager) = setup().await;
        testutil::insert_user(&pool, "jdoe", Role::Employee, None).await;

        let session = manager
            .login(&login_req("jdoe", testutil::TEST_PASSWORD), &SourceMeta::default())
            .await
            .unwrap();

        let req = RefreshRequest {
            refresh_token: session.refresh_token.clone(),
        };
        let refreshed = manager.refresh(&req).await.unwrap();
        manager.decode_access_token(&refreshed.access_token).unwrap();

        // Same refresh token keeps working until logout or expiry
        manager.refresh(&req).await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_rejected_after_logout() {
        let (pool, manager) = setup().await;
        let user = testutil::insert_user(&pool, "jdoe", Role::Employee, None).await;

        let session = manager
            .login(&login_req("jdoe", testutil::TEST_PASSWORD), &SourceMeta::default())
            .await
            .unwrap();

        let logout = LogoutRequest {
            refresh_token: Some(session.refresh_token.clone()),
        };
        manager
            .logout(Some(&user), &logout, &SourceMeta::default())
            .await
            .unwrap();
        // Logging out twice is fine
        manager
            .logout(Some(&user), &logout, &SourceMeta::default())
            .await
            .unwrap();

        let err = manager
            .refresh(&RefreshRequest {
                refresh_token: session.refresh_token,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_access_token_cannot_be_used_as_refresh() {
        let (pool, manager) = setup().await;
        testutil::insert_user(&pool, "jdoe", Role::Employee, None).await;

        let session = manager
            .login(&login_req("jdoe", testutil::TEST_PASSWORD), &SourceMeta::default())
            .await
            .unwrap();

        let err = manager
            .refresh(&RefreshRequest {
                refresh_token: session.access_token,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_change_password_revokes_all_sessions() {
        let (pool, manager) = setup().await;
        let user = testutil::insert_user(&pool, "jdoe", Role::Employee, None).await;

        // Two concurrent sessions
        let first = manager
            .login(&login_req("jdoe", testutil::TEST_PASSWORD), &SourceMeta::default())
            .await
            .unwrap();
        manager
            .login(&login_req("jdoe", testutil::TEST_PASSWORD), &SourceMeta::default())
            .await
            .unwrap();

        let req = ChangePasswordRequest {
            current_password: testutil::TEST_PASSWORD.to_string(),
            new_password: "N3w$ecret!".to_string(),
        };
        manager
            .change_password(&user, &req, &SourceMeta::default())
            .await
            .unwrap();

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM refresh_tokens WHERE user_id = ?")
                .bind(user.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(remaining, 0);

        let err = manager
            .refresh(&RefreshRequest {
                refresh_token: first.refresh_token,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Authentication(_)));

        // Old password is gone, new one works
        assert!(manager
            .login(&login_req("jdoe", testutil::TEST_PASSWORD), &SourceMeta::default())
            .await
            .is_err());
        manager
            .login(&login_req("jdoe", "N3w$ecret!"), &SourceMeta::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_change_password_requires_current() {
        let (pool, manager) = setup().await;
        let user = testutil::insert_user(&pool, "jdoe", Role::Employee, None).await;

        let req = ChangePasswordRequest {
            current_password: "Wrong@Pass1".to_string(),
            new_password: "N3w$ecret!".to_string(),
        };
        let err = manager
            .change_password(&user, &req, &SourceMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_weak_new_password_reports_failed_rules() {
        let (pool, manager) = setup().await;
        let user = testutil::insert_user(&pool, "jdoe", Role::Employee, None).await;

        let req = ChangePasswordRequest {
            current_password: testutil::TEST_PASSWORD.to_string(),
            new_password: "weak".to_string(),
        };
        let err = manager
            .change_password(&user, &req, &SourceMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationDetailed { .. }));
    }

    #[tokio::test]
    async fn test_reset_password_admin_only_and_forces_change() {
        let (pool, manager) = setup().await;
        let admin = testutil::insert_user(&pool, "admin", Role::Admin, None).await;
        let employee = testutil::insert_user(&pool, "jdoe", Role::Employee, None).await;

        let req = ResetPasswordRequest {
            user_id: employee.id,
            new_password: "N3w$ecret!".to_string(),
            force_change: None,
        };
        let err = manager
            .reset_password(&employee, &req, &SourceMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));

        manager
            .reset_password(&admin, &req, &SourceMeta::default())
            .await
            .unwrap();

        let session = manager
            .login(&login_req("jdoe", "N3w$ecret!"), &SourceMeta::default())
            .await
            .unwrap();
        assert!(session.force_password_change);
    }

    #[tokio::test]
    async fn test_reset_password_unknown_user_not_found() {
        let (pool, manager) = setup().await;
        let admin = testutil::insert_user(&pool, "admin", Role::Admin, None).await;

        let req = ResetPasswordRequest {
            user_id: Uuid::new_v4(),
            new_password: "N3w$ecret!".to_string(),
            force_change: None,
        };
        let err = manager
            .reset_password(&admin, &req, &SourceMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_clean_expired_tokens() {
        let (pool, manager) = setup().await;
        let user = testutil::insert_user(&pool, "jdoe", Role::Employee, None).await;

        manager
            .login(&login_req("jdoe", testutil::TEST_PASSWORD), &SourceMeta::default())
            .await
            .unwrap();
        // Backdate an extra token past its expiry
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token, expires_at, created_at) VALUES (?1, ?2, 'stale', ?3, ?3)",
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(Utc::now() - Duration::days(1))
        .execute(&pool)
        .await
        .unwrap();

        let removed = manager.clean_expired_tokens().await.unwrap();
        assert_eq!(removed, 1);

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM refresh_tokens")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn test_load_auth_user_rejects_deactivated() {
        let (pool, manager) = setup().await;
        let user = testutil::insert_user(&pool, "jdoe", Role::Employee, None).await;

        let loaded = manager.load_auth_user(user.id).await.unwrap();
        assert_eq!(loaded.role, Role::Employee);

        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
            .bind(user.id)
            .execute(&pool)
            .await
            .unwrap();

        let err = manager.load_auth_user(user.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Authentication(_)));
    }
}
