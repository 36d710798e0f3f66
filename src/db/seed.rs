/// Seed data: the closed role set and an optional bootstrap admin
use crate::account::password;
use crate::authz::Role;
use crate::config::ServerConfig;
use crate::error::ApiResult;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Insert or refresh the five portal roles with their default permission maps
pub async fn seed_roles(pool: &SqlitePool) -> ApiResult<()> {
    for role in Role::all() {
        let permissions = role.default_permissions().to_json()?;

        sqlx::query(
            r#"
            INSERT INTO roles (name, description, permissions)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET
                description = excluded.description,
                permissions = excluded.permissions
            "#,
        )
        .bind(role.as_str())
        .bind(role.description())
        .bind(permissions)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Create the initial admin account when the users table is empty and a
/// bootstrap password is configured
pub async fn bootstrap_admin(pool: &SqlitePool, config: &ServerConfig) -> ApiResult<()> {
    let Some(ref admin_password) = config.authentication.bootstrap_admin_password else {
        return Ok(());
    };

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Ok(());
    }

    let password_hash = password::hash_password(admin_password)?;
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO users
            (id, username, email, password_hash, first_name, last_name, role,
             is_active, force_password_change, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, 1, ?8, ?8)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind("admin")
    .bind(Option::<String>::None)
    .bind(password_hash)
    .bind("System")
    .bind("Administrator")
    .bind(Role::Admin.as_str())
    .bind(now)
    .execute(pool)
    .await?;

    tracing::info!("Bootstrap admin account created");

    Ok(())
}
