/// Shared fixtures for inline tests
use crate::account::{password, AuthUser};
use crate::authz::Role;
use crate::config::{AuthConfig, LoggingConfig, ServerConfig, ServiceConfig, StorageConfig};
use crate::db;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Password used by every fixture account
pub const TEST_PASSWORD: &str = "Password@123";

/// A complete configuration suitable for issuing tokens in tests
pub fn test_config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "localhost".to_string(),
            port: 8080,
        },
        storage: StorageConfig {
            data_directory: "./data".into(),
            database: ":memory:".into(),
        },
        authentication: AuthConfig {
            jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
            access_token_minutes: 60,
            refresh_token_days: 7,
            bootstrap_admin_password: None,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
        },
    }
}

/// In-memory pool with the schema applied and roles seeded
pub async fn setup_pool() -> SqlitePool {
    let pool = db::create_memory_pool().await.unwrap();
    db::schema::create_schema(&pool).await.unwrap();
    db::seed::seed_roles(&pool).await.unwrap();
    pool
}

pub async fn insert_department(pool: &SqlitePool, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO departments (id, name, is_active, created_at) VALUES (?1, ?2, 1, ?3)",
    )
    .bind(id)
    .bind(name)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();
    id
}

/// Insert an active user with [`TEST_PASSWORD`] and return it as the
/// authenticated principal it would become after login
pub async fn insert_user(
    pool: &SqlitePool,
    username: &str,
    role: Role,
    department_id: Option<Uuid>,
) -> AuthUser {
    let id = Uuid::new_v4();
    let hash = password::hash_password(TEST_PASSWORD).unwrap();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO users
            (id, username, password_hash, role, department_id, is_active,
             force_password_change, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 1, 0, ?6, ?6)
        "#,
    )
    .bind(id)
    .bind(username)
    .bind(hash)
    .bind(role.as_str())
    .bind(department_id)
    .bind(now)
    .execute(pool)
    .await
    .unwrap();

    AuthUser {
        id,
        username: username.to_string(),
        role,
        department_id,
        permissions: role.default_permissions(),
    }
}
