/// Database layer for workdesk
///
/// Manages the SQLite connection pool and schema setup. The schema is
/// created at startup with idempotent statements; seeding fills in the
/// closed role set and an optional bootstrap admin.

pub mod schema;
pub mod seed;

use crate::error::ApiResult;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> ApiResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .connect_with(
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(if options.enable_wal {
                    sqlx::sqlite::SqliteJournalMode::Wal
                } else {
                    sqlx::sqlite::SqliteJournalMode::Delete
                })
                .foreign_keys(true)
                .busy_timeout(std::time::Duration::from_secs(5)),
        )
        .await?;

    Ok(pool)
}

/// Create a single-connection in-memory pool, used by the test suites
pub async fn create_memory_pool() -> ApiResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            sqlx::sqlite::SqliteConnectOptions::new()
                .in_memory(true)
                .foreign_keys(true),
        )
        .await?;

    Ok(pool)
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> ApiResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pool_connects() {
        let pool = create_memory_pool().await.unwrap();
        test_connection(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = create_memory_pool().await.unwrap();
        schema::create_schema(&pool).await.unwrap();
        schema::create_schema(&pool).await.unwrap();
        test_connection(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_pool_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal.sqlite");

        let pool = create_pool(&path, DatabaseOptions::default()).await.unwrap();
        schema::create_schema(&pool).await.unwrap();
        test_connection(&pool).await.unwrap();
        assert!(path.exists());
    }
}
