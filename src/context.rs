/// Application context and dependency injection
use crate::{
    account::SessionManager,
    audit::AuditRecorder,
    config::ServerConfig,
    db,
    error::{ApiError, ApiResult},
    reports::ReportStore,
    users::UserStore,
    worksheets::WorksheetStore,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub sessions: Arc<SessionManager>,
    pub users: Arc<UserStore>,
    pub worksheets: Arc<WorksheetStore>,
    pub reports: Arc<ReportStore>,
    pub audit: Arc<AuditRecorder>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.storage.data_directory)
            .await
            .map_err(|e| {
                ApiError::Internal(format!(
                    "Failed to create data directory {}: {}",
                    config.storage.data_directory.display(),
                    e
                ))
            })?;

        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::test_connection(&pool).await?;
        db::schema::create_schema(&pool).await?;
        db::seed::seed_roles(&pool).await?;
        db::seed::bootstrap_admin(&pool, &config).await?;

        Ok(Self::from_pool(config, pool))
    }

    /// Assemble the context around an existing pool. The schema and seed
    /// data must already be in place; used directly by the test harness.
    pub fn from_pool(config: ServerConfig, pool: SqlitePool) -> Self {
        let config = Arc::new(config);
        let audit = AuditRecorder::new(pool.clone());
        let sessions = Arc::new(SessionManager::new(
            pool.clone(),
            Arc::clone(&config),
            audit.clone(),
        ));
        let users = Arc::new(UserStore::new(pool.clone(), audit.clone()));
        let worksheets = Arc::new(WorksheetStore::new(pool.clone(), audit.clone()));
        let reports = Arc::new(ReportStore::new(pool.clone(), audit.clone()));

        AppContext {
            config,
            db: pool,
            sessions,
            users,
            worksheets,
            reports,
            audit: Arc::new(audit),
        }
    }
}
