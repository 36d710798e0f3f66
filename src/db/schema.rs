/// Schema setup
///
/// Idempotent table and index creation, run once at startup. User ids and
/// other entity ids are UUIDs; authorship columns use ON DELETE SET NULL so
/// deleting a user keeps their worksheets and reports, while refresh tokens
/// cascade away with their owner.
use crate::error::ApiResult;
use sqlx::SqlitePool;

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS departments (
        id BLOB PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        name TEXT PRIMARY KEY,
        description TEXT,
        permissions TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BLOB PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT UNIQUE,
        password_hash TEXT NOT NULL,
        first_name TEXT,
        last_name TEXT,
        role TEXT NOT NULL REFERENCES roles(name),
        department_id BLOB REFERENCES departments(id) ON DELETE SET NULL,
        manager_id BLOB REFERENCES users(id) ON DELETE SET NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        last_login TEXT,
        password_changed_at TEXT,
        force_password_change INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS refresh_tokens (
        id BLOB PRIMARY KEY,
        user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        token TEXT NOT NULL UNIQUE,
        expires_at TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS worksheets (
        id BLOB PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        created_by BLOB REFERENCES users(id) ON DELETE SET NULL,
        department_id BLOB REFERENCES departments(id) ON DELETE SET NULL,
        assigned_to BLOB REFERENCES users(id) ON DELETE SET NULL,
        priority TEXT NOT NULL DEFAULT 'medium',
        status TEXT NOT NULL DEFAULT 'draft',
        progress INTEGER NOT NULL DEFAULT 0,
        start_date TEXT,
        due_date TEXT,
        submitted_at TEXT,
        approved_by BLOB REFERENCES users(id) ON DELETE SET NULL,
        approved_at TEXT,
        approval_comment TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reports (
        id BLOB PRIMARY KEY,
        title TEXT NOT NULL,
        report_type TEXT NOT NULL DEFAULT 'custom',
        created_by BLOB REFERENCES users(id) ON DELETE SET NULL,
        department_id BLOB REFERENCES departments(id) ON DELETE SET NULL,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        summary TEXT,
        status TEXT NOT NULL DEFAULT 'draft',
        submitted_at TEXT,
        approved_by BLOB REFERENCES users(id) ON DELETE SET NULL,
        approved_at TEXT,
        approval_comment TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_logs (
        id BLOB PRIMARY KEY,
        user_id BLOB REFERENCES users(id) ON DELETE SET NULL,
        action TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        entity_id BLOB,
        old_values TEXT,
        new_values TEXT,
        ip_address TEXT,
        user_agent TEXT,
        created_at TEXT NOT NULL
    )
    "#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
    "CREATE INDEX IF NOT EXISTS idx_users_department ON users(department_id)",
    "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user ON refresh_tokens(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_worksheets_created_by ON worksheets(created_by)",
    "CREATE INDEX IF NOT EXISTS idx_worksheets_department ON worksheets(department_id)",
    "CREATE INDEX IF NOT EXISTS idx_worksheets_status ON worksheets(status)",
    "CREATE INDEX IF NOT EXISTS idx_reports_created_by ON reports(created_by)",
    "CREATE INDEX IF NOT EXISTS idx_reports_department ON reports(department_id)",
    "CREATE INDEX IF NOT EXISTS idx_audit_logs_user ON audit_logs(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_audit_logs_entity ON audit_logs(entity_type, entity_id)",
];

/// Create all tables and indexes
pub async fn create_schema(pool: &SqlitePool) -> ApiResult<()> {
    for statement in TABLES.iter().chain(INDEXES.iter()) {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
