/// Audit trail
///
/// Every mutating operation appends one immutable record of who did what to
/// which entity, with before/after snapshots where they exist. Audit writes
/// are best-effort: a failed insert is logged and swallowed so the business
/// operation still completes.
use crate::error::ApiResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Caller metadata captured from the request
#[derive(Debug, Clone, Default)]
pub struct SourceMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// One immutable audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Query filters for the audit listing endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    pub user_id: Option<Uuid>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

const SELECT_ENTRY: &str = r#"
    SELECT al.id, al.user_id, u.username, al.action, al.entity_type,
           al.entity_id, al.old_values, al.new_values, al.ip_address,
           al.user_agent, al.created_at
    FROM audit_logs al
    LEFT JOIN users u ON al.user_id = u.id
"#;

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> AuditEntry {
    AuditEntry {
        id: row.get("id"),
        user_id: row.get("user_id"),
        username: row.get("username"),
        action: row.get("action"),
        entity_type: row.get("entity_type"),
        entity_id: row.get("entity_id"),
        old_values: row
            .get::<Option<String>, _>("old_values")
            .and_then(|s| serde_json::from_str(&s).ok()),
        new_values: row
            .get::<Option<String>, _>("new_values")
            .and_then(|s| serde_json::from_str(&s).ok()),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        created_at: row.get("created_at"),
    }
}

/// Audit recorder service
#[derive(Clone)]
pub struct AuditRecorder {
    db: SqlitePool,
}

impl AuditRecorder {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append one audit record. Failures are logged, never surfaced: audit
    /// completeness is best-effort in this system's failure model.
    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        actor: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
        old_values: Option<&serde_json::Value>,
        new_values: Option<&serde_json::Value>,
        meta: &SourceMeta,
    ) {
        if let Err(e) = self
            .try_record(actor, action, entity_type, entity_id, old_values, new_values, meta)
            .await
        {
            tracing::warn!(
                action,
                entity_type,
                "Failed to write audit record: {}",
                e
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_record(
        &self,
        actor: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
        old_values: Option<&serde_json::Value>,
        new_values: Option<&serde_json::Value>,
        meta: &SourceMeta,
    ) -> ApiResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO audit_logs
                (id, user_id, action, entity_type, entity_id, old_values, new_values,
                 ip_address, user_agent, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor)
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .bind(old_values.map(|v| v.to_string()))
        .bind(new_values.map(|v| v.to_string()))
        .bind(&meta.ip_address)
        .bind(&meta.user_agent)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// List audit records, newest first, with optional filters
    pub async fn list(&self, filter: &AuditFilter) -> ApiResult<Vec<AuditEntry>> {
        let mut sql = format!("{} WHERE 1=1", SELECT_ENTRY);

        if filter.user_id.is_some() {
            sql.push_str(" AND al.user_id = ?");
        }
        if filter.action.is_some() {
            sql.push_str(" AND al.action = ?");
        }
        if filter.entity_type.is_some() {
            sql.push_str(" AND al.entity_type = ?");
        }
        if filter.entity_id.is_some() {
            sql.push_str(" AND al.entity_id = ?");
        }
        if filter.start_date.is_some() {
            sql.push_str(" AND al.created_at >= ?");
        }
        if filter.end_date.is_some() {
            sql.push_str(" AND al.created_at <= ?");
        }
        sql.push_str(" ORDER BY al.created_at DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql);
        if let Some(user_id) = filter.user_id {
            query = query.bind(user_id);
        }
        if let Some(ref action) = filter.action {
            query = query.bind(action);
        }
        if let Some(ref entity_type) = filter.entity_type {
            query = query.bind(entity_type);
        }
        if let Some(entity_id) = filter.entity_id {
            query = query.bind(entity_id);
        }
        if let Some(start) = filter.start_date {
            query = query.bind(start);
        }
        if let Some(end) = filter.end_date {
            query = query.bind(end);
        }
        query = query
            .bind(filter.limit.unwrap_or(50).clamp(1, 500))
            .bind(filter.offset.unwrap_or(0).max(0));

        let rows = query.fetch_all(&self.db).await?;

        Ok(rows.iter().map(entry_from_row).collect())
    }

    /// Most recent activity for the dashboard, optionally limited to one
    /// principal or to one department's principals
    pub async fn recent(
        &self,
        user_id: Option<Uuid>,
        department_id: Option<Uuid>,
        limit: i64,
    ) -> ApiResult<Vec<AuditEntry>> {
        let mut sql = format!("{} WHERE 1=1", SELECT_ENTRY);
        if user_id.is_some() {
            sql.push_str(" AND al.user_id = ?");
        }
        if department_id.is_some() {
            sql.push_str(" AND al.user_id IN (SELECT id FROM users WHERE department_id = ?)");
        }
        sql.push_str(" ORDER BY al.created_at DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(user_id) = user_id {
            query = query.bind(user_id);
        }
        if let Some(dept) = department_id {
            query = query.bind(dept);
        }
        query = query.bind(limit.clamp(1, 100));

        let rows = query.fetch_all(&self.db).await?;

        Ok(rows.iter().map(entry_from_row).collect())
    }
}
