/// Report store: creator-scoped queries and the submit/approve cycle
use super::{
    CreateReportRequest, Report, ReportApprovalAction, ReportApproveRequest, ReportFilter,
    ReportStats, ReportStatus, UpdateReportRequest,
};
use crate::account::AuthUser;
use crate::audit::{AuditRecorder, SourceMeta};
use crate::authz::{Role, Scope};
use crate::error::{ApiError, ApiResult};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

const SELECT_REPORT: &str = r#"
    SELECT r.id, r.title, r.report_type, r.created_by, u1.username AS created_by_name,
           r.department_id, d.name AS department_name,
           r.start_date, r.end_date, r.summary, r.status, r.submitted_at,
           r.approved_by, u2.username AS approved_by_name,
           r.approved_at, r.approval_comment, r.created_at, r.updated_at
    FROM reports r
    LEFT JOIN users u1 ON r.created_by = u1.id
    LEFT JOIN users u2 ON r.approved_by = u2.id
    LEFT JOIN departments d ON r.department_id = d.id
"#;

fn push_scope(sql: &mut String, scope: Scope) {
    match scope {
        Scope::Unrestricted => {}
        Scope::Department(_) => sql.push_str(" AND r.department_id = ?"),
        Scope::Owned(_) | Scope::OwnedOrAssigned(_) => sql.push_str(" AND r.created_by = ?"),
    }
}

fn bind_scope<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    scope: Scope,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match scope {
        Scope::Unrestricted => {}
        Scope::Department(dept) => query = query.bind(dept),
        Scope::Owned(owner) | Scope::OwnedOrAssigned(owner) => query = query.bind(owner),
    }
    query
}

/// Report management service
#[derive(Clone)]
pub struct ReportStore {
    db: SqlitePool,
    audit: AuditRecorder,
}

impl ReportStore {
    pub fn new(db: SqlitePool, audit: AuditRecorder) -> Self {
        Self { db, audit }
    }

    /// List reports visible to the caller, intersected with client filters
    pub async fn list(&self, actor: &AuthUser, filter: &ReportFilter) -> ApiResult<Vec<Report>> {
        let scope = Scope::for_reports(actor.role, actor.id, actor.department_id);

        let mut sql = format!("{} WHERE 1=1", SELECT_REPORT);
        push_scope(&mut sql, scope);
        if filter.status.is_some() {
            sql.push_str(" AND r.status = ?");
        }
        if filter.report_type.is_some() {
            sql.push_str(" AND r.report_type = ?");
        }
        if filter.department_id.is_some() {
            sql.push_str(" AND r.department_id = ?");
        }
        sql.push_str(" ORDER BY r.created_at DESC");

        let mut query = sqlx::query(&sql);
        query = bind_scope(query, scope);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(report_type) = filter.report_type {
            query = query.bind(report_type.as_str());
        }
        if let Some(dept) = filter.department_id {
            query = query.bind(dept);
        }

        let rows = query.fetch_all(&self.db).await?;
        rows.iter().map(Report::from_row).collect()
    }

    /// Fetch one report within the caller's scope
    pub async fn get(&self, actor: &AuthUser, id: Uuid) -> ApiResult<Report> {
        let scope = Scope::for_reports(actor.role, actor.id, actor.department_id);

        let mut sql = format!("{} WHERE r.id = ?", SELECT_REPORT);
        push_scope(&mut sql, scope);

        let mut query = sqlx::query(&sql).bind(id);
        query = bind_scope(query, scope);

        let row = query
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Report not found".to_string()))?;

        Report::from_row(&row)
    }

    async fn fetch_by_id(&self, id: Uuid) -> ApiResult<Report> {
        let sql = format!("{} WHERE r.id = ?", SELECT_REPORT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Report not found".to_string()))?;

        Report::from_row(&row)
    }

    /// Create a report, optionally submitting it in the same call
    pub async fn create(
        &self,
        actor: &AuthUser,
        req: &CreateReportRequest,
        meta: &SourceMeta,
    ) -> ApiResult<Report> {
        if req.title.trim().is_empty() {
            return Err(ApiError::Validation(
                "Title and report type are required".to_string(),
            ));
        }
        if req.end_date < req.start_date {
            return Err(ApiError::Validation(
                "End date must not precede start date".to_string(),
            ));
        }

        // Employees always report against their own department; everyone
        // else may name one, defaulting to their own
        let department_id = match actor.role {
            Role::Employee => actor.department_id,
            Role::Admin | Role::DepartmentManager | Role::TeamLead | Role::Auditor => {
                req.department_id.or(actor.department_id)
            }
        };
        if let Role::DepartmentManager = actor.role {
            if department_id != actor.department_id {
                return Err(ApiError::Authorization(
                    "You can only create reports for your department".to_string(),
                ));
            }
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let (status, submitted_at) = if req.submit {
            (ReportStatus::Submitted, Some(now))
        } else {
            (ReportStatus::Draft, None)
        };

        sqlx::query(
            r#"
            INSERT INTO reports
                (id, title, report_type, created_by, department_id, start_date,
                 end_date, summary, status, submitted_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            "#,
        )
        .bind(id)
        .bind(req.title.trim())
        .bind(req.report_type.as_str())
        .bind(actor.id)
        .bind(department_id)
        .bind(req.start_date)
        .bind(req.end_date)
        .bind(&req.summary)
        .bind(status.as_str())
        .bind(submitted_at)
        .bind(now)
        .execute(&self.db)
        .await?;

        let report = self.fetch_by_id(id).await?;
        let after = serde_json::to_value(&report).ok();
        self.audit
            .record(
                Some(actor.id),
                "report.create",
                "report",
                Some(id),
                None,
                after.as_ref(),
                meta,
            )
            .await;

        Ok(report)
    }

    /// Update a report. Finalized reports cannot change; employees can only
    /// edit drafts; the only status change allowed here is draft -> submitted.
    pub async fn update(
        &self,
        actor: &AuthUser,
        id: Uuid,
        req: &UpdateReportRequest,
        meta: &SourceMeta,
    ) -> ApiResult<Report> {
        let before = self.get(actor, id).await?;

        if before.status.is_terminal() {
            return Err(ApiError::Conflict("Report has been finalized".to_string()));
        }
        if let Role::Employee = actor.role {
            if before.status != ReportStatus::Draft {
                return Err(ApiError::Authorization(
                    "Cannot update submitted reports".to_string(),
                ));
            }
        }
        if let Some(next) = req.status {
            let allowed =
                before.status == ReportStatus::Draft && next == ReportStatus::Submitted;
            if !allowed && next != before.status {
                return Err(ApiError::Conflict(format!(
                    "Cannot change status from {} to {}",
                    before.status.as_str(),
                    next.as_str()
                )));
            }
        }

        let mut sets = Vec::new();
        if req.title.is_some() {
            sets.push("title = ?");
        }
        if req.report_type.is_some() {
            sets.push("report_type = ?");
        }
        if req.start_date.is_some() {
            sets.push("start_date = ?");
        }
        if req.end_date.is_some() {
            sets.push("end_date = ?");
        }
        if req.summary.is_some() {
            sets.push("summary = ?");
        }
        let submits = req.status == Some(ReportStatus::Submitted)
            && before.status == ReportStatus::Draft;
        if req.status.is_some() {
            sets.push("status = ?");
        }
        if submits {
            sets.push("submitted_at = ?");
        }

        if sets.is_empty() {
            return Err(ApiError::Validation("No fields to update".to_string()));
        }
        sets.push("updated_at = ?");

        let now = Utc::now();
        // Terminal status is re-checked in the statement itself; a decision
        // landing between the read above and this write surfaces as a conflict
        let sql = format!(
            "UPDATE reports SET {} WHERE id = ? AND status NOT IN ('approved', 'rejected')",
            sets.join(", ")
        );
        let mut query = sqlx::query(&sql);
        if let Some(ref title) = req.title {
            query = query.bind(title);
        }
        if let Some(report_type) = req.report_type {
            query = query.bind(report_type.as_str());
        }
        if let Some(start_date) = req.start_date {
            query = query.bind(start_date);
        }
        if let Some(end_date) = req.end_date {
            query = query.bind(end_date);
        }
        if let Some(ref summary) = req.summary {
            query = query.bind(summary);
        }
        if let Some(status) = req.status {
            query = query.bind(status.as_str());
        }
        if submits {
            query = query.bind(now);
        }
        query = query.bind(now).bind(id);

        let result = query.execute(&self.db).await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::Conflict("Report has been finalized".to_string()));
        }

        let after = self.fetch_by_id(id).await?;
        let old = serde_json::to_value(&before).ok();
        let new = serde_json::to_value(&after).ok();
        self.audit
            .record(
                Some(actor.id),
                "report.update",
                "report",
                Some(id),
                old.as_ref(),
                new.as_ref(),
                meta,
            )
            .await;

        Ok(after)
    }

    /// Hard-delete a report (Admin only)
    pub async fn delete(&self, actor: &AuthUser, id: Uuid, meta: &SourceMeta) -> ApiResult<()> {
        match actor.role {
            Role::Admin => {}
            Role::DepartmentManager | Role::TeamLead | Role::Employee | Role::Auditor => {
                return Err(ApiError::Authorization(
                    "Only administrators can delete reports".to_string(),
                ))
            }
        }

        let before = self.fetch_by_id(id).await?;

        sqlx::query("DELETE FROM reports WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        let old = serde_json::to_value(&before).ok();
        self.audit
            .record(
                Some(actor.id),
                "report.delete",
                "report",
                Some(id),
                old.as_ref(),
                None,
                meta,
            )
            .await;

        Ok(())
    }

    /// Approve or reject a submitted report; Admin or the department's
    /// manager only
    pub async fn approve(
        &self,
        actor: &AuthUser,
        id: Uuid,
        req: &ReportApproveRequest,
        meta: &SourceMeta,
    ) -> ApiResult<Report> {
        match actor.role {
            Role::Admin => {}
            Role::DepartmentManager => {
                let department_id: Option<Uuid> =
                    sqlx::query_scalar("SELECT department_id FROM reports WHERE id = ?")
                        .bind(id)
                        .fetch_optional(&self.db)
                        .await?
                        .ok_or_else(|| ApiError::NotFound("Report not found".to_string()))?;
                if department_id != actor.department_id || department_id.is_none() {
                    return Err(ApiError::NotFound("Report not found".to_string()));
                }
            }
            Role::TeamLead | Role::Employee | Role::Auditor => {
                return Err(ApiError::Authorization(
                    "You do not have permission to approve reports".to_string(),
                ));
            }
        }

        let before = self.fetch_by_id(id).await?;

        let new_status = match req.action {
            ReportApprovalAction::Approve => ReportStatus::Approved,
            ReportApprovalAction::Reject => ReportStatus::Rejected,
        };
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE reports
            SET status = ?, approved_by = ?, approved_at = ?, approval_comment = ?, updated_at = ?
            WHERE id = ? AND status = 'submitted'
            "#,
        )
        .bind(new_status.as_str())
        .bind(actor.id)
        .bind(now)
        .bind(&req.comment)
        .bind(now)
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::Conflict(
                "Report is not awaiting approval".to_string(),
            ));
        }

        let after = self.fetch_by_id(id).await?;
        let action = match req.action {
            ReportApprovalAction::Approve => "report.approve",
            ReportApprovalAction::Reject => "report.reject",
        };
        let old = serde_json::to_value(&before).ok();
        let new = serde_json::to_value(&after).ok();
        self.audit
            .record(Some(actor.id), action, "report", Some(id), old.as_ref(), new.as_ref(), meta)
            .await;

        Ok(after)
    }

    /// Status roll-up over the reports the caller can see, for the dashboard
    pub async fn status_counts(&self, actor: &AuthUser) -> ApiResult<ReportStats> {
        let scope = Scope::for_reports(actor.role, actor.id, actor.department_id);

        let mut sql = String::from(
            r#"
            SELECT COUNT(*) AS total,
                   COALESCE(SUM(CASE WHEN r.status = 'draft' THEN 1 ELSE 0 END), 0) AS draft,
                   COALESCE(SUM(CASE WHEN r.status = 'submitted' THEN 1 ELSE 0 END), 0) AS submitted,
                   COALESCE(SUM(CASE WHEN r.status = 'approved' THEN 1 ELSE 0 END), 0) AS approved,
                   COALESCE(SUM(CASE WHEN r.status = 'rejected' THEN 1 ELSE 0 END), 0) AS rejected
            FROM reports r
            WHERE 1=1
            "#,
        );
        push_scope(&mut sql, scope);

        let mut query = sqlx::query(&sql);
        query = bind_scope(query, scope);
        let row = query.fetch_one(&self.db).await?;

        use sqlx::Row;
        Ok(ReportStats {
            total: row.get("total"),
            draft: row.get("draft"),
            submitted: row.get("submitted"),
            approved: row.get("approved"),
            rejected: row.get("rejected"),
        })
    }
}
