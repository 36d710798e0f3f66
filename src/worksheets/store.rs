/// Worksheet store: scoped queries, the status machine, and audited mutations
use super::{
    ApprovalAction, ApproveRequest, CreateWorksheetRequest, Priority, UpdateWorksheetRequest,
    Worksheet, WorksheetFilter, WorksheetStats, WorksheetStatus,
};
use crate::account::AuthUser;
use crate::audit::{AuditRecorder, SourceMeta};
use crate::authz::{Role, Scope};
use crate::error::{ApiError, ApiResult};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

const SELECT_WORKSHEET: &str = r#"
    SELECT w.id, w.title, w.description, w.created_by, u1.username AS created_by_name,
           w.assigned_to, u2.username AS assigned_to_name,
           w.department_id, d.name AS department_name,
           w.priority, w.status, w.progress, w.start_date, w.due_date,
           w.submitted_at, w.approved_by, u3.username AS approved_by_name,
           w.approved_at, w.approval_comment, w.created_at, w.updated_at
    FROM worksheets w
    LEFT JOIN users u1 ON w.created_by = u1.id
    LEFT JOIN users u2 ON w.assigned_to = u2.id
    LEFT JOIN users u3 ON w.approved_by = u3.id
    LEFT JOIN departments d ON w.department_id = d.id
"#;

fn push_scope(sql: &mut String, scope: Scope) {
    match scope {
        Scope::Unrestricted => {}
        Scope::Department(_) => sql.push_str(" AND w.department_id = ?"),
        Scope::Owned(_) => sql.push_str(" AND w.created_by = ?"),
        Scope::OwnedOrAssigned(_) => {
            sql.push_str(" AND (w.created_by = ? OR w.assigned_to = ?)")
        }
    }
}

fn bind_scope<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    scope: Scope,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match scope {
        Scope::Unrestricted => {}
        Scope::Department(dept) => query = query.bind(dept),
        Scope::Owned(owner) => query = query.bind(owner),
        Scope::OwnedOrAssigned(owner) => query = query.bind(owner).bind(owner),
    }
    query
}

/// Worksheet management service
#[derive(Clone)]
pub struct WorksheetStore {
    db: SqlitePool,
    audit: AuditRecorder,
}

impl WorksheetStore {
    pub fn new(db: SqlitePool, audit: AuditRecorder) -> Self {
        Self { db, audit }
    }

    /// List worksheets visible to the caller, intersected with client filters
    pub async fn list(
        &self,
        actor: &AuthUser,
        filter: &WorksheetFilter,
    ) -> ApiResult<Vec<Worksheet>> {
        let scope = Scope::for_worksheets(actor.role, actor.id, actor.department_id);

        let mut sql = format!("{} WHERE 1=1", SELECT_WORKSHEET);
        push_scope(&mut sql, scope);
        if filter.status.is_some() {
            sql.push_str(" AND w.status = ?");
        }
        if filter.priority.is_some() {
            sql.push_str(" AND w.priority = ?");
        }
        if filter.department_id.is_some() {
            sql.push_str(" AND w.department_id = ?");
        }
        if filter.assigned_to.is_some() {
            sql.push_str(" AND w.assigned_to = ?");
        }
        sql.push_str(" ORDER BY w.created_at DESC");

        let mut query = sqlx::query(&sql);
        query = bind_scope(query, scope);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(priority) = filter.priority {
            query = query.bind(priority.as_str());
        }
        if let Some(dept) = filter.department_id {
            query = query.bind(dept);
        }
        if let Some(assignee) = filter.assigned_to {
            query = query.bind(assignee);
        }

        let rows = query.fetch_all(&self.db).await?;
        rows.iter().map(Worksheet::from_row).collect()
    }

    /// Fetch one worksheet within the caller's scope; scoped-out rows read
    /// as not found
    pub async fn get(&self, actor: &AuthUser, id: Uuid) -> ApiResult<Worksheet> {
        let scope = Scope::for_worksheets(actor.role, actor.id, actor.department_id);

        let mut sql = format!("{} WHERE w.id = ?", SELECT_WORKSHEET);
        push_scope(&mut sql, scope);

        let mut query = sqlx::query(&sql).bind(id);
        query = bind_scope(query, scope);

        let row = query
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Worksheet not found".to_string()))?;

        Worksheet::from_row(&row)
    }

    async fn fetch_by_id(&self, id: Uuid) -> ApiResult<Worksheet> {
        let sql = format!("{} WHERE w.id = ?", SELECT_WORKSHEET);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Worksheet not found".to_string()))?;

        Worksheet::from_row(&row)
    }

    /// Create a worksheet in draft
    pub async fn create(
        &self,
        actor: &AuthUser,
        req: &CreateWorksheetRequest,
        meta: &SourceMeta,
    ) -> ApiResult<Worksheet> {
        if req.title.trim().is_empty() {
            return Err(ApiError::Validation(
                "Title and department are required".to_string(),
            ));
        }

        // Managers only create within their own department
        if let Role::DepartmentManager = actor.role {
            if actor.department_id != Some(req.department_id) {
                return Err(ApiError::Authorization(
                    "You can only create worksheets for your department".to_string(),
                ));
            }
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let priority = req.priority.unwrap_or(Priority::Medium);

        sqlx::query(
            r#"
            INSERT INTO worksheets
                (id, title, description, created_by, department_id, assigned_to,
                 priority, status, progress, start_date, due_date, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'draft', 0, ?8, ?9, ?10, ?10)
            "#,
        )
        .bind(id)
        .bind(req.title.trim())
        .bind(&req.description)
        .bind(actor.id)
        .bind(req.department_id)
        .bind(req.assigned_to)
        .bind(priority.as_str())
        .bind(req.start_date)
        .bind(req.due_date)
        .bind(now)
        .execute(&self.db)
        .await?;

        let worksheet = self.fetch_by_id(id).await?;
        let after = serde_json::to_value(&worksheet).ok();
        self.audit
            .record(
                Some(actor.id),
                "worksheet.create",
                "worksheet",
                Some(id),
                None,
                after.as_ref(),
                meta,
            )
            .await;

        Ok(worksheet)
    }

    /// Update a worksheet. Finalized worksheets cannot be touched; employees
    /// can only edit drafts; status changes are limited to the working
    /// transitions.
    pub async fn update(
        &self,
        actor: &AuthUser,
        id: Uuid,
        req: &UpdateWorksheetRequest,
        meta: &SourceMeta,
    ) -> ApiResult<Worksheet> {
        let before = self.get(actor, id).await?;

        if before.status.is_terminal() {
            return Err(ApiError::Conflict(
                "Worksheet has been finalized".to_string(),
            ));
        }
        if let Role::Employee = actor.role {
            if before.status != WorksheetStatus::Draft {
                return Err(ApiError::Authorization(
                    "Only draft worksheets can be edited".to_string(),
                ));
            }
        }
        if let Some(next) = req.status {
            if !before.status.can_update_to(next) {
                return Err(ApiError::Conflict(format!(
                    "Cannot change status from {} to {}",
                    before.status.as_str(),
                    next.as_str()
                )));
            }
        }
        if let Some(progress) = req.progress {
            if !(0..=100).contains(&progress) {
                return Err(ApiError::Validation(
                    "Progress must be between 0 and 100".to_string(),
                ));
            }
        }

        let mut sets = Vec::new();
        if req.title.is_some() {
            sets.push("title = ?");
        }
        if req.description.is_some() {
            sets.push("description = ?");
        }
        if req.assigned_to.is_some() {
            sets.push("assigned_to = ?");
        }
        if req.priority.is_some() {
            sets.push("priority = ?");
        }
        if req.status.is_some() {
            sets.push("status = ?");
        }
        if req.progress.is_some() {
            sets.push("progress = ?");
        }
        if req.start_date.is_some() {
            sets.push("start_date = ?");
        }
        if req.due_date.is_some() {
            sets.push("due_date = ?");
        }

        if sets.is_empty() {
            return Err(ApiError::Validation("No fields to update".to_string()));
        }
        sets.push("updated_at = ?");

        // Terminal status is re-checked in the statement itself; a decision
        // landing between the read above and this write surfaces as a conflict
        let sql = format!(
            "UPDATE worksheets SET {} WHERE id = ? AND status NOT IN ('approved', 'rejected')",
            sets.join(", ")
        );
        let mut query = sqlx::query(&sql);
        if let Some(ref title) = req.title {
            query = query.bind(title);
        }
        if let Some(ref description) = req.description {
            query = query.bind(description);
        }
        if let Some(assignee) = req.assigned_to {
            query = query.bind(assignee);
        }
        if let Some(priority) = req.priority {
            query = query.bind(priority.as_str());
        }
        if let Some(status) = req.status {
            query = query.bind(status.as_str());
        }
        if let Some(progress) = req.progress {
            query = query.bind(progress);
        }
        if let Some(start_date) = req.start_date {
            query = query.bind(start_date);
        }
        if let Some(due_date) = req.due_date {
            query = query.bind(due_date);
        }
        query = query.bind(Utc::now()).bind(id);

        let result = query.execute(&self.db).await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::Conflict(
                "Worksheet has been finalized".to_string(),
            ));
        }

        let after = self.fetch_by_id(id).await?;
        let old = serde_json::to_value(&before).ok();
        let new = serde_json::to_value(&after).ok();
        self.audit
            .record(
                Some(actor.id),
                "worksheet.update",
                "worksheet",
                Some(id),
                old.as_ref(),
                new.as_ref(),
                meta,
            )
            .await;

        Ok(after)
    }

    /// Hard-delete a worksheet (Admin only)
    pub async fn delete(&self, actor: &AuthUser, id: Uuid, meta: &SourceMeta) -> ApiResult<()> {
        match actor.role {
            Role::Admin => {}
            Role::DepartmentManager | Role::TeamLead | Role::Employee | Role::Auditor => {
                return Err(ApiError::Authorization(
                    "Only administrators can delete worksheets".to_string(),
                ))
            }
        }

        let before = self.fetch_by_id(id).await?;

        sqlx::query("DELETE FROM worksheets WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        let old = serde_json::to_value(&before).ok();
        self.audit
            .record(
                Some(actor.id),
                "worksheet.delete",
                "worksheet",
                Some(id),
                old.as_ref(),
                None,
                meta,
            )
            .await;

        Ok(())
    }

    /// Submit a worksheet for approval. Creator-only; permitted from draft
    /// and completed.
    pub async fn submit(&self, actor: &AuthUser, id: Uuid, meta: &SourceMeta) -> ApiResult<Worksheet> {
        let row = sqlx::query("SELECT status FROM worksheets WHERE id = ? AND created_by = ?")
            .bind(id)
            .bind(actor.id)
            .fetch_optional(&self.db)
            .await?;

        let Some(row) = row else {
            return Err(ApiError::NotFound(
                "Worksheet not found or you do not have permission to submit it".to_string(),
            ));
        };

        use sqlx::Row;
        let status_str: String = row.get("status");
        let status = WorksheetStatus::from_str(&status_str)?;
        if !status.can_submit() {
            return Err(ApiError::Conflict(format!(
                "Cannot submit a worksheet in status {}",
                status.as_str()
            )));
        }

        let now = Utc::now();
        // Guarded by the current status so concurrent submits race cleanly
        let result = sqlx::query(
            r#"
            UPDATE worksheets
            SET status = 'submitted', submitted_at = ?, updated_at = ?
            WHERE id = ? AND status IN ('draft', 'completed')
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::Conflict(
                "Worksheet is no longer in a submittable state".to_string(),
            ));
        }

        self.audit
            .record(
                Some(actor.id),
                "worksheet.submit",
                "worksheet",
                Some(id),
                None,
                Some(&serde_json::json!({ "status": "submitted" })),
                meta,
            )
            .await;

        self.fetch_by_id(id).await
    }

    /// Approve or reject a submitted worksheet. Admin or the department's
    /// manager only; the transition is a single guarded statement so a
    /// second decision hits the guard and conflicts.
    pub async fn approve(
        &self,
        actor: &AuthUser,
        id: Uuid,
        req: &ApproveRequest,
        meta: &SourceMeta,
    ) -> ApiResult<Worksheet> {
        match actor.role {
            Role::Admin => {}
            Role::DepartmentManager => {
                let department_id: Option<Uuid> =
                    sqlx::query_scalar("SELECT department_id FROM worksheets WHERE id = ?")
                        .bind(id)
                        .fetch_optional(&self.db)
                        .await?
                        .ok_or_else(|| ApiError::NotFound("Worksheet not found".to_string()))?;
                if department_id != actor.department_id || department_id.is_none() {
                    return Err(ApiError::NotFound("Worksheet not found".to_string()));
                }
            }
            Role::TeamLead | Role::Employee | Role::Auditor => {
                return Err(ApiError::Authorization(
                    "You do not have permission to approve worksheets".to_string(),
                ));
            }
        }

        let before = self.fetch_by_id(id).await?;

        let new_status = match req.action {
            ApprovalAction::Approve => WorksheetStatus::Approved,
            ApprovalAction::Reject => WorksheetStatus::Rejected,
        };
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE worksheets
            SET status = ?, approved_by = ?, approved_at = ?, approval_comment = ?, updated_at = ?
            WHERE id = ? AND status IN ('submitted', 'completed')
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
                "Worksheet is not awaiting approval".to_string(),
            ));
        }

        let after = self.fetch_by_id(id).await?;
        let action = match req.action {
            ApprovalAction::Approve => "worksheet.approve",
            ApprovalAction::Reject => "worksheet.reject",
        };
        let old = serde_json::to_value(&before).ok();
        let new = serde_json::to_value(&after).ok();
        self.audit
            .record(Some(actor.id), action, "worksheet", Some(id), old.as_ref(), new.as_ref(), meta)
            .await;

        Ok(after)
    }

    /// Status roll-up over the worksheets the caller can see, for the
    /// dashboard. Overdue counts rows past their due date that were never
    /// completed or approved.
    pub async fn status_counts(&self, actor: &AuthUser) -> ApiResult<WorksheetStats> {
        let scope = Scope::for_worksheets(actor.role, actor.id, actor.department_id);

        let mut sql = String::from(
            r#"
            SELECT COUNT(*) AS total,
                   COALESCE(SUM(CASE WHEN w.status = 'draft' THEN 1 ELSE 0 END), 0) AS draft,
                   COALESCE(SUM(CASE WHEN w.status = 'in_progress' THEN 1 ELSE 0 END), 0) AS in_progress,
                   COALESCE(SUM(CASE WHEN w.status = 'completed' THEN 1 ELSE 0 END), 0) AS completed,
                   COALESCE(SUM(CASE WHEN w.status = 'submitted' THEN 1 ELSE 0 END), 0) AS submitted,
                   COALESCE(SUM(CASE WHEN w.status = 'approved' THEN 1 ELSE 0 END), 0) AS approved,
                   COALESCE(SUM(CASE WHEN w.status = 'rejected' THEN 1 ELSE 0 END), 0) AS rejected,
                   COALESCE(SUM(CASE WHEN w.priority = 'urgent' THEN 1 ELSE 0 END), 0) AS urgent,
                   COALESCE(SUM(CASE WHEN w.due_date < DATE('now')
                                      AND w.status NOT IN ('completed', 'approved')
                                THEN 1 ELSE 0 END), 0) AS overdue
            FROM worksheets w
            WHERE 1=1
            "#,
        );
        push_scope(&mut sql, scope);

        let mut query = sqlx::query(&sql);
        query = bind_scope(query, scope);
        let row = query.fetch_one(&self.db).await?;

        use sqlx::Row;
        Ok(WorksheetStats {
            total: row.get("total"),
            draft: row.get("draft"),
            in_progress: row.get("in_progress"),
            completed: row.get("completed"),
            submitted: row.get("submitted"),
            approved: row.get("approved"),
            rejected: row.get("rejected"),
            urgent: row.get("urgent"),
            overdue: row.get("overdue"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    async fn setup() -> (SqlitePool, WorksheetStore) {
        let pool = testutil::setup_pool().await;
        let audit = AuditRecorder::new(pool.clone());
        let store = WorksheetStore::new(pool.clone(), audit);
        (pool, store)
    }

    fn create_req(department_id: Uuid, title: &str) -> CreateWorksheetRequest {
        CreateWorksheetRequest {
            title: title.to_string(),
            description: None,
            department_id,
            assigned_to: None,
            priority: None,
            start_date: None,
            due_date: None,
        }
    }

    #[tokio::test]
    async fn test_submit_and_approve_flow() {
        let (pool, store) = setup().await;
        let meta = SourceMeta::default();

        let sales = testutil::insert_department(&pool, "Sales").await;
        let john = testutil::insert_user(&pool, "john", Role::Employee, Some(sales)).await;
        let manager =
            testutil::insert_user(&pool, "manager", Role::DepartmentManager, Some(sales)).await;

        let worksheet = store
            .create(&john, &create_req(sales, "Daily log"), &meta)
            .await
            .unwrap();
        assert_eq!(worksheet.status, WorksheetStatus::Draft);

        let submitted = store.submit(&john, worksheet.id, &meta).await.unwrap();
        assert_eq!(submitted.status, WorksheetStatus::Submitted);
        assert!(submitted.submitted_at.is_some());

        let req = ApproveRequest {
            action: ApprovalAction::Approve,
            comment: Some("Looks good".to_string()),
        };
        let approved = store.approve(&manager, worksheet.id, &req, &meta).await.unwrap();
        assert_eq!(approved.status, WorksheetStatus::Approved);
        assert_eq!(approved.approved_by, Some(manager.id));
        assert!(approved.approved_at.is_some());
        assert_eq!(approved.approval_comment.as_deref(), Some("Looks good"));

        // Terminal: a second decision conflicts
        let err = store
            .approve(&manager, worksheet.id, &req, &meta)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_employee_cannot_approve() {
        let (pool, store) = setup().await;
        let meta = SourceMeta::default();

        let sales = testutil::insert_department(&pool, "Sales").await;
        let john = testutil::insert_user(&pool, "john", Role::Employee, Some(sales)).await;

        let worksheet = store
            .create(&john, &create_req(sales, "Daily log"), &meta)
            .await
            .unwrap();
        store.submit(&john, worksheet.id, &meta).await.unwrap();

        let req = ApproveRequest {
            action: ApprovalAction::Approve,
            comment: None,
        };
        let err = store.approve(&john, worksheet.id, &req, &meta).await.unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_manager_cannot_approve_other_department() {
        let (pool, store) = setup().await;
        let meta = SourceMeta::default();

        let sales = testutil::insert_department(&pool, "Sales").await;
        let it = testutil::insert_department(&pool, "IT").await;
        let john = testutil::insert_user(&pool, "john", Role::Employee, Some(sales)).await;
        let it_manager =
            testutil::insert_user(&pool, "it.manager", Role::DepartmentManager, Some(it)).await;

        let worksheet = store
            .create(&john, &create_req(sales, "Daily log"), &meta)
            .await
            .unwrap();
        store.submit(&john, worksheet.id, &meta).await.unwrap();

        let req = ApproveRequest {
            action: ApprovalAction::Reject,
            comment: None,
        };
        // Out of the manager's department, so the row reads as absent
        let err = store
            .approve(&it_manager, worksheet.id, &req, &meta)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_employee_scope_covers_created_and_assigned() {
        let (pool, store) = setup().await;
        let meta = SourceMeta::default();

        let sales = testutil::insert_department(&pool, "Sales").await;
        let john = testutil::insert_user(&pool, "john", Role::Employee, Some(sales)).await;
        let jane = testutil::insert_user(&pool, "jane", Role::Employee, Some(sales)).await;
        let lead = testutil::insert_user(&pool, "lead", Role::TeamLead, Some(sales)).await;

        // One of John's own, one assigned to him, one unrelated
        store.create(&john, &create_req(sales, "Mine"), &meta).await.unwrap();
        let mut assigned = create_req(sales, "Assigned to John");
        assigned.assigned_to = Some(john.id);
        store.create(&lead, &assigned, &meta).await.unwrap();
        store.create(&jane, &create_req(sales, "Jane's"), &meta).await.unwrap();

        let visible = store.list(&john, &WorksheetFilter::default()).await.unwrap();
        assert_eq!(visible.len(), 2);

        let janes = store.list(&jane, &WorksheetFilter::default()).await.unwrap();
        assert_eq!(janes.len(), 1);

        // A scoped-out direct fetch is indistinguishable from absence
        let err = store.get(&john, janes[0].id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_employee_cannot_edit_after_submit() {
        let (pool, store) = setup().await;
        let meta = SourceMeta::default();

        let sales = testutil::insert_department(&pool, "Sales").await;
        let john = testutil::insert_user(&pool, "john", Role::Employee, Some(sales)).await;

        let worksheet = store
            .create(&john, &create_req(sales, "Daily log"), &meta)
            .await
            .unwrap();
        store.submit(&john, worksheet.id, &meta).await.unwrap();

        let req = UpdateWorksheetRequest {
            title: Some("Edited".to_string()),
            ..Default::default()
        };
        let err = store.update(&john, worksheet.id, &req, &meta).await.unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_update_rejects_illegal_transition() {
        let (pool, store) = setup().await;
        let meta = SourceMeta::default();

        let sales = testutil::insert_department(&pool, "Sales").await;
        let lead = testutil::insert_user(&pool, "lead", Role::TeamLead, Some(sales)).await;

        let worksheet = store
            .create(&lead, &create_req(sales, "Sprint work"), &meta)
            .await
            .unwrap();

        // draft -> approved is not an update transition
        let req = UpdateWorksheetRequest {
            status: Some(WorksheetStatus::Approved),
            ..Default::default()
        };
        let err = store.update(&lead, worksheet.id, &req, &meta).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        // draft -> in_progress -> completed -> submitted is
        let req = UpdateWorksheetRequest {
            status: Some(WorksheetStatus::InProgress),
            progress: Some(30),
            ..Default::default()
        };
        let ws = store.update(&lead, worksheet.id, &req, &meta).await.unwrap();
        assert_eq!(ws.status, WorksheetStatus::InProgress);
        assert_eq!(ws.progress, 30);

        let req = UpdateWorksheetRequest {
            status: Some(WorksheetStatus::Completed),
            progress: Some(100),
            ..Default::default()
        };
        let ws = store.update(&lead, worksheet.id, &req, &meta).await.unwrap();
        assert_eq!(ws.status, WorksheetStatus::Completed);

        let ws = store.submit(&lead, worksheet.id, &meta).await.unwrap();
        assert_eq!(ws.status, WorksheetStatus::Submitted);
    }

    #[tokio::test]
    async fn test_update_rejects_finalized_worksheet() {
        let (pool, store) = setup().await;
        let meta = SourceMeta::default();

        let sales = testutil::insert_department(&pool, "Sales").await;
        let lead = testutil::insert_user(&pool, "lead", Role::TeamLead, Some(sales)).await;

        let worksheet = store
            .create(&lead, &create_req(sales, "Sprint work"), &meta)
            .await
            .unwrap();

        // Decision lands out of band
        sqlx::query("UPDATE worksheets SET status = 'approved' WHERE id = ?")
            .bind(worksheet.id)
            .execute(&pool)
            .await
            .unwrap();

        let req = UpdateWorksheetRequest {
            title: Some("Edited".to_string()),
            ..Default::default()
        };
        let err = store.update(&lead, worksheet.id, &req, &meta).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        // The guarded statement left the finalized row untouched
        let after = store.get(&lead, worksheet.id).await.unwrap();
        assert_eq!(after.title, "Sprint work");
        assert_eq!(after.status, WorksheetStatus::Approved);
    }

    #[tokio::test]
    async fn test_status_counts_respect_scope() {
        let (pool, store) = setup().await;
        let meta = SourceMeta::default();

        let sales = testutil::insert_department(&pool, "Sales").await;
        let john = testutil::insert_user(&pool, "john", Role::Employee, Some(sales)).await;
        let jane = testutil::insert_user(&pool, "jane", Role::Employee, Some(sales)).await;
        let manager =
            testutil::insert_user(&pool, "manager", Role::DepartmentManager, Some(sales)).await;

        let first = store
            .create(&john, &create_req(sales, "Monday"), &meta)
            .await
            .unwrap();
        store.submit(&john, first.id, &meta).await.unwrap();
        let mut urgent = create_req(sales, "Tuesday");
        urgent.priority = Some(Priority::Urgent);
        store.create(&john, &urgent, &meta).await.unwrap();
        store.create(&jane, &create_req(sales, "Jane's"), &meta).await.unwrap();

        let johns = store.status_counts(&john).await.unwrap();
        assert_eq!(johns.total, 2);
        assert_eq!(johns.draft, 1);
        assert_eq!(johns.submitted, 1);
        assert_eq!(johns.urgent, 1);

        let depts = store.status_counts(&manager).await.unwrap();
        assert_eq!(depts.total, 3);
        assert_eq!(depts.draft, 2);
    }

    #[tokio::test]
    async fn test_submit_is_creator_only() {
        let (pool, store) = setup().await;
        let meta = SourceMeta::default();

        let sales = testutil::insert_department(&pool, "Sales").await;
        let john = testutil::insert_user(&pool, "john", Role::Employee, Some(sales)).await;
        let jane = testutil::insert_user(&pool, "jane", Role::Employee, Some(sales)).await;

        let mut req = create_req(sales, "John's log");
        req.assigned_to = Some(jane.id);
        let worksheet = store.create(&john, &req, &meta).await.unwrap();

        // Jane can see it (assigned) but cannot submit it
        store.get(&jane, worksheet.id).await.unwrap();
        let err = store.submit(&jane, worksheet.id, &meta).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_only_admin_deletes() {
        let (pool, store) = setup().await;
        let meta = SourceMeta::default();

        let sales = testutil::insert_department(&pool, "Sales").await;
        let admin = testutil::insert_user(&pool, "admin", Role::Admin, None).await;
        let john = testutil::insert_user(&pool, "john", Role::Employee, Some(sales)).await;

        let worksheet = store
            .create(&john, &create_req(sales, "Daily log"), &meta)
            .await
            .unwrap();

        let err = store.delete(&john, worksheet.id, &meta).await.unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));

        store.delete(&admin, worksheet.id, &meta).await.unwrap();
        let err = store.get(&admin, worksheet.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_manager_creates_only_for_own_department() {
        let (pool, store) = setup().await;
        let meta = SourceMeta::default();

        let sales = testutil::insert_department(&pool, "Sales").await;
        let it = testutil::insert_department(&pool, "IT").await;
        let manager =
            testutil::insert_user(&pool, "manager", Role::DepartmentManager, Some(sales)).await;

        let err = store
            .create(&manager, &create_req(it, "Cross-dept"), &meta)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));

        store
            .create(&manager, &create_req(sales, "Own dept"), &meta)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_every_mutation_is_audited() {
        let (pool, store) = setup().await;
        let meta = SourceMeta::default();

        let sales = testutil::insert_department(&pool, "Sales").await;
        let admin = testutil::insert_user(&pool, "admin", Role::Admin, None).await;
        let john = testutil::insert_user(&pool, "john", Role::Employee, Some(sales)).await;

        let worksheet = store
            .create(&john, &create_req(sales, "Daily log"), &meta)
            .await
            .unwrap();
        store
            .update(
                &john,
                worksheet.id,
                &UpdateWorksheetRequest {
                    title: Some("Daily log v2".to_string()),
                    ..Default::default()
                },
                &meta,
            )
            .await
            .unwrap();
        store.submit(&john, worksheet.id, &meta).await.unwrap();
        store
            .approve(
                &admin,
                worksheet.id,
                &ApproveRequest {
                    action: ApprovalAction::Approve,
                    comment: None,
                },
                &meta,
            )
            .await
            .unwrap();
        store.delete(&admin, worksheet.id, &meta).await.unwrap();

        let actions: Vec<String> =
            sqlx::query_scalar("SELECT action FROM audit_logs ORDER BY rowid")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(
            actions,
            vec![
                "worksheet.create",
                "worksheet.update",
                "worksheet.submit",
                "worksheet.approve",
                "worksheet.delete",
            ]
        );
    }
}
