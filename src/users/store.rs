/// User store: scoped queries and audited mutations over principals,
/// departments, and roles
use super::{
    CreateUserRequest, Department, RoleInfo, UpdateUserRequest, User, UserFilter, UserStats,
};
use crate::account::{password, AuthUser};
use crate::audit::{AuditRecorder, SourceMeta};
use crate::authz::{PermissionMap, Role, Scope};
use crate::error::{ApiError, ApiResult};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

const SELECT_USER: &str = r#"
    SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.role,
           u.department_id, d.name AS department_name, u.manager_id,
           u.is_active, u.last_login, u.force_password_change,
           u.created_at, u.updated_at
    FROM users u
    LEFT JOIN departments d ON u.department_id = d.id
"#;

/// User management service
#[derive(Clone)]
pub struct UserStore {
    db: SqlitePool,
    audit: AuditRecorder,
}

impl UserStore {
    pub fn new(db: SqlitePool, audit: AuditRecorder) -> Self {
        Self { db, audit }
    }

    /// List users visible to the caller, intersected with client filters
    pub async fn list(&self, actor: &AuthUser, filter: &UserFilter) -> ApiResult<Vec<User>> {
        let scope = Scope::for_users(actor.role, actor.id, actor.department_id);

        let mut sql = format!("{} WHERE 1=1", SELECT_USER);
        match scope {
            Scope::Unrestricted => {}
            Scope::Department(_) => sql.push_str(" AND u.department_id = ?"),
            Scope::Owned(_) | Scope::OwnedOrAssigned(_) => sql.push_str(" AND u.id = ?"),
        }
        if filter.role.is_some() {
            sql.push_str(" AND u.role = ?");
        }
        if filter.department_id.is_some() {
            sql.push_str(" AND u.department_id = ?");
        }
        if filter.is_active.is_some() {
            sql.push_str(" AND u.is_active = ?");
        }
        sql.push_str(" ORDER BY u.created_at DESC");

        let mut query = sqlx::query(&sql);
        match scope {
            Scope::Unrestricted => {}
            Scope::Department(dept) => query = query.bind(dept),
            Scope::Owned(id) | Scope::OwnedOrAssigned(id) => query = query.bind(id),
        }
        if let Some(role) = filter.role {
            query = query.bind(role.as_str());
        }
        if let Some(dept) = filter.department_id {
            query = query.bind(dept);
        }
        if let Some(active) = filter.is_active {
            query = query.bind(active);
        }

        let rows = query.fetch_all(&self.db).await?;
        rows.iter().map(User::from_row).collect()
    }

    /// Fetch one user within the caller's scope. A row outside the scope is
    /// reported as not found, same as an absent row.
    pub async fn get(&self, actor: &AuthUser, id: Uuid) -> ApiResult<User> {
        let scope = Scope::for_users(actor.role, actor.id, actor.department_id);

        let mut sql = format!("{} WHERE u.id = ?", SELECT_USER);
        match scope {
            Scope::Unrestricted => {}
            Scope::Department(_) => sql.push_str(" AND u.department_id = ?"),
            Scope::Owned(_) | Scope::OwnedOrAssigned(_) => sql.push_str(" AND u.id = ?"),
        }

        let mut query = sqlx::query(&sql).bind(id);
        match scope {
            Scope::Unrestricted => {}
            Scope::Department(dept) => query = query.bind(dept),
            Scope::Owned(owner) | Scope::OwnedOrAssigned(owner) => query = query.bind(owner),
        }

        let row = query
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        User::from_row(&row)
    }

    /// Fetch without scope checks, for internal use after a mutation
    async fn fetch_by_id(&self, id: Uuid) -> ApiResult<User> {
        let sql = format!("{} WHERE u.id = ?", SELECT_USER);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        User::from_row(&row)
    }

    /// Create a principal (Admin only; enforced at the route layer and
    /// re-checked here)
    pub async fn create(
        &self,
        actor: &AuthUser,
        req: &CreateUserRequest,
        meta: &SourceMeta,
    ) -> ApiResult<User> {
        match actor.role {
            Role::Admin => {}
            Role::DepartmentManager | Role::TeamLead | Role::Employee | Role::Auditor => {
                return Err(ApiError::Authorization(
                    "Only administrators can create users".to_string(),
                ))
            }
        }

        if req.username.trim().is_empty() {
            return Err(ApiError::Validation("Username is required".to_string()));
        }
        password::require_strength(&req.password)?;
        let password_hash = password::hash_password(&req.password)?;

        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users
                (id, username, email, password_hash, first_name, last_name, role,
                 department_id, manager_id, is_active, force_password_change,
                 created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, 0, ?10, ?10)
            "#,
        )
        .bind(id)
        .bind(req.username.trim())
        .bind(&req.email)
        .bind(password_hash)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(req.role.as_str())
        .bind(req.department_id)
        .bind(req.manager_id)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => {
                ApiError::Conflict("Username or email already in use".to_string())
            }
            other => other,
        })?;

        let user = self.fetch_by_id(id).await?;
        let after = serde_json::to_value(&user).ok();
        self.audit
            .record(
                Some(actor.id),
                "user.create",
                "user",
                Some(id),
                None,
                after.as_ref(),
                meta,
            )
            .await;

        Ok(user)
    }

    /// Update a principal. Department managers are confined to their own
    /// department and may not change anyone's role or department.
    pub async fn update(
        &self,
        actor: &AuthUser,
        id: Uuid,
        req: &UpdateUserRequest,
        meta: &SourceMeta,
    ) -> ApiResult<User> {
        let before = self.get(actor, id).await?;

        let role_or_department_change = req.role.is_some() || req.department_id.is_some();
        match actor.role {
            Role::Admin => {}
            Role::DepartmentManager => {
                if role_or_department_change {
                    return Err(ApiError::Authorization(
                        "Managers cannot change a user's role or department".to_string(),
                    ));
                }
            }
            Role::TeamLead | Role::Employee | Role::Auditor => {
                return Err(ApiError::Authorization(
                    "You do not have permission to update users".to_string(),
                ));
            }
        }

        let mut sets = Vec::new();
        if req.email.is_some() {
            sets.push("email = ?");
        }
        if req.first_name.is_some() {
            sets.push("first_name = ?");
        }
        if req.last_name.is_some() {
            sets.push("last_name = ?");
        }
        if req.role.is_some() {
            sets.push("role = ?");
        }
        if req.department_id.is_some() {
            sets.push("department_id = ?");
        }
        if req.manager_id.is_some() {
            sets.push("manager_id = ?");
        }
        if req.is_active.is_some() {
            sets.push("is_active = ?");
        }

        if sets.is_empty() {
            return Err(ApiError::Validation("No fields to update".to_string()));
        }
        sets.push("updated_at = ?");

        let sql = format!("UPDATE users SET {} WHERE id = ?", sets.join(", "));
        let mut query = sqlx::query(&sql);
        if let Some(ref email) = req.email {
            query = query.bind(email);
        }
        if let Some(ref first_name) = req.first_name {
            query = query.bind(first_name);
        }
        if let Some(ref last_name) = req.last_name {
            query = query.bind(last_name);
        }
        if let Some(role) = req.role {
            query = query.bind(role.as_str());
        }
        if let Some(dept) = req.department_id {
            query = query.bind(dept);
        }
        if let Some(manager) = req.manager_id {
            query = query.bind(manager);
        }
        if let Some(active) = req.is_active {
            query = query.bind(active);
        }
        query = query.bind(Utc::now()).bind(id);

        query.execute(&self.db).await.map_err(|e| {
            match ApiError::from(e) {
                ApiError::Conflict(_) => ApiError::Conflict("Email already in use".to_string()),
                other => other,
            }
        })?;

        let after = self.fetch_by_id(id).await?;
        let old = serde_json::to_value(&before).ok();
        let new = serde_json::to_value(&after).ok();
        self.audit
            .record(
                Some(actor.id),
                "user.update",
                "user",
                Some(id),
                old.as_ref(),
                new.as_ref(),
                meta,
            )
            .await;

        Ok(after)
    }

    /// Hard-delete a principal (Admin only, never self). Worksheet and
    /// report authorship columns are nulled by the schema's SET NULL rules;
    /// refresh tokens cascade away.
    pub async fn delete(&self, actor: &AuthUser, id: Uuid, meta: &SourceMeta) -> ApiResult<()> {
        match actor.role {
            Role::Admin => {}
            Role::DepartmentManager | Role::TeamLead | Role::Employee | Role::Auditor => {
                return Err(ApiError::Authorization(
                    "Only administrators can delete users".to_string(),
                ))
            }
        }
        if actor.id == id {
            return Err(ApiError::Authorization(
                "You cannot delete your own account".to_string(),
            ));
        }

        let before = self.fetch_by_id(id).await?;

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        let old = serde_json::to_value(&before).ok();
        self.audit
            .record(
                Some(actor.id),
                "user.delete",
                "user",
                Some(id),
                old.as_ref(),
                None,
                meta,
            )
            .await;

        Ok(())
    }

    /// Active/inactive head count for the dashboard, optionally limited to
    /// one department
    pub async fn stats(&self, department_id: Option<Uuid>) -> ApiResult<UserStats> {
        let mut sql = String::from(
            r#"
            SELECT COUNT(*) AS total,
                   COALESCE(SUM(CASE WHEN is_active = 1 THEN 1 ELSE 0 END), 0) AS active,
                   COALESCE(SUM(CASE WHEN is_active = 0 THEN 1 ELSE 0 END), 0) AS inactive
            FROM users
            WHERE 1=1
            "#,
        );
        if department_id.is_some() {
            sql.push_str(" AND department_id = ?");
        }

        let mut query = sqlx::query(&sql);
        if let Some(dept) = department_id {
            query = query.bind(dept);
        }
        let row = query.fetch_one(&self.db).await?;

        Ok(UserStats {
            total: row.get("total"),
            active: row.get("active"),
            inactive: row.get("inactive"),
        })
    }

    /// List departments (any authenticated caller)
    pub async fn list_departments(&self) -> ApiResult<Vec<Department>> {
        let rows = sqlx::query(
            "SELECT id, name, description, is_active, created_at FROM departments ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Department {
                id: row.get("id"),
                name: row.get("name"),
                description: row.get("description"),
                is_active: row.get("is_active"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    /// Create a department (Admin only)
    pub async fn create_department(
        &self,
        actor: &AuthUser,
        name: &str,
        description: Option<&str>,
        meta: &SourceMeta,
    ) -> ApiResult<Department> {
        match actor.role {
            Role::Admin => {}
            Role::DepartmentManager | Role::TeamLead | Role::Employee | Role::Auditor => {
                return Err(ApiError::Authorization(
                    "Only administrators can create departments".to_string(),
                ))
            }
        }
        if name.trim().is_empty() {
            return Err(ApiError::Validation(
                "Department name is required".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO departments (id, name, description, is_active, created_at) VALUES (?1, ?2, ?3, 1, ?4)",
        )
        .bind(id)
        .bind(name.trim())
        .bind(description)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => {
                ApiError::Conflict("Department name already exists".to_string())
            }
            other => other,
        })?;

        let department = Department {
            id,
            name: name.trim().to_string(),
            description: description.map(|s| s.to_string()),
            is_active: true,
            created_at: now,
        };
        let after = serde_json::to_value(&department).ok();
        self.audit
            .record(
                Some(actor.id),
                "department.create",
                "department",
                Some(id),
                None,
                after.as_ref(),
                meta,
            )
            .await;

        Ok(department)
    }

    /// List roles with their typed permission maps
    pub async fn list_roles(&self) -> ApiResult<Vec<RoleInfo>> {
        let rows = sqlx::query("SELECT name, description, permissions FROM roles ORDER BY name")
            .fetch_all(&self.db)
            .await?;

        let mut roles = Vec::new();
        for row in rows {
            let name: String = row.get("name");
            let raw: String = row.get("permissions");
            roles.push(RoleInfo {
                name: Role::from_str(&name)?,
                description: row.get("description"),
                permissions: PermissionMap::from_json(&raw)?,
            });
        }

        Ok(roles)
    }

    /// Load a principal's permission map from its role row
    pub async fn permissions_for_role(&self, role: Role) -> ApiResult<PermissionMap> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT permissions FROM roles WHERE name = ?")
                .bind(role.as_str())
                .fetch_optional(&self.db)
                .await?;

        match raw {
            Some(raw) => PermissionMap::from_json(&raw),
            None => Ok(PermissionMap::default()),
        }
    }
}
