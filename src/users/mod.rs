/// User, department, and role records

mod store;

pub use store::UserStore;

use crate::authz::{PermissionMap, Role};
use crate::error::ApiResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;
use validator::Validate;

/// A portal principal. The password hash is never part of this struct and
/// never leaves the store layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
    pub manager_id: Option<Uuid>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub force_password_change: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Map a joined user row (users u LEFT JOIN departments d) into a User
    pub fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        let role_str: String = row.get("role");
        let role = Role::from_str(&role_str)?;

        Ok(User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            role,
            department_id: row.get("department_id"),
            department_name: row.get("department_name"),
            manager_id: row.get("manager_id"),
            is_active: row.get("is_active"),
            last_login: row.get("last_login"),
            force_password_change: row.get("force_password_change"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

/// A department, used as a scoping boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A role row with its typed permission map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleInfo {
    pub name: Role,
    pub description: Option<String>,
    pub permissions: PermissionMap,
}

/// Admin user-creation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(email)]
    pub email: Option<String>,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub department_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
}

/// Partial user update; absent fields are left untouched. Role and
/// department changes are Admin-only.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email)]
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub department_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

/// Active/inactive head count for the dashboard
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
}

/// Client-supplied list filters, intersected with the caller's scope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub department_id: Option<Uuid>,
    pub is_active: Option<bool>,
}
