/// Dashboard statistics endpoint
use super::middleware::CurrentUser;
use crate::{
    audit::AuditEntry,
    authz::{self, Action, Resource, Role},
    context::AppContext,
    error::ApiResult,
    reports::ReportStats,
    users::UserStats,
    worksheets::WorksheetStats,
};
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use serde::Serialize;

const RECENT_ACTIVITY_LIMIT: i64 = 10;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/dashboard/stats", get(stats))
}

#[derive(Debug, Serialize)]
struct DashboardStats {
    worksheets: WorksheetStats,
    reports: ReportStats,
    users: Option<UserStats>,
    recent_activity: Vec<AuditEntry>,
}

/// Role-scoped status roll-up: worksheets and reports follow the caller's
/// row scope, user head counts are reserved for admins and department
/// managers, and recent activity narrows the same way.
async fn stats(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<impl IntoResponse> {
    authz::require(
        user.role,
        &user.permissions,
        Resource::Dashboards,
        Action::Read,
    )?;

    let worksheets = ctx.worksheets.status_counts(&user).await?;
    let reports = ctx.reports.status_counts(&user).await?;

    let users = match (user.role, user.department_id) {
        (Role::Admin, _) => Some(ctx.users.stats(None).await?),
        (Role::DepartmentManager, Some(dept)) => Some(ctx.users.stats(Some(dept)).await?),
        _ => None,
    };

    let recent_activity = match (user.role, user.department_id) {
        (Role::Admin | Role::Auditor, _) => {
            ctx.audit.recent(None, None, RECENT_ACTIVITY_LIMIT).await?
        }
        (Role::DepartmentManager, Some(dept)) => {
            ctx.audit
                .recent(None, Some(dept), RECENT_ACTIVITY_LIMIT)
                .await?
        }
        _ => {
            ctx.audit
                .recent(Some(user.id), None, RECENT_ACTIVITY_LIMIT)
                .await?
        }
    };

    Ok(super::success(DashboardStats {
        worksheets,
        reports,
        users,
        recent_activity,
    }))
}
