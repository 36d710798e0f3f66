/// Audit trail endpoint
use super::middleware::CurrentUser;
use crate::{
    audit::AuditFilter,
    authz::Role,
    context::AppContext,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};

pub fn routes() -> Router<AppContext> {
    Router::new().route("/audit", get(list))
}

async fn list(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<AuditFilter>,
) -> ApiResult<impl IntoResponse> {
    // The trail is restricted to administrators and auditors; department
    // managers see their team's work through the resource endpoints instead
    match user.role {
        Role::Admin | Role::Auditor => {}
        Role::DepartmentManager | Role::TeamLead | Role::Employee => {
            return Err(ApiError::Authorization(
                "You do not have permission to view the audit trail".to_string(),
            ))
        }
    }

    let entries = ctx.audit.list(&filter).await?;
    Ok(super::success(entries))
}
