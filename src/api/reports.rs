/// Report endpoints
use super::middleware::{ClientMeta, CurrentUser};
use crate::{
    authz::{self, Action, Resource},
    context::AppContext,
    error::ApiResult,
    reports::{CreateReportRequest, ReportApproveRequest, ReportFilter, UpdateReportRequest},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use uuid::Uuid;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/reports", get(list).post(create))
        .route("/reports/:id", get(get_one).put(update).delete(delete))
        .route("/reports/:id/approve", post(approve))
}

async fn list(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<ReportFilter>,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Reports, Action::Read)?;
    let reports = ctx.reports.list(&user, &filter).await?;
    Ok(super::success(reports))
}

async fn get_one(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Reports, Action::Read)?;
    let report = ctx.reports.get(&user, id).await?;
    Ok(super::success(report))
}

async fn create(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    ClientMeta(meta): ClientMeta,
    Json(req): Json<CreateReportRequest>,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Reports, Action::Create)?;
    let report = ctx.reports.create(&user, &req, &meta).await?;
    let message = if req.submit {
        "Report submitted successfully"
    } else {
        "Report created as draft"
    };
    Ok((
        StatusCode::CREATED,
        super::success_with_message(message, report),
    ))
}

async fn update(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    ClientMeta(meta): ClientMeta,
    Json(req): Json<UpdateReportRequest>,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Reports, Action::Update)?;
    let report = ctx.reports.update(&user, id, &req, &meta).await?;
    Ok(super::success_with_message("Report updated successfully", report))
}

async fn delete(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    ClientMeta(meta): ClientMeta,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Reports, Action::Delete)?;
    ctx.reports.delete(&user, id, &meta).await?;
    Ok(super::message("Report deleted successfully"))
}

async fn approve(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    ClientMeta(meta): ClientMeta,
    Json(req): Json<ReportApproveRequest>,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Reports, Action::Approve)?;
    let report = ctx.reports.approve(&user, id, &req, &meta).await?;
    Ok(super::success(report))
}
