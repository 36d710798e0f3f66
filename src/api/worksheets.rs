/// Worksheet endpoints
use super::middleware::{ClientMeta, CurrentUser};
use crate::{
    authz::{self, Action, Resource},
    context::AppContext,
    error::ApiResult,
    worksheets::{ApproveRequest, CreateWorksheetRequest, UpdateWorksheetRequest, WorksheetFilter},
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
        .route("/worksheets", get(list).post(create))
        .route("/worksheets/:id", get(get_one).put(update).delete(delete))
        .route("/worksheets/:id/submit", post(submit))
        .route("/worksheets/:id/approve", post(approve))
}

async fn list(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<WorksheetFilter>,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Worksheets, Action::Read)?;
    let worksheets = ctx.worksheets.list(&user, &filter).await?;
    Ok(super::success(worksheets))
}

async fn get_one(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Worksheets, Action::Read)?;
    let worksheet = ctx.worksheets.get(&user, id).await?;
    Ok(super::success(worksheet))
}

async fn create(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    ClientMeta(meta): ClientMeta,
    Json(req): Json<CreateWorksheetRequest>,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Worksheets, Action::Create)?;
    let worksheet = ctx.worksheets.create(&user, &req, &meta).await?;
    Ok((
        StatusCode::CREATED,
        super::success_with_message("Worksheet created successfully", worksheet),
    ))
}

async fn update(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    ClientMeta(meta): ClientMeta,
    Json(req): Json<UpdateWorksheetRequest>,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Worksheets, Action::Update)?;
    let worksheet = ctx.worksheets.update(&user, id, &req, &meta).await?;
    Ok(super::success_with_message("Worksheet updated successfully", worksheet))
}

async fn delete(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    ClientMeta(meta): ClientMeta,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Worksheets, Action::Delete)?;
    ctx.worksheets.delete(&user, id, &meta).await?;
    Ok(super::message("Worksheet deleted successfully"))
}

async fn submit(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    ClientMeta(meta): ClientMeta,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Worksheets, Action::Update)?;
    let worksheet = ctx.worksheets.submit(&user, id, &meta).await?;
    Ok(super::success_with_message(
        "Worksheet submitted for approval",
        worksheet,
    ))
}

async fn approve(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    ClientMeta(meta): ClientMeta,
    Json(req): Json<ApproveRequest>,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Worksheets, Action::Approve)?;
    let worksheet = ctx.worksheets.approve(&user, id, &req, &meta).await?;
    Ok(super::success(worksheet))
}
