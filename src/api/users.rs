/// User, department, and role endpoints
use super::middleware::{ClientMeta, CurrentUser};
use crate::{
    authz::{self, Action, Resource},
    context::AppContext,
    error::{ApiError, ApiResult},
    users::{CreateUserRequest, UpdateUserRequest, UserFilter},
};
use validator::Validate;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/departments", get(list_departments).post(create_department))
        .route("/users/roles", get(list_roles))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

async fn list_users(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<UserFilter>,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Users, Action::Read)?;
    let users = ctx.users.list(&user, &filter).await?;
    Ok(super::success(users))
}

async fn get_user(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    // Everyone can read their own profile; anything else needs the permission
    if id != user.id {
        authz::require(user.role, &user.permissions, Resource::Users, Action::Read)?;
    }
    let found = ctx.users.get(&user, id).await?;
    Ok(super::success(found))
}

async fn create_user(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    ClientMeta(meta): ClientMeta,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Users, Action::Create)?;
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let created = ctx.users.create(&user, &req, &meta).await?;
    Ok((
        StatusCode::CREATED,
        super::success_with_message("User created successfully", created),
    ))
}

async fn update_user(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    ClientMeta(meta): ClientMeta,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Users, Action::Update)?;
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let updated = ctx.users.update(&user, id, &req, &meta).await?;
    Ok(super::success_with_message("User updated successfully", updated))
}

async fn delete_user(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    ClientMeta(meta): ClientMeta,
) -> ApiResult<impl IntoResponse> {
    authz::require(user.role, &user.permissions, Resource::Users, Action::Delete)?;
    ctx.users.delete(&user, id, &meta).await?;
    Ok(super::message("User deleted successfully"))
}

async fn list_departments(
    State(ctx): State<AppContext>,
    CurrentUser(_user): CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let departments = ctx.users.list_departments().await?;
    Ok(super::success(departments))
}

#[derive(Debug, Deserialize)]
struct CreateDepartmentRequest {
    name: String,
    description: Option<String>,
}

async fn create_department(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    ClientMeta(meta): ClientMeta,
    Json(req): Json<CreateDepartmentRequest>,
) -> ApiResult<impl IntoResponse> {
    authz::require(
        user.role,
        &user.permissions,
        Resource::Departments,
        Action::Create,
    )?;
    let department = ctx
        .users
        .create_department(&user, &req.name, req.description.as_deref(), &meta)
        .await?;
    Ok((
        StatusCode::CREATED,
        super::success_with_message("Department created successfully", department),
    ))
}

async fn list_roles(
    State(ctx): State<AppContext>,
    CurrentUser(_user): CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let roles = ctx.users.list_roles().await?;
    Ok(super::success(roles))
}
