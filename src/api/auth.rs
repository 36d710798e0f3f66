/// Authentication endpoints
use super::middleware::{ClientMeta, CurrentUser};
use crate::{
    account::{ChangePasswordRequest, LoginRequest, LogoutRequest, RefreshRequest, ResetPasswordRequest},
    context::AppContext,
    error::ApiResult,
};
use axum::{
    extract::State,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/change-password", post(change_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/me", get(me))
}

async fn login(
    State(ctx): State<AppContext>,
    ClientMeta(meta): ClientMeta,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let session = ctx.sessions.login(&req, &meta).await?;
    Ok(super::success_with_message("Login successful", session))
}

async fn refresh(
    State(ctx): State<AppContext>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<impl IntoResponse> {
    let tokens = ctx.sessions.refresh(&req).await?;
    Ok(super::success(tokens))
}

async fn logout(
    State(ctx): State<AppContext>,
    user: Option<CurrentUser>,
    ClientMeta(meta): ClientMeta,
    req: Option<Json<LogoutRequest>>,
) -> ApiResult<impl IntoResponse> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let actor = user.as_ref().map(|CurrentUser(u)| u);
    ctx.sessions.logout(actor, &req, &meta).await?;
    Ok(super::message("Logged out"))
}

async fn change_password(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    ClientMeta(meta): ClientMeta,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    ctx.sessions.change_password(&user, &req, &meta).await?;
    Ok(super::message("Password changed successfully"))
}

async fn reset_password(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
    ClientMeta(meta): ClientMeta,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    ctx.sessions.reset_password(&user, &req, &meta).await?;
    Ok(super::message("Password reset successfully"))
}

async fn me(
    State(ctx): State<AppContext>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let profile = ctx.users.get(&user, user.id).await?;
    Ok(super::success(profile))
}
