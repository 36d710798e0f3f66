/// API routes and handlers
pub mod audit;
pub mod auth;
pub mod dashboard;
pub mod middleware;
pub mod reports;
pub mod users;
pub mod worksheets;

use crate::context::AppContext;
use axum::{response::Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(auth::routes())
        .merge(users::routes())
        .merge(worksheets::routes())
        .merge(reports::routes())
        .merge(dashboard::routes())
        .merge(audit::routes())
}

/// `{ "success": true, "data": ... }`
pub(crate) fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

/// `{ "success": true, "message": ..., "data": ... }`
pub(crate) fn success_with_message<T: Serialize>(message: &str, data: T) -> Json<Value> {
    Json(json!({ "success": true, "message": message, "data": data }))
}

/// `{ "success": true, "message": ... }`
pub(crate) fn message(message: &str) -> Json<Value> {
    Json(json!({ "success": true, "message": message }))
}
