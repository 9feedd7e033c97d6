mod error;
mod tasks;
mod users;

use axum::{Json, Router, routing::get};
use serde_json::json;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::TokenAuthority;
use crate::rate_limit::{RateLimitConfig, RateLimitSettings};

pub use error::ApiError;
pub use tasks::TasksState;
pub use users::UsersState;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    tokens: Arc<TokenAuthority>,
    secure_cookies: bool,
    rate_limits: &RateLimitSettings,
) -> Router {
    let users_state = UsersState {
        db: db.clone(),
        tokens: tokens.clone(),
        secure_cookies,
        rate_limit_config: Arc::new(RateLimitConfig::new(rate_limits)),
    };

    let tasks_state = TasksState { db, tokens };

    Router::new()
        .route("/health", get(health))
        .nest("/users", users::router(users_state))
        .nest("/tasks", tasks::router(tasks_state))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "message": "api working" }))
}
