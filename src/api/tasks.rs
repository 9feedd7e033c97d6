//! Task CRUD. Every handler is scoped to the authenticated account; a task
//! owned by another account answers 404.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ApiJson, ResultExt, parse_id};
use crate::auth::AccountAuth;
use crate::db::{DEFAULT_PAGE_SIZE, Database, MAX_PAGE_SIZE, Task, TaskFilter};
use crate::impl_has_auth_backend;
use crate::jwt::TokenAuthority;

const MAX_TITLE_LENGTH: usize = 500;

#[derive(Clone)]
pub struct TasksState {
    pub db: Database,
    pub tokens: Arc<TokenAuthority>,
}

impl_has_auth_backend!(TasksState);

pub fn router(state: TasksState) -> Router {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route(
            "/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/{id}/toggle", put(toggle_task))
        .with_state(state)
}

#[derive(Deserialize)]
struct CreateTaskRequest {
    title: Option<String>,
}

#[derive(Deserialize)]
struct UpdateTaskRequest {
    title: Option<String>,
    completed: Option<bool>,
}

/// Raw query parameters, parsed by hand so bad values get a JSON 400.
#[derive(Deserialize)]
struct ListTasksQuery {
    completed: Option<String>,
    search: Option<String>,
    page: Option<String>,
    limit: Option<String>,
}

#[derive(Serialize)]
struct TaskView {
    id: i64,
    title: String,
    completed: bool,
    created_at: String,
    updated_at: String,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            completed: task.completed,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Serialize)]
struct TaskResponse {
    message: &'static str,
    task: TaskView,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct Pagination {
    page: u32,
    limit: u32,
    total: i64,
    total_pages: i64,
}

#[derive(Serialize)]
struct TaskListResponse {
    message: &'static str,
    tasks: Vec<TaskView>,
    pagination: Pagination,
}

/// Trim and check a title. `empty_msg` differs between create and update.
fn validate_title<'a>(title: &'a str, empty_msg: &str) -> Result<&'a str, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request(empty_msg));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Title cannot be longer than {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title)
}

impl ListTasksQuery {
    fn into_filter(self) -> Result<TaskFilter, ApiError> {
        let completed = match self.completed.as_deref() {
            None | Some("") => None,
            Some("true") => Some(true),
            Some("false") => Some(false),
            Some(_) => {
                return Err(ApiError::bad_request(
                    "completed must be true or false",
                ));
            }
        };

        let page = match self.page.as_deref() {
            None | Some("") => 1,
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| ApiError::bad_request("page must be a positive integer"))?,
        };

        let limit = match self.limit.as_deref() {
            None | Some("") => DEFAULT_PAGE_SIZE,
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|l| (1..=MAX_PAGE_SIZE).contains(l))
                .ok_or_else(|| {
                    ApiError::bad_request(format!("limit must be between 1 and {}", MAX_PAGE_SIZE))
                })?,
        };

        Ok(TaskFilter {
            completed,
            search: self.search,
            page,
            limit,
        })
    }
}

async fn create_task(
    State(state): State<TasksState>,
    AccountAuth(account): AccountAuth,
    ApiJson(payload): ApiJson<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = validate_title(payload.title.as_deref().unwrap_or(""), "Title is required")?;

    let task = state
        .db
        .tasks()
        .create(account.id, title)
        .await
        .db_err("Failed to create task")?;

    Ok((
        StatusCode::CREATED,
        Json(TaskResponse {
            message: "Task created successfully",
            task: task.into(),
        }),
    ))
}

async fn list_tasks(
    State(state): State<TasksState>,
    AccountAuth(account): AccountAuth,
    Query(query): Query<ListTasksQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.into_filter()?;

    let page = state
        .db
        .tasks()
        .list(account.id, &filter)
        .await
        .db_err("Failed to list tasks")?;

    let limit = i64::from(filter.limit);
    let total_pages = (page.total + limit - 1) / limit;

    Ok(Json(TaskListResponse {
        message: "Tasks retrieved successfully",
        tasks: page.tasks.into_iter().map(TaskView::from).collect(),
        pagination: Pagination {
            page: filter.page,
            limit: filter.limit,
            total: page.total,
            total_pages,
        },
    }))
}

async fn get_task(
    State(state): State<TasksState>,
    AccountAuth(account): AccountAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "task")?;

    let task = state
        .db
        .tasks()
        .get(id, account.id)
        .await
        .db_err("Failed to get task")?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    Ok(Json(TaskResponse {
        message: "Task retrieved successfully",
        task: task.into(),
    }))
}

async fn update_task(
    State(state): State<TasksState>,
    AccountAuth(account): AccountAuth,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "task")?;

    // Ownership first, so a foreign task is 404 regardless of the body
    state
        .db
        .tasks()
        .get(id, account.id)
        .await
        .db_err("Failed to get task")?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    let title = payload
        .title
        .as_deref()
        .map(|t| validate_title(t, "Title cannot be empty"))
        .transpose()?;

    if title.is_none() && payload.completed.is_none() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let task = state
        .db
        .tasks()
        .update(id, account.id, title, payload.completed)
        .await
        .db_err("Failed to update task")?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    Ok(Json(TaskResponse {
        message: "Task updated successfully",
        task: task.into(),
    }))
}

async fn toggle_task(
    State(state): State<TasksState>,
    AccountAuth(account): AccountAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "task")?;

    let task = state
        .db
        .tasks()
        .toggle(id, account.id)
        .await
        .db_err("Failed to toggle task")?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    Ok(Json(TaskResponse {
        message: "Task toggled successfully",
        task: task.into(),
    }))
}

async fn delete_task(
    State(state): State<TasksState>,
    AccountAuth(account): AccountAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "task")?;

    let deleted = state
        .db
        .tasks()
        .delete(id, account.id)
        .await
        .db_err("Failed to delete task")?;

    if !deleted {
        return Err(ApiError::not_found("Task not found"));
    }

    Ok(Json(MessageResponse {
        message: "Task deleted successfully",
    }))
}
