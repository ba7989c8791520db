//! Tasks inside groups.
//!
//! A task is owned through its group: every statement joins back to
//! `groups.user_id`, so a task in someone else's group answers 404.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};
use utoipa::ToSchema;

use super::{
    auth::Principal, groups::validate_title, json_body, parse_id, ApiError, ErrorResponse,
    IdResponse, MessageResponse,
};

#[derive(ToSchema, Serialize, Debug)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub done: bool,
    pub group_id: i64,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct CreateTaskRequest {
    pub title: String,
}

/// At least one field must be present.
#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub done: Option<bool>,
}

impl UpdateTaskRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.title.is_none() && self.done.is_none() {
            return Err(ApiError::BadRequest("nothing to update"));
        }
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        Ok(())
    }
}

async fn owns_group(pool: &PgPool, principal: &Principal, group_id: i64) -> Result<bool, ApiError> {
    let query = "SELECT 1 FROM groups WHERE id = $1 AND user_id = $2";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(group_id)
        .bind(principal.user_id.get())
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.is_some())
}

#[utoipa::path(
    get,
    path = "/api/groups/{id}/tasks",
    params(("id" = i64, Path, description = "Group id")),
    responses(
        (status = 200, description = "Tasks in the group, newest first.", body = [Task]),
        (status = 400, description = "Invalid id.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
        (status = 404, description = "Group not found.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn list_tasks(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let group_id = parse_id(&id, "invalid group id")?;

    if !owns_group(&pool.0, &principal, group_id).await? {
        return Err(ApiError::NotFound("group not found"));
    }

    let query = "SELECT id, title, done, group_id FROM tasks WHERE group_id = $1 ORDER BY id DESC";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(group_id)
        .fetch_all(&pool.0)
        .instrument(span)
        .await?;

    let tasks = rows
        .iter()
        .map(|row| {
            Ok(Task {
                id: row.try_get("id")?,
                title: row.try_get("title")?,
                done: row.try_get("done")?,
                group_id: row.try_get("group_id")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(Json(tasks))
}

#[utoipa::path(
    post,
    path = "/api/groups/{id}/tasks",
    params(("id" = i64, Path, description = "Group id")),
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created.", body = Task),
        (status = 400, description = "Invalid id or title.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
        (status = 404, description = "Group not found.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn create_task(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let group_id = parse_id(&id, "invalid group id")?;
    let request = json_body(payload)?;
    validate_title(&request.title)?;

    // Insert only when the group belongs to the caller.
    let query = r"
        INSERT INTO tasks (title, group_id, done)
        SELECT $1, g.id, FALSE FROM groups g WHERE g.id = $2 AND g.user_id = $3
        RETURNING id
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(&request.title)
        .bind(group_id)
        .bind(principal.user_id.get())
        .fetch_optional(&pool.0)
        .instrument(span)
        .await?
        .ok_or(ApiError::NotFound("group not found"))?;

    Ok((
        StatusCode::CREATED,
        Json(Task {
            id: row.try_get("id")?,
            title: request.title,
            done: false,
            group_id,
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task id")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated.", body = MessageResponse),
        (status = 400, description = "Invalid id or empty update.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
        (status = 404, description = "Task not found.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn update_task(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let task_id = parse_id(&id, "invalid task id")?;
    let request = json_body(payload)?;
    request.validate()?;

    let query = r"
        UPDATE tasks t
        SET title = COALESCE($1, t.title), done = COALESCE($2, t.done)
        FROM groups g
        WHERE t.id = $3 AND t.group_id = g.id AND g.user_id = $4
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(request.title.as_deref())
        .bind(request.done)
        .bind(task_id)
        .bind(principal.user_id.get())
        .execute(&pool.0)
        .instrument(span)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("task not found"));
    }

    Ok(Json(MessageResponse::new("task updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task deleted.", body = IdResponse),
        (status = 400, description = "Invalid id.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
        (status = 404, description = "Task not found.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn delete_task(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<Json<IdResponse>, ApiError> {
    let task_id = parse_id(&id, "invalid task id")?;

    let query = r"
        DELETE FROM tasks t
        USING groups g
        WHERE t.id = $1 AND t.group_id = g.id AND g.user_id = $2
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(task_id)
        .bind(principal.user_id.get())
        .execute(&pool.0)
        .instrument(span)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("task not found"));
    }

    Ok(Json(IdResponse { id: task_id }))
}
