//! Task groups. Every statement carries `user_id = principal` in its predicate,
//! so another user's group is indistinguishable from a missing one.

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
    auth::Principal, json_body, parse_id, ApiError, IdResponse, ErrorResponse,
    MessageResponse,
};

const TITLE_MAX_CHARS: usize = 255;

#[derive(ToSchema, Serialize, Debug)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub user_id: i64,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct GroupRequest {
    pub title: String,
}

pub(crate) fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::BadRequest("title cannot be empty"));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(ApiError::BadRequest("title too long"));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/groups",
    responses(
        (status = 200, description = "Caller's groups, newest first.", body = [Group]),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn list_groups(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<Json<Vec<Group>>, ApiError> {
    let query = "SELECT id, title, user_id FROM groups WHERE user_id = $1 ORDER BY id DESC";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(principal.user_id.get())
        .fetch_all(&pool.0)
        .instrument(span)
        .await?;

    let groups = rows
        .iter()
        .map(|row| {
            Ok(Group {
                id: row.try_get("id")?,
                title: row.try_get("title")?,
                user_id: row.try_get("user_id")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(Json(groups))
}

#[utoipa::path(
    post,
    path = "/api/groups",
    request_body = GroupRequest,
    responses(
        (status = 201, description = "Group created.", body = Group),
        (status = 400, description = "Invalid title.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn create_group(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    payload: Result<Json<GroupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    let request = json_body(payload)?;
    validate_title(&request.title)?;

    let query = "INSERT INTO groups (title, user_id) VALUES ($1, $2) RETURNING id";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(&request.title)
        .bind(principal.user_id.get())
        .fetch_one(&pool.0)
        .instrument(span)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(Group {
            id: row.try_get("id")?,
            title: request.title,
            user_id: principal.user_id.get(),
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/groups/{id}",
    params(("id" = i64, Path, description = "Group id")),
    request_body = GroupRequest,
    responses(
        (status = 200, description = "Group renamed.", body = MessageResponse),
        (status = 400, description = "Invalid id or title.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
        (status = 404, description = "Group not found.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn update_group(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    payload: Result<Json<GroupRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let group_id = parse_id(&id, "invalid group id")?;
    let request = json_body(payload)?;
    validate_title(&request.title)?;

    let query = "UPDATE groups SET title = $1 WHERE id = $2 AND user_id = $3";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(&request.title)
        .bind(group_id)
        .bind(principal.user_id.get())
        .execute(&pool.0)
        .instrument(span)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("group not found"));
    }

    Ok(Json(MessageResponse::new("group updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/groups/{id}",
    params(("id" = i64, Path, description = "Group id")),
    responses(
        (status = 200, description = "Group and its tasks deleted.", body = IdResponse),
        (status = 400, description = "Invalid id.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
        (status = 404, description = "Group not found.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "groups"
)]
pub async fn delete_group(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<Json<IdResponse>, ApiError> {
    let group_id = parse_id(&id, "invalid group id")?;

    let query = "DELETE FROM groups WHERE id = $1 AND user_id = $2";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(group_id)
        .bind(principal.user_id.get())
        .execute(&pool.0)
        .instrument(span)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("group not found"));
    }

    Ok(Json(IdResponse { id: group_id }))
}
