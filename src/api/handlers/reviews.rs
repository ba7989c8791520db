//! Reviews and their moderation queue.
//!
//! New reviews start `pending`; only `approved` ones are public. Moderation
//! records which admin acted and when.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info, info_span, Instrument};
use utoipa::{IntoParams, ToSchema};

use super::{
    auth::Principal, json_body, parse_id, ApiError, ErrorResponse, IdResponse, MessageResponse,
};

const PUBLIC_REVIEW_LIMIT: i64 = 50;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(ToSchema, Serialize, Debug)]
pub struct Review {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub rating: i32,
    pub comment: String,
    pub status: ReviewStatus,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderated_at: Option<String>,
}

impl Review {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let moderated_at: Option<DateTime<Utc>> = row.try_get("moderated_at")?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            rating: row.try_get("rating")?,
            comment: row.try_get("comment")?,
            status: ReviewStatus::parse(&status).ok_or_else(|| sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: format!("unknown review status: {status}").into(),
            })?,
            created_at: created_at.to_rfc3339(),
            moderated_at: moderated_at.map(|at| at.to_rfc3339()),
        })
    }
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct CreateReviewRequest {
    pub rating: i32,
    pub comment: String,
}

impl CreateReviewRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if !(1..=5).contains(&self.rating) {
            return Err(ApiError::BadRequest("rating must be between 1 and 5"));
        }
        if self.comment.trim().is_empty() {
            return Err(ApiError::BadRequest("comment cannot be empty"));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, IntoParams)]
pub struct ReviewFilter {
    /// `pending` (default), `approved` or `rejected`.
    pub status: Option<String>,
}

impl ReviewFilter {
    fn status(&self) -> Result<ReviewStatus, ApiError> {
        match self.status.as_deref() {
            None | Some("") => Ok(ReviewStatus::default()),
            Some(value) => {
                ReviewStatus::parse(value).ok_or(ApiError::BadRequest("invalid review status"))
            }
        }
    }
}

const REVIEW_COLUMNS: &str = r"
    SELECT r.id, r.user_id, u.username, r.rating, r.comment, r.status, r.created_at, r.moderated_at
    FROM reviews r
    JOIN users u ON r.user_id = u.id
    WHERE r.status = $1
    ORDER BY r.created_at DESC
";

async fn fetch_reviews(
    pool: &PgPool,
    status: ReviewStatus,
    limit: Option<i64>,
) -> Result<Vec<Review>, ApiError> {
    let query = match limit {
        Some(_) => format!("{REVIEW_COLUMNS} LIMIT $2"),
        None => REVIEW_COLUMNS.to_string(),
    };
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let mut statement = sqlx::query(&query).bind(status.as_str());
    if let Some(limit) = limit {
        statement = statement.bind(limit);
    }
    let rows = statement.fetch_all(pool).instrument(span).await?;

    rows.iter()
        .map(Review::from_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(ApiError::from)
}

#[utoipa::path(
    get,
    path = "/api/reviews",
    responses(
        (status = 200, description = "Latest approved reviews.", body = [Review]),
    ),
    tag = "reviews"
)]
pub async fn list_reviews(pool: Extension<PgPool>) -> Result<Json<Vec<Review>>, ApiError> {
    Ok(Json(
        fetch_reviews(&pool.0, ReviewStatus::Approved, Some(PUBLIC_REVIEW_LIMIT)).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review submitted for moderation.", body = IdResponse),
        (status = 400, description = "Invalid rating or comment.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "reviews"
)]
pub async fn create_review(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    payload: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let request = json_body(payload)?;
    request.validate()?;

    let query = r"
        INSERT INTO reviews (user_id, rating, comment, status)
        VALUES ($1, $2, $3, 'pending')
        RETURNING id
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(principal.user_id.get())
        .bind(request.rating)
        .bind(&request.comment)
        .fetch_one(&pool.0)
        .instrument(span)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IdResponse {
            id: row.try_get("id")?,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/reviews",
    params(ReviewFilter),
    responses(
        (status = 200, description = "Reviews with the requested status.", body = [Review]),
        (status = 400, description = "Unknown status.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
        (status = 403, description = "Admin role required.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn admin_list_reviews(
    Query(filter): Query<ReviewFilter>,
    pool: Extension<PgPool>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let status = filter.status()?;
    Ok(Json(fetch_reviews(&pool.0, status, None).await?))
}

async fn moderate(
    pool: &PgPool,
    principal: &Principal,
    review_id: i64,
    status: ReviewStatus,
) -> Result<(), ApiError> {
    let query = r"
        UPDATE reviews
        SET status = $1, moderated_by = $2, moderated_at = NOW()
        WHERE id = $3
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(status.as_str())
        .bind(principal.user_id.get())
        .bind(review_id)
        .execute(pool)
        .instrument(span)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("review not found"));
    }

    info!(
        admin_id = %principal.user_id,
        review_id,
        status = status.as_str(),
        "review moderated"
    );
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/admin/reviews/{id}/approve",
    params(("id" = i64, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review approved.", body = MessageResponse),
        (status = 400, description = "Invalid id.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
        (status = 403, description = "Admin role required.", body = ErrorResponse),
        (status = 404, description = "Review not found.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn approve_review(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    let review_id = parse_id(&id, "invalid review id")?;
    moderate(&pool.0, &principal, review_id, ReviewStatus::Approved).await?;
    Ok(Json(MessageResponse::new("review approved")))
}

#[utoipa::path(
    post,
    path = "/api/admin/reviews/{id}/reject",
    params(("id" = i64, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review rejected.", body = MessageResponse),
        (status = 400, description = "Invalid id.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
        (status = 403, description = "Admin role required.", body = ErrorResponse),
        (status = 404, description = "Review not found.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn reject_review(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    let review_id = parse_id(&id, "invalid review id")?;
    moderate(&pool.0, &principal, review_id, ReviewStatus::Rejected).await?;
    Ok(Json(MessageResponse::new("review rejected")))
}

#[utoipa::path(
    delete,
    path = "/api/admin/reviews/{id}",
    params(("id" = i64, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review deleted.", body = IdResponse),
        (status = 400, description = "Invalid id.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
        (status = 403, description = "Admin role required.", body = ErrorResponse),
        (status = 404, description = "Review not found.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn delete_review(
    Path(id): Path<String>,
    pool: Extension<PgPool>,
) -> Result<Json<IdResponse>, ApiError> {
    let review_id = parse_id(&id, "invalid review id")?;

    let query = "DELETE FROM reviews WHERE id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(review_id)
        .execute(&pool.0)
        .instrument(span)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("review not found"));
    }

    Ok(Json(IdResponse { id: review_id }))
}
