//! The caller's own profile. Always keyed by the principal, never by a path id.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};
use utoipa::ToSchema;

use super::{auth::Principal, json_body, ApiError, ErrorResponse, MessageResponse};

const GENDERS: [&str; 3] = ["M", "F", "O"];

#[derive(ToSchema, Serialize, Debug, PartialEq, Eq)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub birthdate: String,
    pub gender: String,
    pub profile_tag: String,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// `YYYY-MM-DD`, or empty to clear.
    #[serde(default)]
    pub birthdate: String,
    /// `M`, `F`, `O`, or empty to clear.
    #[serde(default)]
    pub gender: String,
}

/// Validated profile columns, empty strings mapped to `NULL`.
#[derive(Debug, PartialEq, Eq)]
struct ProfileUpdate {
    first_name: String,
    last_name: String,
    birthdate: Option<NaiveDate>,
    gender: Option<String>,
}

impl UpdateProfileRequest {
    fn validate(self) -> Result<ProfileUpdate, ApiError> {
        let birthdate = if self.birthdate.is_empty() {
            None
        } else {
            Some(
                NaiveDate::parse_from_str(&self.birthdate, "%Y-%m-%d").map_err(|_| {
                    ApiError::BadRequest("invalid birthdate format, use YYYY-MM-DD")
                })?,
            )
        };

        let gender = if self.gender.is_empty() {
            None
        } else if GENDERS.contains(&self.gender.as_str()) {
            Some(self.gender)
        } else {
            return Err(ApiError::BadRequest("invalid gender value"));
        };

        Ok(ProfileUpdate {
            first_name: self.first_name,
            last_name: self.last_name,
            birthdate,
            gender,
        })
    }
}

#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Caller profile.", body = Profile),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
        (status = 404, description = "Profile not found.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "profile"
)]
pub async fn get_profile(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<Json<Profile>, ApiError> {
    let query = r"
        SELECT id, username,
            COALESCE(first_name, '') AS first_name,
            COALESCE(last_name, '') AS last_name,
            COALESCE(TO_CHAR(birthdate, 'YYYY-MM-DD'), '') AS birthdate,
            COALESCE(gender, '') AS gender,
            profile_tag
        FROM users WHERE id = $1
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(principal.user_id.get())
        .fetch_optional(&pool.0)
        .instrument(span)
        .await?
        .ok_or(ApiError::NotFound("profile not found"))?;

    Ok(Json(Profile {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        birthdate: row.try_get("birthdate")?,
        gender: row.try_get("gender")?,
        profile_tag: row.try_get("profile_tag")?,
    }))
}

#[utoipa::path(
    put,
    path = "/api/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated.", body = MessageResponse),
        (status = 400, description = "Invalid birthdate or gender.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
        (status = 404, description = "User not found.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "profile"
)]
pub async fn update_profile(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let update = json_body(payload)?.validate()?;

    let query = r"
        UPDATE users
        SET first_name = $1, last_name = $2, birthdate = $3, gender = $4
        WHERE id = $5
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(update.birthdate)
        .bind(update.gender.as_deref())
        .bind(principal.user_id.get())
        .execute(&pool.0)
        .instrument(span)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("user not found"));
    }

    Ok(Json(MessageResponse::new("profile updated successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(birthdate: &str, gender: &str) -> UpdateProfileRequest {
        UpdateProfileRequest {
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            birthdate: birthdate.to_string(),
            gender: gender.to_string(),
        }
    }

    #[test]
    fn empty_optional_fields_clear_columns() {
        let update = request("", "").validate();
        assert!(matches!(
            update,
            Ok(ProfileUpdate {
                birthdate: None,
                gender: None,
                ..
            })
        ));
    }

    #[test]
    fn parses_birthdate_and_gender() {
        let update = request("1990-04-01", "F").validate();
        let expected = NaiveDate::from_ymd_opt(1990, 4, 1);
        assert!(matches!(
            update,
            Ok(ProfileUpdate { birthdate, gender: Some(ref g), .. }) if birthdate == expected && g == "F"
        ));
    }

    #[test]
    fn rejects_bad_birthdate() {
        for birthdate in ["01/04/1990", "1990-13-01", "yesterday"] {
            assert!(matches!(
                request(birthdate, "").validate(),
                Err(ApiError::BadRequest("invalid birthdate format, use YYYY-MM-DD"))
            ));
        }
    }

    #[test]
    fn rejects_unknown_gender() {
        assert!(matches!(
            request("", "X").validate(),
            Err(ApiError::BadRequest("invalid gender value"))
        ));
    }
}
