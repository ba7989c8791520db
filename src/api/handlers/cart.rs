use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};
use utoipa::ToSchema;

use super::{auth::Principal, json_body, ApiError, ErrorResponse, IdResponse};

#[derive(ToSchema, Serialize, Debug)]
pub struct CartItem {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub name: String,
    pub image: String,
    pub price: i64,
}

/// `id` is the catalog product id being added.
#[derive(ToSchema, Deserialize, Debug)]
pub struct AddToCartRequest {
    #[serde(rename = "id")]
    pub product_id: i64,
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub price: i64,
}

impl AddToCartRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.product_id <= 0 {
            return Err(ApiError::BadRequest("invalid product id"));
        }
        if self.name.trim().is_empty() {
            return Err(ApiError::BadRequest("product name cannot be empty"));
        }
        if self.price < 0 {
            return Err(ApiError::BadRequest("invalid price"));
        }
        Ok(())
    }
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ClearCartResponse {
    pub message: String,
    pub deleted: u64,
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Caller's cart.", body = [CartItem]),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "cart"
)]
pub async fn get_cart(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<Json<Vec<CartItem>>, ApiError> {
    let query =
        "SELECT id, user_id, product_id, name, image, price FROM cart_items WHERE user_id = $1 ORDER BY id";
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

    let items = rows
        .iter()
        .map(|row| {
            Ok(CartItem {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                product_id: row.try_get("product_id")?,
                name: row.try_get("name")?,
                image: row.try_get("image")?,
                price: row.try_get("price")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(Json(items))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 201, description = "Item added.", body = IdResponse),
        (status = 400, description = "Invalid item.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "cart"
)]
pub async fn add_to_cart(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    payload: Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let item = json_body(payload)?;
    item.validate()?;

    let query = r"
        INSERT INTO cart_items (user_id, product_id, name, image, price)
        VALUES ($1, $2, $3, $4, $5)
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
        .bind(item.product_id)
        .bind(&item.name)
        .bind(&item.image)
        .bind(item.price)
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
    delete,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart emptied.", body = ClearCartResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "cart"
)]
pub async fn clear_cart(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Result<Json<ClearCartResponse>, ApiError> {
    let query = "DELETE FROM cart_items WHERE user_id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(principal.user_id.get())
        .execute(&pool.0)
        .instrument(span)
        .await?;

    Ok(Json(ClearCartResponse {
        message: "cart cleared".to_string(),
        deleted: result.rows_affected(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: i64, name: &str, price: i64) -> AddToCartRequest {
        AddToCartRequest {
            product_id,
            name: name.to_string(),
            image: String::new(),
            price,
        }
    }

    #[test]
    fn validates_cart_items() {
        assert!(item(3, "Mug", 0).validate().is_ok());
        assert!(matches!(
            item(0, "Mug", 10).validate(),
            Err(ApiError::BadRequest("invalid product id"))
        ));
        assert!(matches!(
            item(3, " ", 10).validate(),
            Err(ApiError::BadRequest("product name cannot be empty"))
        ));
        assert!(matches!(
            item(3, "Mug", -1).validate(),
            Err(ApiError::BadRequest("invalid price"))
        ));
    }

    #[test]
    fn product_id_reads_from_id_field() -> anyhow::Result<()> {
        let request: AddToCartRequest =
            serde_json::from_str(r#"{"id": 7, "name": "Mug", "price": 1200}"#)?;
        assert_eq!(request.product_id, 7);
        assert!(request.image.is_empty());
        Ok(())
    }
}
