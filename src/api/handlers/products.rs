//! Product catalog: a public listing of active products plus admin CRUD.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info, info_span, Instrument};
use utoipa::ToSchema;

use super::{
    auth::Principal, json_body, parse_id, ApiError, ErrorResponse, IdResponse, MessageResponse,
};

#[derive(ToSchema, Serialize, Debug)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub image_url: String,
    pub is_active: bool,
}

impl Product {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            image_url: row.try_get("image_url")?,
            is_active: row.try_get("is_active")?,
        })
    }
}

fn default_active() -> bool {
    true
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: i64,
    #[serde(default)]
    pub image_url: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl ProductRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::BadRequest("name cannot be empty"));
        }
        if self.price < 0 {
            return Err(ApiError::BadRequest("price must be >= 0"));
        }
        Ok(())
    }
}

async fn fetch_products(pool: &PgPool, active_only: bool) -> Result<Vec<Product>, ApiError> {
    let query = if active_only {
        "SELECT id, name, description, price, image_url, is_active FROM products WHERE is_active = TRUE ORDER BY id DESC"
    } else {
        "SELECT id, name, description, price, image_url, is_active FROM products ORDER BY id DESC"
    };
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(span)
        .await?;

    rows.iter()
        .map(Product::from_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(ApiError::from)
}

#[utoipa::path(
    get,
    path = "/api/products",
    responses(
        (status = 200, description = "Active products, newest first.", body = [Product]),
    ),
    tag = "products"
)]
pub async fn list_products(pool: Extension<PgPool>) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(fetch_products(&pool.0, true).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/products",
    responses(
        (status = 200, description = "All products, including inactive ones.", body = [Product]),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
        (status = 403, description = "Admin role required.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn admin_list_products(pool: Extension<PgPool>) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(fetch_products(&pool.0, false).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/products",
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Product created.", body = IdResponse),
        (status = 400, description = "Invalid product.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
        (status = 403, description = "Admin role required.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn create_product(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    payload: Result<Json<ProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let request = json_body(payload)?;
    request.validate()?;

    let query = r"
        INSERT INTO products (name, description, price, image_url, is_active)
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
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.price)
        .bind(&request.image_url)
        .bind(request.is_active)
        .fetch_one(&pool.0)
        .instrument(span)
        .await?;

    let id: i64 = row.try_get("id")?;
    info!(admin_id = %principal.user_id, product_id = id, "product created");

    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

#[utoipa::path(
    put,
    path = "/api/admin/products/{id}",
    params(("id" = i64, Path, description = "Product id")),
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product updated.", body = MessageResponse),
        (status = 400, description = "Invalid id or product.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
        (status = 403, description = "Admin role required.", body = ErrorResponse),
        (status = 404, description = "Product not found.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn update_product(
    Path(id): Path<String>,
    pool: Extension<PgPool>,
    payload: Result<Json<ProductRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let product_id = parse_id(&id, "invalid product id")?;
    let request = json_body(payload)?;
    request.validate()?;

    let query = r"
        UPDATE products
        SET name = $1, description = $2, price = $3, image_url = $4, is_active = $5
        WHERE id = $6
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.price)
        .bind(&request.image_url)
        .bind(request.is_active)
        .bind(product_id)
        .execute(&pool.0)
        .instrument(span)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("product not found"));
    }

    Ok(Json(MessageResponse::new("product updated")))
}

#[utoipa::path(
    delete,
    path = "/api/admin/products/{id}",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deleted.", body = IdResponse),
        (status = 400, description = "Invalid id.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token.", body = ErrorResponse),
        (status = 403, description = "Admin role required.", body = ErrorResponse),
        (status = 404, description = "Product not found.", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn delete_product(
    Path(id): Path<String>,
    pool: Extension<PgPool>,
) -> Result<Json<IdResponse>, ApiError> {
    let product_id = parse_id(&id, "invalid product id")?;

    let query = "DELETE FROM products WHERE id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(product_id)
        .execute(&pool.0)
        .instrument(span)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("product not found"));
    }

    Ok(Json(IdResponse { id: product_id }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_products_default_to_active() -> anyhow::Result<()> {
        let request: ProductRequest = serde_json::from_str(r#"{"name": "Mug", "price": 1200}"#)?;
        assert!(request.is_active);
        assert!(request.description.is_empty());
        assert!(request.validate().is_ok());
        Ok(())
    }

    #[test]
    fn rejects_bad_products() -> anyhow::Result<()> {
        let unnamed: ProductRequest = serde_json::from_str(r#"{"name": "", "price": 1}"#)?;
        assert!(matches!(
            unnamed.validate(),
            Err(ApiError::BadRequest("name cannot be empty"))
        ));

        let negative: ProductRequest = serde_json::from_str(r#"{"name": "Mug", "price": -5}"#)?;
        assert!(matches!(
            negative.validate(),
            Err(ApiError::BadRequest("price must be >= 0"))
        ));
        Ok(())
    }
}
