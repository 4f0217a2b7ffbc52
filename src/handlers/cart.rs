use axum::extract::Path;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::Row;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::Product;
use crate::database::ScopedRepository;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::auth::AuthPrincipal;
use crate::middleware::response::{ApiResponse, ApiResult};

/// GET /api/cart - Cart rows joined with their product info.
pub async fn list(Extension(principal): Extension<AuthPrincipal>) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;

    let rows = sqlx::query(
        r#"
        SELECT c.id, c.product_id, c.quantity,
               p.name, p.price, p.image_url, p.is_active
        FROM cart_items c
        JOIN products p ON p.id = c.product_id
        WHERE c.user_id = $1
        ORDER BY c.id
        "#,
    )
    .bind(principal.id)
    .fetch_all(&pool)
    .await
    .map_err(ApiError::from)?;

    let items: Vec<Value> = rows
        .iter()
        .map(|row| {
            json!({
                "id": row.get::<Uuid, _>("id"),
                "product_id": row.get::<Uuid, _>("product_id"),
                "quantity": row.get::<i32, _>("quantity"),
                "product": {
                    "name": row.get::<String, _>("name"),
                    "price": row.get::<i64, _>("price"),
                    "image_url": row.get::<Option<String>, _>("image_url"),
                    "is_active": row.get::<bool, _>("is_active"),
                },
            })
        })
        .collect();

    Ok(ApiResponse::success(json!(items)))
}

#[derive(Debug, Deserialize)]
pub struct AddCartRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// POST /api/cart - Add to cart; adding an existing product accumulates its
/// quantity (upsert on the (user, product) unique key).
pub async fn add(
    Extension(principal): Extension<AuthPrincipal>,
    Json(body): Json<AddCartRequest>,
) -> ApiResult<Value> {
    if body.quantity < 1 {
        return Err(ApiError::invalid_input("Quantity must be at least 1"));
    }

    let pool = DatabaseManager::pool().await?;

    // Product must be an active row of the caller's company
    let products = ScopedRepository::<Product>::new("products", pool.clone());
    let product = products
        .select_404(FilterData::where_only(json!({ "id": body.product_id })))
        .await?;
    if !product.is_active {
        return Err(ApiError::invalid_input("Product is no longer available"));
    }

    sqlx::query(
        r#"
        INSERT INTO cart_items (user_id, product_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        "#,
    )
    .bind(principal.id)
    .bind(body.product_id)
    .bind(body.quantity)
    .execute(&pool)
    .await
    .map_err(ApiError::from)?;

    Ok(ApiResponse::created(json!({})))
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i32,
}

/// PATCH /api/cart/:product_id - Set a row's quantity.
pub async fn set_quantity(
    Extension(principal): Extension<AuthPrincipal>,
    Path(product_id): Path<Uuid>,
    Json(body): Json<SetQuantityRequest>,
) -> ApiResult<Value> {
    if body.quantity < 1 {
        return Err(ApiError::invalid_input("Quantity must be at least 1"));
    }

    let pool = DatabaseManager::pool().await?;
    let updated =
        sqlx::query("UPDATE cart_items SET quantity = $1 WHERE user_id = $2 AND product_id = $3")
            .bind(body.quantity)
            .bind(principal.id)
            .bind(product_id)
            .execute(&pool)
            .await
            .map_err(ApiError::from)?
            .rows_affected();

    if updated == 0 {
        return Err(ApiError::not_found("Cart item not found"));
    }
    Ok(ApiResponse::success(json!({})))
}

/// DELETE /api/cart/:product_id
pub async fn remove(
    Extension(principal): Extension<AuthPrincipal>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let deleted = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(principal.id)
        .bind(product_id)
        .execute(&pool)
        .await
        .map_err(ApiError::from)?
        .rows_affected();

    if deleted == 0 {
        return Err(ApiError::not_found("Cart item not found"));
    }
    Ok(ApiResponse::success(json!({})))
}

/// GET /api/wishlist
pub async fn list_wishlist(Extension(principal): Extension<AuthPrincipal>) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let rows = sqlx::query(
        r#"
        SELECT w.id, w.product_id, p.name, p.price, p.image_url, p.is_active
        FROM wishlist_items w
        JOIN products p ON p.id = w.product_id
        WHERE w.user_id = $1
        ORDER BY w.id
        "#,
    )
    .bind(principal.id)
    .fetch_all(&pool)
    .await
    .map_err(ApiError::from)?;

    let items: Vec<Value> = rows
        .iter()
        .map(|row| {
            json!({
                "id": row.get::<Uuid, _>("id"),
                "product_id": row.get::<Uuid, _>("product_id"),
                "product": {
                    "name": row.get::<String, _>("name"),
                    "price": row.get::<i64, _>("price"),
                    "image_url": row.get::<Option<String>, _>("image_url"),
                    "is_active": row.get::<bool, _>("is_active"),
                },
            })
        })
        .collect();

    Ok(ApiResponse::success(json!(items)))
}

#[derive(Debug, Deserialize)]
pub struct AddWishlistRequest {
    pub product_id: Uuid,
}

/// POST /api/wishlist - Idempotent add.
pub async fn add_wishlist(
    Extension(principal): Extension<AuthPrincipal>,
    Json(body): Json<AddWishlistRequest>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;

    let products = ScopedRepository::<Product>::new("products", pool.clone());
    products
        .select_404(FilterData::where_only(json!({ "id": body.product_id })))
        .await?;

    sqlx::query(
        r#"
        INSERT INTO wishlist_items (user_id, product_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, product_id) DO NOTHING
        "#,
    )
    .bind(principal.id)
    .bind(body.product_id)
    .execute(&pool)
    .await
    .map_err(ApiError::from)?;

    Ok(ApiResponse::created(json!({})))
}

/// DELETE /api/wishlist/:product_id
pub async fn remove_wishlist(
    Extension(principal): Extension<AuthPrincipal>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let deleted = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
        .bind(principal.id)
        .bind(product_id)
        .execute(&pool)
        .await
        .map_err(ApiError::from)?
        .rows_affected();

    if deleted == 0 {
        return Err(ApiError::not_found("Wishlist item not found"));
    }
    Ok(ApiResponse::success(json!({})))
}
