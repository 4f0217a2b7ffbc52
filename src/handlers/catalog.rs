use axum::extract::{Path, Query};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::{Category, Product};
use crate::database::ScopedRepository;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::response::{ApiResponse, ApiResult, Paginated};

use super::PageQuery;

async fn categories_repo() -> Result<ScopedRepository<Category>, ApiError> {
    Ok(ScopedRepository::new(
        "categories",
        DatabaseManager::pool().await?,
    ))
}

async fn products_repo() -> Result<ScopedRepository<Product>, ApiError> {
    Ok(ScopedRepository::new(
        "products",
        DatabaseManager::pool().await?,
    ))
}

/// GET /api/categories
pub async fn list_categories() -> ApiResult<Value> {
    let repo = categories_repo().await?;
    let categories = repo
        .select_any(FilterData {
            order: Some(json!({ "name": "asc" })),
            ..Default::default()
        })
        .await?;
    Ok(ApiResponse::success(json!(categories)))
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

/// POST /api/categories - ADMIN
pub async fn create_category(Json(body): Json<CreateCategoryRequest>) -> ApiResult<Value> {
    if body.name.trim().is_empty() {
        return Err(ApiError::invalid_input("Category name must not be empty"));
    }
    let repo = categories_repo().await?;
    let category = repo.insert(json!({ "name": body.name.trim() })).await?;
    Ok(ApiResponse::created(json!(category)))
}

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/products
pub async fn list_products(
    Query(query): Query<ProductListQuery>,
) -> Result<Paginated<Product>, ApiError> {
    let (page, limit) = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .resolve();

    let mut where_clause = serde_json::Map::new();
    if !query.include_inactive {
        where_clause.insert("is_active".to_string(), json!(true));
    }
    if let Some(category_id) = query.category_id {
        where_clause.insert("category_id".to_string(), json!(category_id));
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        where_clause.insert(
            "name".to_string(),
            json!({ "$ilike": format!("%{}%", search.trim()) }),
        );
    }
    let where_clause = Value::Object(where_clause);

    let repo = products_repo().await?;
    let items = repo
        .select_any(FilterData {
            where_clause: Some(where_clause.clone()),
            order: Some(json!({ "created_at": "desc" })),
            limit: Some(limit),
            offset: Some((page - 1) * limit),
        })
        .await?;
    let total = repo.count(FilterData::where_only(where_clause)).await?;

    Ok(Paginated {
        items,
        page,
        limit,
        total,
    })
}

/// GET /api/products/:id
pub async fn get_product(Path(id): Path<Uuid>) -> ApiResult<Value> {
    let repo = products_repo().await?;
    let product = repo
        .select_404(FilterData::where_only(json!({ "id": id })))
        .await?;
    Ok(ApiResponse::success(json!(product)))
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub category_id: Uuid,
    pub name: String,
    pub price: i64,
    pub link: String,
    pub image_url: Option<String>,
}

/// POST /api/products - ADMIN
pub async fn create_product(Json(body): Json<CreateProductRequest>) -> ApiResult<Value> {
    if body.name.trim().is_empty() {
        return Err(ApiError::invalid_input("Product name must not be empty"));
    }
    if body.price < 0 {
        return Err(ApiError::invalid_input("Price must be non-negative"));
    }

    // Category must exist inside the caller's tenant
    let categories = categories_repo().await?;
    categories
        .select_404(FilterData::where_only(json!({ "id": body.category_id })))
        .await?;

    let repo = products_repo().await?;
    let product = repo
        .insert(json!({
            "category_id": body.category_id,
            "name": body.name.trim(),
            "price": body.price,
            "link": body.link,
            "image_url": body.image_url,
        }))
        .await?;
    Ok(ApiResponse::created(json!(product)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub link: Option<String>,
    pub image_url: Option<String>,
    pub category_id: Option<Uuid>,
}

/// PATCH /api/products/:id - ADMIN
pub async fn update_product(
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateProductRequest>,
) -> ApiResult<Value> {
    let mut payload = serde_json::Map::new();
    if let Some(name) = body.name {
        if name.trim().is_empty() {
            return Err(ApiError::invalid_input("Product name must not be empty"));
        }
        payload.insert("name".to_string(), json!(name.trim()));
    }
    if let Some(price) = body.price {
        if price < 0 {
            return Err(ApiError::invalid_input("Price must be non-negative"));
        }
        payload.insert("price".to_string(), json!(price));
    }
    if let Some(link) = body.link {
        payload.insert("link".to_string(), json!(link));
    }
    if let Some(image_url) = body.image_url {
        payload.insert("image_url".to_string(), json!(image_url));
    }
    if let Some(category_id) = body.category_id {
        let categories = categories_repo().await?;
        categories
            .select_404(FilterData::where_only(json!({ "id": category_id })))
            .await?;
        payload.insert("category_id".to_string(), json!(category_id));
    }
    if payload.is_empty() {
        return Err(ApiError::invalid_input("Nothing to update"));
    }

    let repo = products_repo().await?;
    let updated = repo
        .update_where(
            FilterData::where_only(json!({ "id": id })),
            Value::Object(payload),
        )
        .await?;
    if updated == 0 {
        return Err(ApiError::not_found("Product not found"));
    }

    let product = repo
        .select_404(FilterData::where_only(json!({ "id": id })))
        .await?;
    Ok(ApiResponse::success(json!(product)))
}

/// DELETE /api/products/:id - ADMIN. Always a soft delete: historical
/// purchase items keep referencing the row.
pub async fn delete_product(Path(id): Path<Uuid>) -> ApiResult<Value> {
    let repo = products_repo().await?;
    let updated = repo
        .update_where(
            FilterData::where_only(json!({ "id": id })),
            json!({ "is_active": false }),
        )
        .await?;
    if updated == 0 {
        return Err(ApiError::not_found("Product not found"));
    }
    Ok(ApiResponse::with_message(json!({}), "Product deactivated"))
}
