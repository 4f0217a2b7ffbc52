use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::PurchaseStatus;
use crate::error::ApiError;
use crate::middleware::auth::AuthPrincipal;
use crate::middleware::response::{ApiResponse, ApiResult, Paginated};
use crate::services::purchase_service::{PurchaseService, RequestedItem};

use super::PageQuery;

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseRequest {
    pub items: Vec<RequestedItem>,
    #[serde(default)]
    pub shipping_fee: i64,
    pub request_message: Option<String>,
}

/// POST /api/purchases - Cart-backed purchase request, lands in PENDING.
pub async fn create(
    Extension(principal): Extension<AuthPrincipal>,
    Json(body): Json<CreatePurchaseRequest>,
) -> ApiResult<Value> {
    let service = PurchaseService::new().await?;
    let detail = service
        .create_from_cart(
            principal.id,
            body.items,
            body.shipping_fee,
            body.request_message,
        )
        .await?;
    Ok(ApiResponse::created(json!(detail)))
}

/// POST /api/purchases/instant - Admin-only immediate purchase, lands in
/// APPROVED with the budget debited in the same transaction.
pub async fn create_instant(
    Extension(principal): Extension<AuthPrincipal>,
    Json(body): Json<CreatePurchaseRequest>,
) -> ApiResult<Value> {
    let service = PurchaseService::new().await?;
    let detail = service
        .create_immediate(
            principal.id,
            body.items,
            body.shipping_fee,
            body.request_message,
        )
        .await?;
    Ok(ApiResponse::created(json!(detail)))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<PurchaseStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/purchases - Own requests for USER, company-wide for MANAGER+.
pub async fn list(
    Extension(principal): Extension<AuthPrincipal>,
    Query(query): Query<ListQuery>,
) -> Result<Paginated<crate::database::models::PurchaseRequest>, ApiError> {
    let (page, limit) = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .resolve();
    let service = PurchaseService::new().await?;
    let (items, total) = service
        .list(principal.id, principal.role, query.status, page, limit)
        .await?;
    Ok(Paginated {
        items,
        page,
        limit,
        total,
    })
}

/// GET /api/purchases/:id
pub async fn get(Path(id): Path<Uuid>) -> ApiResult<Value> {
    let service = PurchaseService::new().await?;
    let detail = service.get(id).await?;
    Ok(ApiResponse::success(json!(detail)))
}

/// POST /api/purchases/:id/approve - MANAGER+. Exactly one concurrent
/// decision wins; the rest observe a conflict.
pub async fn approve(
    Extension(principal): Extension<AuthPrincipal>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let service = PurchaseService::new().await?;
    service.approve(principal.id, id).await?;
    Ok(ApiResponse::with_message(json!({}), "Purchase request approved"))
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

/// POST /api/purchases/:id/reject - MANAGER+, reason required.
pub async fn reject(
    Extension(principal): Extension<AuthPrincipal>,
    Path(id): Path<Uuid>,
    Json(body): Json<RejectRequest>,
) -> ApiResult<Value> {
    let service = PurchaseService::new().await?;
    service.reject(principal.id, id, &body.reason).await?;
    Ok(ApiResponse::with_message(json!({}), "Purchase request rejected"))
}

/// POST /api/purchases/:id/cancel - Requester only, from PENDING only.
pub async fn cancel(
    Extension(principal): Extension<AuthPrincipal>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let service = PurchaseService::new().await?;
    service.cancel(principal.id, id).await?;
    Ok(ApiResponse::with_message(json!({}), "Purchase request cancelled"))
}
