use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::{Role, User};
use crate::error::ApiError;
use crate::middleware::auth::AuthPrincipal;
use crate::middleware::response::{ApiResponse, ApiResult, Paginated};
use crate::services::user_service::UserService;

use super::PageQuery;

/// GET /api/users - ADMIN
pub async fn list(Query(query): Query<PageQuery>) -> Result<Paginated<User>, ApiError> {
    let (page, limit) = query.resolve();
    let service = UserService::new().await?;
    let (items, total) = service.list(page, limit).await?;
    Ok(Paginated {
        items,
        page,
        limit,
        total,
    })
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub temp_password: String,
}

/// POST /api/users - ADMIN invite.
pub async fn invite(Json(body): Json<InviteRequest>) -> ApiResult<Value> {
    if !body.email.contains('@') {
        return Err(ApiError::invalid_input("Invalid email address"));
    }
    if body.name.trim().is_empty() {
        return Err(ApiError::invalid_input("Name must not be empty"));
    }

    let service = UserService::new().await?;
    let user = service
        .invite(&body.email, body.name.trim(), body.role, &body.temp_password)
        .await?;
    Ok(ApiResponse::created(json!(user)))
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

/// PATCH /api/users/:id/role - ADMIN
pub async fn change_role(
    Extension(principal): Extension<AuthPrincipal>,
    Path(id): Path<Uuid>,
    Json(body): Json<ChangeRoleRequest>,
) -> ApiResult<Value> {
    let service = UserService::new().await?;
    let user = service.change_role(principal.id, id, body.role).await?;
    Ok(ApiResponse::success(json!(user)))
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// PATCH /api/users/:id/active - ADMIN
pub async fn set_active(
    Extension(principal): Extension<AuthPrincipal>,
    Path(id): Path<Uuid>,
    Json(body): Json<SetActiveRequest>,
) -> ApiResult<Value> {
    let service = UserService::new().await?;
    let user = service.set_active(principal.id, id, body.is_active).await?;
    Ok(ApiResponse::success(json!(user)))
}
