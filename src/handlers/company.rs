use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::middleware::auth::AuthPrincipal;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::company_service::CompanyService;

/// GET /api/company
pub async fn get() -> ApiResult<Value> {
    let service = CompanyService::new().await?;
    let company = service.get().await?;
    Ok(ApiResponse::success(json!(company)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub company_name: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// PATCH /api/company - ADMIN. Company rename and password change apply as
/// one atomic unit.
pub async fn update_profile(
    Extension(principal): Extension<AuthPrincipal>,
    Json(body): Json<UpdateProfileRequest>,
) -> ApiResult<Value> {
    let service = CompanyService::new().await?;
    let company = service
        .update_profile(
            principal.id,
            body.company_name.as_deref(),
            body.current_password.as_deref(),
            body.new_password.as_deref(),
        )
        .await?;
    Ok(ApiResponse::success(json!(company)))
}
