use serde_json::{json, Value};

use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::dashboard_service::DashboardService;

/// GET /api/dashboard - MANAGER+. Spend aggregates over APPROVED requests
/// only, plus the month's remaining budget.
pub async fn stats() -> ApiResult<Value> {
    let service = DashboardService::new().await?;
    let stats = service.stats().await?;
    Ok(ApiResponse::success(json!(stats)))
}
