use axum::extract::Query;
use axum::{Extension, Json};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::auth::AuthPrincipal;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::budget_service::BudgetService;

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub year: Option<i32>,
    pub month: Option<i32>,
}

fn resolve_period(query: &PeriodQuery) -> Result<(i32, i32), ApiError> {
    let now = Utc::now();
    let year = query.year.unwrap_or(now.year());
    let month = query.month.unwrap_or(now.month() as i32);
    if !(1..=12).contains(&month) || !(2000..=2100).contains(&year) {
        return Err(ApiError::invalid_input("Invalid budget period"));
    }
    Ok((year, month))
}

/// GET /api/budgets - The month's remaining allowance. MANAGER+.
pub async fn get(
    Extension(principal): Extension<AuthPrincipal>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<Value> {
    let (year, month) = resolve_period(&query)?;
    let company_id = principal
        .company_id
        .ok_or_else(|| ApiError::forbidden("Principal has no company affiliation"))?;

    let service = BudgetService::new().await.map_err(ApiError::from)?;
    let configured = service
        .is_configured(company_id, year, month)
        .await
        .map_err(ApiError::from)?;
    let available = service
        .available(company_id, year, month)
        .await
        .map_err(ApiError::from)?;

    Ok(ApiResponse::success(json!({
        "year": year,
        "month": month,
        "configured": configured,
        "available": available,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpsertBudgetRequest {
    pub year: i32,
    pub month: i32,
    pub amount: i64,
}

/// PUT /api/budgets - ADMIN upsert of a month's allowance.
pub async fn upsert(
    Extension(principal): Extension<AuthPrincipal>,
    Json(body): Json<UpsertBudgetRequest>,
) -> ApiResult<Value> {
    let (year, month) = resolve_period(&PeriodQuery {
        year: Some(body.year),
        month: Some(body.month),
    })?;
    if body.amount < 0 {
        return Err(ApiError::invalid_input("Budget amount must be non-negative"));
    }
    let company_id = principal
        .company_id
        .ok_or_else(|| ApiError::forbidden("Principal has no company affiliation"))?;

    let service = BudgetService::new().await.map_err(ApiError::from)?;
    let budget = service
        .upsert_amount(company_id, year, month, body.amount)
        .await
        .map_err(ApiError::from)?;

    Ok(ApiResponse::success(json!(budget)))
}

/// GET /api/budgets/criteria - ADMIN. The monthly seeding template.
pub async fn get_criteria() -> ApiResult<Value> {
    let service = BudgetService::new().await.map_err(ApiError::from)?;
    let criteria = service.criteria().await.map_err(ApiError::from)?;
    Ok(ApiResponse::success(json!(criteria)))
}

#[derive(Debug, Deserialize)]
pub struct SetCriteriaRequest {
    pub amount: i64,
}

/// PUT /api/budgets/criteria - ADMIN.
pub async fn set_criteria(Json(body): Json<SetCriteriaRequest>) -> ApiResult<Value> {
    if body.amount < 0 {
        return Err(ApiError::invalid_input("Criteria amount must be non-negative"));
    }
    let service = BudgetService::new().await.map_err(ApiError::from)?;
    let criteria = service.set_criteria(body.amount).await.map_err(ApiError::from)?;
    Ok(ApiResponse::success(json!(criteria)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_bounds_enforced() {
        assert!(resolve_period(&PeriodQuery {
            year: Some(2025),
            month: Some(13)
        })
        .is_err());
        assert!(resolve_period(&PeriodQuery {
            year: Some(1999),
            month: Some(6)
        })
        .is_err());
        assert_eq!(
            resolve_period(&PeriodQuery {
                year: Some(2025),
                month: Some(6)
            })
            .unwrap(),
            (2025, 6)
        );
    }
}
