use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::error::ApiError;
use crate::services::budget_service::BudgetService;
use crate::tenant::TenantContext;

#[derive(Debug, Serialize)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub total_quantity: i64,
    pub total_spend: i64,
}

#[derive(Debug, Serialize)]
pub struct MonthlySpend {
    pub year: i32,
    pub month: i32,
    pub spend: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub this_month_spend: i64,
    pub last_month_spend: i64,
    pub this_year_spend: i64,
    pub last_year_spend: i64,
    pub remaining_budget: i64,
    pub top_products: Vec<TopProduct>,
    pub monthly_trend: Vec<MonthlySpend>,
}

/// Read-only aggregation over purchase history. Only APPROVED requests count
/// as real spend; pending, rejected and cancelled rows never enter a sum.
pub struct DashboardService {
    pool: PgPool,
}

impl DashboardService {
    pub async fn new() -> Result<Self, ApiError> {
        Ok(Self {
            pool: DatabaseManager::pool().await?,
        })
    }

    pub async fn stats(&self) -> Result<DashboardStats, ApiError> {
        let ctx = TenantContext::current()
            .ok_or_else(|| ApiError::internal("Request context unavailable"))?;
        let company_id = ctx.company_id;

        let now = Utc::now();
        let (year, month) = (now.year(), now.month() as i32);
        let (last_month_year, last_month) = if month == 1 {
            (year - 1, 12)
        } else {
            (year, month - 1)
        };

        let this_month_spend = self
            .spend_between(
                company_id,
                month_start(year, month),
                month_start_after(year, month),
            )
            .await?;
        let last_month_spend = self
            .spend_between(
                company_id,
                month_start(last_month_year, last_month),
                month_start(year, month),
            )
            .await?;
        let this_year_spend = self
            .spend_between(company_id, month_start(year, 1), month_start(year + 1, 1))
            .await?;
        let last_year_spend = self
            .spend_between(company_id, month_start(year - 1, 1), month_start(year, 1))
            .await?;

        let budgets = BudgetService::new()
            .await
            .map_err(ApiError::from)?;
        let remaining_budget = budgets
            .available(company_id, year, month)
            .await
            .map_err(ApiError::from)?;

        let top_products = self.top_products(company_id, 5).await?;
        let monthly_trend = self.monthly_trend(company_id, 12).await?;

        Ok(DashboardStats {
            this_month_spend,
            last_month_spend,
            this_year_spend,
            last_year_spend,
            remaining_budget,
            top_products,
            monthly_trend,
        })
    }

    async fn spend_between(
        &self,
        company_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, ApiError> {
        let spend: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total_price + shipping_fee), 0)::bigint
            FROM purchase_requests
            WHERE company_id = $1 AND status = 'APPROVED'
              AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(company_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(ApiError::from)?;
        Ok(spend)
    }

    async fn top_products(
        &self,
        company_id: Uuid,
        limit: i64,
    ) -> Result<Vec<TopProduct>, ApiError> {
        let rows = sqlx::query(
            r#"
            SELECT p.id AS product_id, p.name,
                   SUM(pi.quantity)::bigint AS total_quantity,
                   SUM(pi.quantity * pi.price_snapshot)::bigint AS total_spend
            FROM purchase_items pi
            JOIN purchase_requests pr ON pr.id = pi.purchase_request_id
            JOIN products p ON p.id = pi.product_id
            WHERE pr.company_id = $1 AND pr.status = 'APPROVED'
            GROUP BY p.id, p.name
            ORDER BY total_quantity DESC
            LIMIT $2
            "#,
        )
        .bind(company_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| TopProduct {
                product_id: row.get("product_id"),
                name: row.get("name"),
                total_quantity: row.get("total_quantity"),
                total_spend: row.get("total_spend"),
            })
            .collect())
    }

    async fn monthly_trend(
        &self,
        company_id: Uuid,
        months: i32,
    ) -> Result<Vec<MonthlySpend>, ApiError> {
        let rows = sqlx::query(
            r#"
            SELECT EXTRACT(YEAR FROM bucket)::int AS year,
                   EXTRACT(MONTH FROM bucket)::int AS month,
                   spend::bigint AS spend
            FROM (
                SELECT date_trunc('month', created_at) AS bucket,
                       SUM(total_price + shipping_fee) AS spend
                FROM purchase_requests
                WHERE company_id = $1 AND status = 'APPROVED'
                  AND created_at >= date_trunc('month', now()) - ($2 - 1) * interval '1 month'
                GROUP BY bucket
            ) t
            ORDER BY bucket
            "#,
        )
        .bind(company_id)
        .bind(months)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| MonthlySpend {
                year: row.get("year"),
                month: row.get("month"),
                spend: row.get("spend"),
            })
            .collect())
    }
}

fn month_start(year: i32, month: i32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month as u32, 1, 0, 0, 0).unwrap()
}

fn month_start_after(year: i32, month: i32) -> DateTime<Utc> {
    if month == 12 {
        month_start(year + 1, 1)
    } else {
        month_start(year, month + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_boundaries_roll_over_year() {
        assert_eq!(month_start_after(2025, 12), month_start(2026, 1));
        assert_eq!(month_start_after(2025, 6), month_start(2025, 7));
    }
}
