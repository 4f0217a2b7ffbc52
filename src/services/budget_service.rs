use chrono::{Datelike, Utc};
use serde_json::json;
use sqlx::{PgExecutor, PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{Budget, BudgetCriteria};
use crate::database::ScopedRepository;
use crate::error::ApiError;
use crate::external::mailer;
use crate::filter::FilterData;

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("Monthly budget exceeded")]
    Insufficient,
}

impl From<BudgetError> for ApiError {
    fn from(err: BudgetError) -> Self {
        match err {
            BudgetError::Insufficient => {
                ApiError::insufficient_budget("Order total exceeds the available monthly budget")
            }
            BudgetError::Database(e) => e.into(),
            BudgetError::Sqlx(e) => e.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    Applied,
    Insufficient,
}

/// Per-company, per-month spending allowance.
///
/// All mutation of a budget row's amount goes through [`BudgetService::try_debit`],
/// the one atomic primitive, so concurrent approvals cannot jointly overdraw.
pub struct BudgetService {
    pool: PgPool,
}

impl BudgetService {
    pub async fn new() -> Result<Self, BudgetError> {
        Ok(Self {
            pool: DatabaseManager::pool().await?,
        })
    }

    /// Remaining allowance for the period; 0 when no budget row exists.
    pub async fn available(
        &self,
        company_id: Uuid,
        year: i32,
        month: i32,
    ) -> Result<i64, BudgetError> {
        let amount: Option<i64> = sqlx::query_scalar(
            "SELECT amount FROM budgets WHERE company_id = $1 AND year = $2 AND month = $3",
        )
        .bind(company_id)
        .bind(year)
        .bind(month)
        .fetch_optional(&self.pool)
        .await?;

        Ok(amount.unwrap_or(0))
    }

    /// Whether any budget row exists for the period at all. Distinguishes
    /// "never configured" from "fully spent" for the advisory pre-check.
    pub async fn is_configured(
        &self,
        company_id: Uuid,
        year: i32,
        month: i32,
    ) -> Result<bool, BudgetError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM budgets WHERE company_id = $1 AND year = $2 AND month = $3",
        )
        .bind(company_id)
        .bind(year)
        .bind(month)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Admin upsert of a month's allowance.
    pub async fn upsert_amount(
        &self,
        company_id: Uuid,
        year: i32,
        month: i32,
        amount: i64,
    ) -> Result<Budget, BudgetError> {
        let budget = sqlx::query_as::<_, Budget>(
            r#"
            INSERT INTO budgets (company_id, year, month, amount)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (company_id, year, month) DO UPDATE SET amount = EXCLUDED.amount
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(year)
        .bind(month)
        .bind(amount)
        .fetch_one(&self.pool)
        .await?;

        Ok(budget)
    }

    /// Seed the month's budgets from every company's criteria template.
    ///
    /// Idempotent: existing rows are skipped, never overwritten, so a manual
    /// admin adjustment survives a rerun of the scheduler. This is the one
    /// caller that legitimately runs with no tenant context, operating across
    /// all companies in a single statement.
    pub async fn seed_monthly(&self, year: i32, month: i32) -> Result<u64, BudgetError> {
        let result = sqlx::query(
            r#"
            INSERT INTO budgets (company_id, year, month, amount)
            SELECT company_id, $1, $2, amount FROM budget_criteria
            ON CONFLICT (company_id, year, month) DO NOTHING
            "#,
        )
        .bind(year)
        .bind(month)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Atomic check-and-decrement. The `amount >= $n` guard and the decrement
    /// are one statement; two concurrent debits can never jointly overdraw
    /// and the stored amount can never go negative.
    ///
    /// Executor-generic so the approval workflow can run it inside its own
    /// transaction.
    pub async fn try_debit<'e, E: PgExecutor<'e>>(
        executor: E,
        company_id: Uuid,
        year: i32,
        month: i32,
        amount: i64,
    ) -> Result<DebitOutcome, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE budgets SET amount = amount - $4
            WHERE company_id = $1 AND year = $2 AND month = $3 AND amount >= $4
            "#,
        )
        .bind(company_id)
        .bind(year)
        .bind(month)
        .bind(amount)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(DebitOutcome::Insufficient);
        }
        Ok(DebitOutcome::Applied)
    }

    /// Advisory pre-purchase check for the current month. Not the
    /// authoritative gate (that is the debit at approval time): budget and
    /// pending totals can change between request creation and approval.
    ///
    /// On rejection an alert mail goes to the company's managers and admins;
    /// mail failure never fails the rejection itself.
    pub async fn precheck_order(
        &self,
        company_id: Uuid,
        order_total: i64,
    ) -> Result<(), BudgetError> {
        let now = Utc::now();
        let (year, month) = (now.year(), now.month() as i32);

        let configured = self.is_configured(company_id, year, month).await?;
        let available = self.available(company_id, year, month).await?;

        if !configured || available < order_total {
            self.send_budget_alert(company_id, order_total, available)
                .await;
            return Err(BudgetError::Insufficient);
        }
        Ok(())
    }

    async fn send_budget_alert(&self, company_id: Uuid, order_total: i64, available: i64) {
        let recipients: Vec<String> = match sqlx::query(
            r#"
            SELECT email FROM users
            WHERE company_id = $1 AND role IN ('MANAGER', 'ADMIN') AND is_active = true
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        {
            Ok(rows) => rows.iter().map(|r| r.get("email")).collect(),
            Err(e) => {
                tracing::warn!("budget alert recipient lookup failed: {}", e);
                return;
            }
        };

        let subject = "Purchase blocked: monthly budget exceeded";
        let html = format!(
            "<p>An order of {} was blocked; the remaining monthly budget is {}.</p>",
            order_total, available
        );

        for to in recipients {
            if let Err(e) = mailer().send(&to, subject, &html).await {
                tracing::warn!("budget alert mail to {} failed: {}", to, e);
            }
        }
    }

    /// Per-company seeding template, tenant-scoped.
    pub async fn criteria(&self) -> Result<Option<BudgetCriteria>, BudgetError> {
        let repo = ScopedRepository::<BudgetCriteria>::new("budget_criteria", self.pool.clone());
        Ok(repo.select_one(FilterData::default()).await?)
    }

    pub async fn set_criteria(&self, amount: i64) -> Result<BudgetCriteria, BudgetError> {
        let repo = ScopedRepository::<BudgetCriteria>::new("budget_criteria", self.pool.clone());
        Ok(repo
            .upsert(FilterData::default(), json!({ "amount": amount }))
            .await?)
    }
}
