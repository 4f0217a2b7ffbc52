use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Spending ceiling for one company in one calendar month.
/// `amount` is decremented by approval debits and never goes negative.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Budget {
    pub id: Uuid,
    pub company_id: Uuid,
    pub year: i32,
    pub month: i32,
    pub amount: i64,
}

/// Per-company template used by the monthly seeding job.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BudgetCriteria {
    pub id: Uuid,
    pub company_id: Uuid,
    pub amount: i64,
}
