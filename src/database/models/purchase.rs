use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// PENDING is the only non-terminal state; APPROVED, REJECTED and CANCELLED
/// are terminal and admit no further transitions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum PurchaseStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl PurchaseStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PurchaseStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "PENDING",
            PurchaseStatus::Approved => "APPROVED",
            PurchaseStatus::Rejected => "REJECTED",
            PurchaseStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseRequest {
    pub id: Uuid,
    pub company_id: Uuid,
    pub requester_id: Uuid,
    pub approver_id: Option<Uuid>,
    pub status: PurchaseStatus,
    pub total_price: i64,
    pub shipping_fee: i64,
    pub request_message: Option<String>,
    pub reject_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `price_snapshot` is the unit price at creation time and is never recomputed,
/// so later product price changes do not affect historical totals.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseItem {
    pub id: Uuid,
    pub purchase_request_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price_snapshot: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!PurchaseStatus::Pending.is_terminal());
        assert!(PurchaseStatus::Approved.is_terminal());
        assert!(PurchaseStatus::Rejected.is_terminal());
        assert!(PurchaseStatus::Cancelled.is_terminal());
    }
}
