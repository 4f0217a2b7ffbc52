use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationTarget {
    PurchaseRequest,
    Budget,
    System,
}

/// Append-only fan-out record per recipient per event; independent of whether
/// the recipient is currently connected for live delivery.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub target_type: NotificationTarget,
    pub target_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
