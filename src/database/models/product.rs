use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
}

/// Soft-deleted via `is_active=false`; historical purchase items keep referencing it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub company_id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub price: i64,
    pub image_url: Option<String>,
    pub link: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
