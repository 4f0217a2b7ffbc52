use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Pre-purchase staging row, unique on (user_id, product_id).
/// Consumed when its items convert into a purchase request.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WishlistItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
}
