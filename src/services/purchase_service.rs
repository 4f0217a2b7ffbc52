use std::collections::HashMap;

use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{
    CartItem, NotificationTarget, Product, PurchaseItem, PurchaseRequest, PurchaseStatus, Role,
};
use crate::database::ScopedRepository;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::services::budget_service::{BudgetError, BudgetService, DebitOutcome};
use crate::services::notification_service::NotificationService;
use crate::tenant::TenantContext;

#[derive(Debug, Clone, Deserialize)]
pub struct RequestedItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Budget(#[from] BudgetError),

    #[error("{0}")]
    Invalid(String),

    #[error("Purchase request not found")]
    NotFound,

    #[error("Purchase request already processed")]
    AlreadyProcessed,

    #[error("Only the requester may cancel a purchase request")]
    NotRequester,

    #[error("Workflow invoked outside a tenant scope")]
    MissingScope,
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Database(e) => e.into(),
            WorkflowError::Sqlx(e) => e.into(),
            WorkflowError::Budget(e) => e.into(),
            WorkflowError::Invalid(msg) => ApiError::invalid_input(msg),
            WorkflowError::NotFound => ApiError::not_found("Purchase request not found"),
            WorkflowError::AlreadyProcessed => {
                ApiError::conflict("Purchase request already processed")
            }
            WorkflowError::NotRequester => {
                ApiError::forbidden("Only the requester may cancel a purchase request")
            }
            WorkflowError::MissingScope => {
                tracing::error!("purchase workflow reached without tenant scope");
                ApiError::internal("Request context unavailable")
            }
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct PurchaseDetail {
    #[serde(flatten)]
    pub request: PurchaseRequest,
    pub items: Vec<PurchaseItem>,
}

/// The purchase request state machine.
///
/// PENDING is the only live state; APPROVED, REJECTED and CANCELLED are
/// terminal. Every transition is a conditional update on the stored status,
/// so concurrent decisions resolve to exactly one winner and all others see
/// "already processed".
pub struct PurchaseService {
    pool: PgPool,
}

impl PurchaseService {
    pub async fn new() -> Result<Self, WorkflowError> {
        Ok(Self {
            pool: DatabaseManager::pool().await?,
        })
    }

    fn requests(&self) -> ScopedRepository<PurchaseRequest> {
        ScopedRepository::new("purchase_requests", self.pool.clone())
    }

    fn ctx() -> Result<TenantContext, WorkflowError> {
        TenantContext::current().ok_or(WorkflowError::MissingScope)
    }

    /// Cart-backed creation: the submitted items must exactly match the
    /// caller's current cart, products must be active rows of the caller's
    /// company, and request + items + cart clearing commit as one unit.
    pub async fn create_from_cart(
        &self,
        requester_id: Uuid,
        items: Vec<RequestedItem>,
        shipping_fee: i64,
        request_message: Option<String>,
    ) -> Result<PurchaseDetail, WorkflowError> {
        let ctx = Self::ctx()?;
        validate_items(&items, shipping_fee)?;

        let cart: Vec<CartItem> =
            sqlx::query_as("SELECT * FROM cart_items WHERE user_id = $1")
                .bind(requester_id)
                .fetch_all(&self.pool)
                .await?;

        if !cart_matches(&cart, &items) {
            return Err(WorkflowError::Invalid(
                "Submitted items do not match the current cart contents".to_string(),
            ));
        }

        let products = self.load_active_products(&items).await?;
        let total_price = order_total(&items, &products);

        // Advisory gate; the authoritative debit happens at approval time
        let budgets = BudgetService::new().await?;
        budgets
            .precheck_order(ctx.company_id, total_price + shipping_fee)
            .await?;

        let request_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, PurchaseRequest>(
            r#"
            INSERT INTO purchase_requests
                (id, company_id, requester_id, status, total_price, shipping_fee, request_message)
            VALUES ($1, $2, $3, 'PENDING', $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(ctx.company_id)
        .bind(requester_id)
        .bind(total_price)
        .bind(shipping_fee)
        .bind(&request_message)
        .fetch_one(&mut *tx)
        .await?;

        let purchase_items = insert_items(&mut tx, request_id, &items, &products).await?;

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = ANY($2)")
            .bind(requester_id)
            .bind(&product_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.notify_reviewers(&ctx, requester_id, request_id, total_price + shipping_fee)
            .await;

        Ok(PurchaseDetail {
            request,
            items: purchase_items,
        })
    }

    /// Administrator-only immediate purchase: skips the cart and the PENDING
    /// state, landing directly in APPROVED with the requester as approver.
    /// The budget debit is part of the same transaction as the insert, so an
    /// approved-but-undebited request cannot exist on this path either.
    pub async fn create_immediate(
        &self,
        requester_id: Uuid,
        items: Vec<RequestedItem>,
        shipping_fee: i64,
        request_message: Option<String>,
    ) -> Result<PurchaseDetail, WorkflowError> {
        let ctx = Self::ctx()?;
        validate_items(&items, shipping_fee)?;

        let products = self.load_active_products(&items).await?;
        let total_price = order_total(&items, &products);

        let now = Utc::now();
        let request_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, PurchaseRequest>(
            r#"
            INSERT INTO purchase_requests
                (id, company_id, requester_id, approver_id, status, total_price, shipping_fee, request_message)
            VALUES ($1, $2, $3, $3, 'APPROVED', $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(ctx.company_id)
        .bind(requester_id)
        .bind(total_price)
        .bind(shipping_fee)
        .bind(&request_message)
        .fetch_one(&mut *tx)
        .await?;

        let purchase_items = insert_items(&mut tx, request_id, &items, &products).await?;

        let outcome = BudgetService::try_debit(
            &mut *tx,
            ctx.company_id,
            now.year(),
            now.month() as i32,
            total_price + shipping_fee,
        )
        .await?;
        if outcome == DebitOutcome::Insufficient {
            // Dropping the transaction rolls back request and items
            return Err(BudgetError::Insufficient.into());
        }

        tx.commit().await?;

        Ok(PurchaseDetail {
            request,
            items: purchase_items,
        })
    }

    /// PENDING -> APPROVED, with the budget debit in the same transaction.
    /// Either the status flips and the budget is debited, or neither happens:
    /// insufficient budget rolls the flip back and the request stays PENDING.
    pub async fn approve(&self, approver_id: Uuid, request_id: Uuid) -> Result<(), WorkflowError> {
        let ctx = Self::ctx()?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        // Single-writer-wins: only the caller that observes PENDING proceeds
        let flipped = sqlx::query_as::<_, PurchaseRequest>(
            r#"
            UPDATE purchase_requests
            SET status = 'APPROVED', approver_id = $1, updated_at = now()
            WHERE id = $2 AND company_id = $3 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(approver_id)
        .bind(request_id)
        .bind(ctx.company_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(request) = flipped else {
            drop(tx);
            return Err(self.classify_missed_transition(request_id).await?);
        };

        let outcome = BudgetService::try_debit(
            &mut *tx,
            ctx.company_id,
            now.year(),
            now.month() as i32,
            request.total_price + request.shipping_fee,
        )
        .await?;
        if outcome == DebitOutcome::Insufficient {
            return Err(BudgetError::Insufficient.into());
        }

        tx.commit().await?;

        self.notify_requester(
            request.requester_id,
            request_id,
            "Your purchase request was approved",
        )
        .await;
        Ok(())
    }

    /// PENDING -> REJECTED; requires a reason, records the deciding admin.
    pub async fn reject(
        &self,
        approver_id: Uuid,
        request_id: Uuid,
        reason: &str,
    ) -> Result<(), WorkflowError> {
        let ctx = Self::ctx()?;
        if reason.trim().is_empty() {
            return Err(WorkflowError::Invalid(
                "A rejection reason is required".to_string(),
            ));
        }

        let rejected = sqlx::query_as::<_, PurchaseRequest>(
            r#"
            UPDATE purchase_requests
            SET status = 'REJECTED', approver_id = $1, reject_reason = $2, updated_at = now()
            WHERE id = $3 AND company_id = $4 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(approver_id)
        .bind(reason)
        .bind(request_id)
        .bind(ctx.company_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(request) = rejected else {
            return Err(self.classify_missed_transition(request_id).await?);
        };

        self.notify_requester(
            request.requester_id,
            request_id,
            &format!("Your purchase request was rejected: {}", reason),
        )
        .await;
        Ok(())
    }

    /// PENDING -> CANCELLED, requester only. No side effects beyond the
    /// status flip; items stay for history.
    pub async fn cancel(&self, user_id: Uuid, request_id: Uuid) -> Result<(), WorkflowError> {
        let ctx = Self::ctx()?;

        let cancelled = sqlx::query(
            r#"
            UPDATE purchase_requests
            SET status = 'CANCELLED', updated_at = now()
            WHERE id = $1 AND company_id = $2 AND requester_id = $3 AND status = 'PENDING'
            "#,
        )
        .bind(request_id)
        .bind(ctx.company_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if cancelled == 0 {
            let request = self
                .requests()
                .select_one(FilterData::where_only(json!({ "id": request_id })))
                .await?
                .ok_or(WorkflowError::NotFound)?;
            if request.requester_id != user_id {
                return Err(WorkflowError::NotRequester);
            }
            return Err(WorkflowError::AlreadyProcessed);
        }
        Ok(())
    }

    pub async fn get(&self, request_id: Uuid) -> Result<PurchaseDetail, WorkflowError> {
        let request = match self
            .requests()
            .select_404(FilterData::where_only(json!({ "id": request_id })))
            .await
        {
            Ok(r) => r,
            Err(DatabaseError::NotFound(_)) => return Err(WorkflowError::NotFound),
            Err(e) => return Err(e.into()),
        };

        let items: Vec<PurchaseItem> =
            sqlx::query_as("SELECT * FROM purchase_items WHERE purchase_request_id = $1")
                .bind(request_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(PurchaseDetail { request, items })
    }

    /// USER sees their own requests; MANAGER and ADMIN see the whole
    /// company's, optionally narrowed by status.
    pub async fn list(
        &self,
        caller_id: Uuid,
        caller_role: Role,
        status: Option<PurchaseStatus>,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<PurchaseRequest>, i64), WorkflowError> {
        let mut where_clause = serde_json::Map::new();
        if caller_role < Role::Manager {
            where_clause.insert("requester_id".to_string(), json!(caller_id));
        }
        if let Some(status) = status {
            where_clause.insert("status".to_string(), json!(status.as_str()));
        }
        let where_clause = serde_json::Value::Object(where_clause);

        let repo = self.requests();
        let items = repo
            .select_any(FilterData {
                where_clause: Some(where_clause.clone()),
                order: Some(json!({ "created_at": "desc" })),
                limit: Some(limit),
                offset: Some((page - 1) * limit),
            })
            .await?;
        let total = repo.count(FilterData::where_only(where_clause)).await?;
        Ok((items, total))
    }

    async fn load_active_products(
        &self,
        items: &[RequestedItem],
    ) -> Result<HashMap<Uuid, Product>, WorkflowError> {
        let ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let products = ScopedRepository::<Product>::new("products", self.pool.clone())
            .select_ids(ids.clone())
            .await?;

        let by_id: HashMap<Uuid, Product> =
            products.into_iter().map(|p| (p.id, p)).collect();

        for id in &ids {
            match by_id.get(id) {
                Some(product) if product.is_active => {}
                Some(_) => {
                    return Err(WorkflowError::Invalid(format!(
                        "Product {} is no longer available",
                        id
                    )))
                }
                // Absent or another tenant's: same answer either way
                None => {
                    return Err(WorkflowError::Invalid(format!("Unknown product {}", id)))
                }
            }
        }
        Ok(by_id)
    }

    /// Zero rows from a conditional transition means the request is gone,
    /// belongs to another tenant (same thing to this caller), or already
    /// left PENDING.
    async fn classify_missed_transition(
        &self,
        request_id: Uuid,
    ) -> Result<WorkflowError, WorkflowError> {
        let existing = self
            .requests()
            .select_one(FilterData::where_only(json!({ "id": request_id })))
            .await?;
        Ok(match existing {
            None => WorkflowError::NotFound,
            Some(_) => WorkflowError::AlreadyProcessed,
        })
    }

    async fn notify_reviewers(
        &self,
        ctx: &TenantContext,
        requester_id: Uuid,
        request_id: Uuid,
        order_total: i64,
    ) {
        let reviewers: Vec<Uuid> = match sqlx::query_scalar(
            r#"
            SELECT id FROM users
            WHERE company_id = $1 AND role IN ('MANAGER', 'ADMIN') AND is_active = true AND id <> $2
            "#,
        )
        .bind(ctx.company_id)
        .bind(requester_id)
        .fetch_all(&self.pool)
        .await
        {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("reviewer lookup for fan-out failed: {}", e);
                return;
            }
        };

        match NotificationService::new().await {
            Ok(notifications) => {
                notifications
                    .fan_out(
                        &reviewers,
                        &format!("New purchase request awaiting review ({})", order_total),
                        NotificationTarget::PurchaseRequest,
                        Some(request_id),
                    )
                    .await;
            }
            Err(e) => tracing::warn!("notification service unavailable: {}", e),
        }
    }

    async fn notify_requester(&self, requester_id: Uuid, request_id: Uuid, content: &str) {
        match NotificationService::new().await {
            Ok(notifications) => {
                if let Err(e) = notifications
                    .create_and_push(
                        requester_id,
                        content,
                        NotificationTarget::PurchaseRequest,
                        Some(request_id),
                    )
                    .await
                {
                    tracing::warn!("requester notification failed: {}", e);
                }
            }
            Err(e) => tracing::warn!("notification service unavailable: {}", e),
        }
    }
}

/// Item-shape validation applied before anything mutates: at least one item,
/// positive quantities, no duplicate product rows, non-negative shipping.
pub fn validate_items(items: &[RequestedItem], shipping_fee: i64) -> Result<(), WorkflowError> {
    if items.is_empty() {
        return Err(WorkflowError::Invalid(
            "At least one item is required".to_string(),
        ));
    }
    if shipping_fee < 0 {
        return Err(WorkflowError::Invalid(
            "Shipping fee must be non-negative".to_string(),
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for item in items {
        if item.quantity < 1 {
            return Err(WorkflowError::Invalid(format!(
                "Quantity for product {} must be at least 1",
                item.product_id
            )));
        }
        if !seen.insert(item.product_id) {
            return Err(WorkflowError::Invalid(format!(
                "Duplicate product {} in items",
                item.product_id
            )));
        }
    }
    Ok(())
}

/// True when the submitted items are exactly the cart: same products, same
/// quantities, nothing missing, nothing extra.
pub fn cart_matches(cart: &[CartItem], items: &[RequestedItem]) -> bool {
    if cart.len() != items.len() {
        return false;
    }
    let in_cart: HashMap<Uuid, i32> = cart.iter().map(|c| (c.product_id, c.quantity)).collect();
    items
        .iter()
        .all(|item| in_cart.get(&item.product_id) == Some(&item.quantity))
}

fn order_total(items: &[RequestedItem], products: &HashMap<Uuid, Product>) -> i64 {
    items
        .iter()
        .map(|item| {
            products
                .get(&item.product_id)
                .map(|p| p.price * item.quantity as i64)
                .unwrap_or(0)
        })
        .sum()
}

async fn insert_items(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    request_id: Uuid,
    items: &[RequestedItem],
    products: &HashMap<Uuid, Product>,
) -> Result<Vec<PurchaseItem>, WorkflowError> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        // Current price becomes the immutable snapshot
        let price_snapshot = products
            .get(&item.product_id)
            .map(|p| p.price)
            .unwrap_or(0);

        let row = sqlx::query_as::<_, PurchaseItem>(
            r#"
            INSERT INTO purchase_items (purchase_request_id, product_id, quantity, price_snapshot)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(price_snapshot)
        .fetch_one(&mut **tx)
        .await?;
        out.push(row);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product: u128, quantity: i32) -> RequestedItem {
        RequestedItem {
            product_id: Uuid::from_u128(product),
            quantity,
        }
    }

    fn cart_row(product: u128, quantity: i32) -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            user_id: Uuid::from_u128(1),
            product_id: Uuid::from_u128(product),
            quantity,
        }
    }

    #[test]
    fn empty_items_rejected() {
        assert!(matches!(
            validate_items(&[], 0),
            Err(WorkflowError::Invalid(_))
        ));
    }

    #[test]
    fn zero_and_negative_quantities_rejected() {
        assert!(validate_items(&[item(1, 0)], 0).is_err());
        assert!(validate_items(&[item(1, -3)], 0).is_err());
        assert!(validate_items(&[item(1, 1)], 0).is_ok());
    }

    #[test]
    fn negative_shipping_rejected() {
        assert!(validate_items(&[item(1, 1)], -1).is_err());
    }

    #[test]
    fn duplicate_products_rejected() {
        assert!(validate_items(&[item(1, 1), item(1, 2)], 0).is_err());
    }

    #[test]
    fn cart_match_requires_same_products_and_quantities() {
        let cart = vec![cart_row(1, 2), cart_row(2, 1)];

        assert!(cart_matches(&cart, &[item(1, 2), item(2, 1)]));
        // Order of submission does not matter
        assert!(cart_matches(&cart, &[item(2, 1), item(1, 2)]));
        // Quantity drift is a mismatch
        assert!(!cart_matches(&cart, &[item(1, 3), item(2, 1)]));
        // Missing or extra rows are mismatches
        assert!(!cart_matches(&cart, &[item(1, 2)]));
        assert!(!cart_matches(
            &cart,
            &[item(1, 2), item(2, 1), item(3, 1)]
        ));
    }

    #[test]
    fn order_total_uses_current_prices() {
        let mut products = HashMap::new();
        let cola = Product {
            id: Uuid::from_u128(1),
            company_id: Uuid::from_u128(9),
            category_id: Uuid::from_u128(5),
            name: "cola".to_string(),
            price: 1500,
            image_url: None,
            link: String::new(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        products.insert(cola.id, cola);

        assert_eq!(order_total(&[item(1, 3)], &products), 4500);
    }
}
