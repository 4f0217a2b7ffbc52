//! Tenant-aware data access.
//!
//! [`ScopedRepository`] centralizes the "never forget the tenant filter"
//! invariant. For tables in [`TENANT_SCOPED_TABLES`] it merges the ambient
//! [`TenantContext`]'s `company_id` into every read, update and delete
//! filter (a caller-supplied `company_id` is overwritten, so a forged filter
//! cannot reach another tenant) and stamps `company_id` onto inserts.
//!
//! With no ambient context the filter passes through unchanged. That is the
//! deliberate escape hatch for system jobs (monthly budget seeding) which
//! operate across all companies; user-facing routes always run inside the
//! tenant gate's scope and can never reach this layer unscoped.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::{postgres::PgRow, FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::query_builder::QueryBuilder;
use crate::filter::FilterData;
use crate::tenant::TenantContext;

/// Tables carrying a `company_id` column. Everything else (cart_items,
/// wishlist_items, notifications, purchase_items, companies) passes through
/// untouched; their isolation derives from scoped parent lookups.
pub const TENANT_SCOPED_TABLES: &[&str] = &[
    "users",
    "categories",
    "products",
    "budgets",
    "budget_criteria",
    "purchase_requests",
];

/// Tables whose `updated_at` is bumped on every scoped update.
const TOUCH_UPDATED_AT: &[&str] = &["users", "products", "purchase_requests"];

pub fn is_tenant_scoped(table: &str) -> bool {
    TENANT_SCOPED_TABLES.contains(&table)
}

/// Merge the ambient tenant filter into `data` for a scoped table.
/// The tenant context always wins over a caller-supplied `company_id`.
pub fn merge_tenant_filter(
    table: &str,
    ctx: Option<&TenantContext>,
    mut data: FilterData,
) -> FilterData {
    let Some(ctx) = ctx else { return data };
    if !is_tenant_scoped(table) {
        return data;
    }

    let company = json!(ctx.company_id);
    data.where_clause = Some(match data.where_clause.take() {
        Some(Value::Object(mut obj)) => {
            obj.insert("company_id".to_string(), company);
            Value::Object(obj)
        }
        // None or malformed input: the tenant condition still applies;
        // malformed shapes are rejected later by filter validation
        _ => json!({ "company_id": company }),
    });
    data
}

/// Stamp `company_id` onto an insert payload for a scoped table, unless the
/// caller already set one explicitly.
pub fn stamp_tenant_payload(table: &str, ctx: Option<&TenantContext>, mut payload: Value) -> Value {
    let Some(ctx) = ctx else { return payload };
    if !is_tenant_scoped(table) {
        return payload;
    }

    if let Value::Object(ref mut obj) = payload {
        obj.entry("company_id".to_string())
            .or_insert_with(|| json!(ctx.company_id));
    }
    payload
}

pub struct ScopedRepository<T> {
    table_name: String,
    pool: PgPool,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> ScopedRepository<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin + Serialize,
{
    pub fn new(table_name: impl Into<String>, pool: PgPool) -> Self {
        Self {
            table_name: table_name.into(),
            pool,
            _phantom: std::marker::PhantomData,
        }
    }

    fn scoped(&self, data: FilterData) -> FilterData {
        merge_tenant_filter(&self.table_name, TenantContext::current().as_ref(), data)
    }

    pub async fn select_any(&self, filter_data: FilterData) -> Result<Vec<T>, DatabaseError> {
        QueryBuilder::<T>::new(&self.table_name)?
            .filter(self.scoped(filter_data))?
            .select_all(&self.pool)
            .await
    }

    pub async fn select_one(&self, filter_data: FilterData) -> Result<Option<T>, DatabaseError> {
        QueryBuilder::<T>::new(&self.table_name)?
            .filter(self.scoped(filter_data))?
            .select_optional(&self.pool)
            .await
    }

    /// Like `select_one` but a missing row is an error. Rows outside the
    /// caller's tenant are filtered out before this check, so cross-tenant
    /// probes and genuinely absent rows are indistinguishable.
    pub async fn select_404(&self, filter_data: FilterData) -> Result<T, DatabaseError> {
        match QueryBuilder::<T>::new(&self.table_name)?
            .filter(self.scoped(filter_data))?
            .select_one(&self.pool)
            .await
        {
            Ok(row) => Ok(row),
            Err(DatabaseError::Sqlx(sqlx::Error::RowNotFound)) => {
                Err(DatabaseError::NotFound("Record not found".to_string()))
            }
            Err(other) => Err(other),
        }
    }

    pub async fn count(&self, filter_data: FilterData) -> Result<i64, DatabaseError> {
        QueryBuilder::<T>::new(&self.table_name)?
            .filter(self.scoped(filter_data))?
            .count(&self.pool)
            .await
    }

    pub async fn select_ids(&self, ids: Vec<Uuid>) -> Result<Vec<T>, DatabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        self.select_any(FilterData::where_only(json!({ "id": { "$in": ids } })))
            .await
    }

    pub async fn insert(&self, payload: Value) -> Result<T, DatabaseError> {
        let payload = stamp_tenant_payload(
            &self.table_name,
            TenantContext::current().as_ref(),
            payload,
        );
        QueryBuilder::<T>::new(&self.table_name)?
            .insert(&self.pool, &payload)
            .await
    }

    /// Update rows matching the (tenant-merged) filter; returns rows affected.
    pub async fn update_where(
        &self,
        filter_data: FilterData,
        payload: Value,
    ) -> Result<u64, DatabaseError> {
        let payload = self.touch(payload);
        QueryBuilder::<T>::new(&self.table_name)?
            .filter(self.scoped(filter_data))?
            .update(&self.pool, &payload)
            .await
    }

    /// Delete rows matching the (tenant-merged) filter; returns rows affected.
    pub async fn delete_where(&self, filter_data: FilterData) -> Result<u64, DatabaseError> {
        QueryBuilder::<T>::new(&self.table_name)?
            .filter(self.scoped(filter_data))?
            .delete(&self.pool)
            .await
    }

    /// Update-or-insert keyed by the filter: the lookup condition is tenant-
    /// merged and the creation payload tenant-stamped, so neither side can
    /// cross tenants.
    pub async fn upsert(&self, filter_data: FilterData, payload: Value) -> Result<T, DatabaseError> {
        let updated = self
            .update_where(filter_data.clone(), payload.clone())
            .await?;
        if updated == 0 {
            return self.insert(payload).await;
        }
        self.select_404(filter_data).await
    }

    fn touch(&self, mut payload: Value) -> Value {
        if TOUCH_UPDATED_AT.contains(&self.table_name.as_str()) {
            if let Value::Object(ref mut obj) = payload {
                obj.entry("updated_at".to_string())
                    .or_insert_with(|| json!(Utc::now().to_rfc3339()));
            }
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::with_tenant_context;

    fn ctx(company: u128) -> TenantContext {
        TenantContext::new(Uuid::from_u128(company), Uuid::from_u128(999))
    }

    #[test]
    fn context_overwrites_forged_company_filter() {
        let forged = FilterData::where_only(json!({
            "company_id": "11111111-1111-1111-1111-111111111111",
            "status": "PENDING",
        }));
        let tenant = ctx(2);
        let merged = merge_tenant_filter("purchase_requests", Some(&tenant), forged);
        let where_clause = merged.where_clause.unwrap();
        assert_eq!(where_clause["company_id"], json!(tenant.company_id));
        // Unrelated conditions survive the merge
        assert_eq!(where_clause["status"], "PENDING");
    }

    #[test]
    fn missing_context_passes_filter_through() {
        let data = FilterData::where_only(json!({"year": 2025, "month": 6}));
        let merged = merge_tenant_filter("budgets", None, data.clone());
        assert_eq!(merged.where_clause, data.where_clause);
    }

    #[test]
    fn empty_filter_gains_tenant_condition() {
        let tenant = ctx(7);
        let merged = merge_tenant_filter("products", Some(&tenant), FilterData::default());
        assert_eq!(
            merged.where_clause.unwrap(),
            json!({"company_id": tenant.company_id})
        );
    }

    #[test]
    fn non_scoped_table_untouched() {
        let tenant = ctx(7);
        let data = FilterData::where_only(json!({"user_id": "u1"}));
        let merged = merge_tenant_filter("cart_items", Some(&tenant), data.clone());
        assert_eq!(merged.where_clause, data.where_clause);
    }

    #[test]
    fn insert_payload_stamped_only_when_absent() {
        let tenant = ctx(3);
        let stamped = stamp_tenant_payload("products", Some(&tenant), json!({"name": "cola"}));
        assert_eq!(stamped["company_id"], json!(tenant.company_id));

        // An explicit company_id is left alone (trusted system callers only;
        // request paths never set one)
        let explicit = json!({"name": "cola", "company_id": "preset"});
        let kept = stamp_tenant_payload("products", Some(&tenant), explicit.clone());
        assert_eq!(kept, explicit);
    }

    #[tokio::test]
    async fn ambient_context_reaches_merge_across_awaits() {
        let tenant = ctx(42);
        let merged = with_tenant_context(tenant.clone(), async {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            merge_tenant_filter(
                "products",
                TenantContext::current().as_ref(),
                FilterData::default(),
            )
        })
        .await;
        assert_eq!(
            merged.where_clause.unwrap()["company_id"],
            json!(tenant.company_id)
        );
    }

    #[tokio::test]
    async fn scheduler_path_stays_unfiltered() {
        // No scope established: the exact shape the monthly seeder relies on
        let merged = merge_tenant_filter(
            "budgets",
            TenantContext::current().as_ref(),
            FilterData::default(),
        );
        assert!(merged.where_clause.is_none());
    }
}
