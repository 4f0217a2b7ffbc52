use axum::{extract::Request, middleware::Next, response::Response};
use sqlx::Row;
use uuid::Uuid;

use super::auth::AuthPrincipal;
use crate::database::manager::DatabaseManager;
use crate::error::ApiError;
use crate::tenant::{with_tenant_context, TenantContext};

/// Tenant gate: the single choke point after which all tenant-scoped data
/// access is automatically filtered.
///
/// Requires the authentication gate to have run. Rejects principals without
/// a company affiliation, revalidates the user row against the database
/// (still exists, still active, still in the claimed company), then runs the
/// rest of the request inside the tenant context scope.
pub async fn tenant_scope(request: Request, next: Next) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<AuthPrincipal>()
        .cloned()
        .ok_or_else(|| {
            ApiError::unauthenticated("Authentication required before tenant resolution")
        })?;

    let company_id = principal
        .company_id
        .ok_or_else(|| ApiError::forbidden("Principal has no company affiliation"))?;

    verify_membership(principal.id, company_id).await?;

    let ctx = TenantContext::new(company_id, principal.id);
    Ok(with_tenant_context(ctx, next.run(request)).await)
}

/// The token may outlive the user: check the row each request so deactivated
/// or moved users lose access immediately.
async fn verify_membership(user_id: Uuid, company_id: Uuid) -> Result<(), ApiError> {
    let pool = DatabaseManager::pool().await?;

    let row = sqlx::query("SELECT company_id, is_active FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            tracing::error!("tenant gate lookup failed for user {}: {}", user_id, e);
            ApiError::internal("Failed to resolve tenant")
        })?;

    let row = row.ok_or_else(|| {
        tracing::warn!("tenant gate: user {} no longer exists", user_id);
        ApiError::forbidden("User is not active")
    })?;

    let is_active: bool = row.get("is_active");
    if !is_active {
        tracing::warn!("tenant gate: user {} is deactivated", user_id);
        return Err(ApiError::forbidden("User is not active"));
    }

    let actual_company: Uuid = row.get("company_id");
    if actual_company != company_id {
        tracing::warn!(
            "tenant gate: user {} claims company {} but belongs to {}",
            user_id,
            company_id,
            actual_company
        );
        return Err(ApiError::forbidden("Company affiliation mismatch"));
    }

    Ok(())
}
