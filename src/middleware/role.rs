use axum::{extract::Request, middleware::Next, response::Response};

use super::auth::AuthPrincipal;
use crate::database::models::Role;
use crate::error::ApiError;

/// Role gate over the authenticated principal, independent of tenant
/// concerns. Uses the USER < MANAGER < ADMIN total order.
async fn require_role(min_role: Role, request: Request, next: Next) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<AuthPrincipal>()
        .ok_or_else(|| ApiError::unauthenticated("Authentication required"))?;

    if principal.role < min_role {
        return Err(ApiError::forbidden(format!(
            "Requires {} role or higher",
            min_role
        )));
    }

    Ok(next.run(request).await)
}

pub async fn require_manager(request: Request, next: Next) -> Result<Response, ApiError> {
    require_role(Role::Manager, request, next).await
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    require_role(Role::Admin, request, next).await
}
