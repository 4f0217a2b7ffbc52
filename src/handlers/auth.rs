use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::auth::AuthPrincipal;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::services::auth_service::AuthService;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub company_name: String,
    pub business_number: String,
    pub email: String,
    pub name: String,
    pub password: String,
}

/// POST /auth/register - Create a company and its first admin.
pub async fn register(Json(body): Json<RegisterRequest>) -> ApiResult<Value> {
    validate_email(&body.email)?;
    if body.company_name.trim().is_empty() || body.business_number.trim().is_empty() {
        return Err(ApiError::invalid_input(
            "Company name and business number are required",
        ));
    }

    let service = AuthService::new().await?;
    let authenticated = service
        .register_company(
            body.company_name.trim(),
            body.business_number.trim(),
            &body.email,
            body.name.trim(),
            &body.password,
        )
        .await?;

    Ok(ApiResponse::created(json!({
        "user": authenticated.user,
        "tokens": authenticated.tokens,
    })))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/login - Authenticate and receive an access/refresh pair.
pub async fn login(Json(body): Json<LoginRequest>) -> ApiResult<Value> {
    validate_email(&body.email)?;

    let service = AuthService::new().await?;
    let authenticated = service.login(&body.email, &body.password).await?;

    Ok(ApiResponse::success(json!({
        "user": authenticated.user,
        "tokens": authenticated.tokens,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /auth/refresh - Rotate the refresh token.
pub async fn refresh(Json(body): Json<RefreshRequest>) -> ApiResult<Value> {
    let service = AuthService::new().await?;
    let tokens = service.refresh(&body.refresh_token).await?;
    Ok(ApiResponse::success(json!({ "tokens": tokens })))
}

/// GET /api/auth/me
pub async fn me(Extension(principal): Extension<AuthPrincipal>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "id": principal.id,
        "company_id": principal.company_id,
        "email": principal.email,
        "role": principal.role,
    })))
}

/// POST /api/auth/logout - Revoke the stored refresh token.
pub async fn logout(Extension(principal): Extension<AuthPrincipal>) -> ApiResult<Value> {
    let service = AuthService::new().await?;
    service.logout(principal.id).await?;
    Ok(ApiResponse::with_message(json!({}), "Logged out"))
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let ok = email.contains('@')
        && !email.starts_with('@')
        && !email.ends_with('@')
        && !email.contains(char::is_whitespace);
    if !ok {
        return Err(ApiError::invalid_input("Invalid email address"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_check() {
        assert!(validate_email("kim@acme.test").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a b@x.y").is_err());
        assert!(validate_email("@x.y").is_err());
    }
}
