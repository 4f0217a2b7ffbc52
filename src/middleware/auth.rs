use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::{verify_token, Claims, TokenKind};
use crate::database::models::Role;
use crate::error::ApiError;

/// Authenticated principal extracted from a verified access token.
#[derive(Clone, Debug)]
pub struct AuthPrincipal {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub email: String,
    pub role: Role,
}

impl From<Claims> for AuthPrincipal {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            company_id: claims.company_id,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Authentication gate: verifies the bearer credential and attaches the
/// principal for downstream stages. Everything protected sits behind this.
pub async fn bearer_auth(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&headers).map_err(ApiError::unauthenticated)?;
    let claims = verify_token(&token, TokenKind::Access)?;

    request.extensions_mut().insert(AuthPrincipal::from(claims));
    Ok(next.run(request).await)
}

/// Strict bearer parse: exactly `Bearer` + whitespace + token, with no
/// whitespace inside the token itself.
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header encoding".to_string())?;

    let rest = auth_str
        .strip_prefix("Bearer")
        .ok_or_else(|| "Authorization header must use Bearer scheme".to_string())?;

    if !rest.starts_with(|c: char| c.is_ascii_whitespace()) {
        return Err("Malformed Bearer credential".to_string());
    }

    let token = rest.trim_start();
    if token.is_empty() {
        return Err("Empty bearer token".to_string());
    }
    if token.chars().any(|c| c.is_ascii_whitespace()) {
        return Err("Malformed bearer token".to_string());
    }

    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn accepts_single_and_multiple_separating_spaces() {
        assert_eq!(
            extract_bearer_token(&headers_with("Bearer abc.def.ghi")).unwrap(),
            "abc.def.ghi"
        );
        assert_eq!(
            extract_bearer_token(&headers_with("Bearer   abc")).unwrap(),
            "abc"
        );
    }

    #[test]
    fn rejects_missing_header_and_wrong_scheme() {
        assert!(extract_bearer_token(&HeaderMap::new()).is_err());
        assert!(extract_bearer_token(&headers_with("Basic abc")).is_err());
        assert!(extract_bearer_token(&headers_with("bearer abc")).is_err());
    }

    #[test]
    fn rejects_empty_or_embedded_whitespace_tokens() {
        assert!(extract_bearer_token(&headers_with("Bearer")).is_err());
        assert!(extract_bearer_token(&headers_with("Bearer ")).is_err());
        assert!(extract_bearer_token(&headers_with("Bearer ab c")).is_err());
        assert!(extract_bearer_token(&headers_with("Bearerabc")).is_err());
    }
}
