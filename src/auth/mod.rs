use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config;
use crate::database::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Bearer token payload. `deny_unknown_fields` rejects structurally different
/// payloads signed with the same secret.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Claims {
    pub sub: Uuid,
    /// Absent for principals with no company affiliation; the tenant gate
    /// rejects those with Forbidden.
    pub company_id: Option<Uuid>,
    pub email: String,
    pub role: Role,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    fn new(user_id: Uuid, company_id: Uuid, email: String, role: Role, kind: TokenKind) -> Self {
        let now = Utc::now();
        let security = &config::config().security;
        let lifetime = match kind {
            TokenKind::Access => Duration::minutes(security.access_token_expiry_mins),
            TokenKind::Refresh => Duration::days(security.refresh_token_expiry_days),
        };

        Self {
            sub: user_id,
            company_id: Some(company_id),
            email,
            role,
            kind,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("JWT secret not configured")]
    MissingSecret,
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Wrong token kind for this operation")]
    WrongTokenKind,
    #[error("Password hashing failed: {0}")]
    Crypto(String),
}

impl From<AuthError> for crate::error::ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken | AuthError::WrongTokenKind => {
                crate::error::ApiError::unauthenticated(err.to_string())
            }
            other => {
                tracing::error!("auth error: {}", other);
                crate::error::ApiError::internal("Authentication subsystem failure")
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

fn secret() -> Result<&'static str, AuthError> {
    let secret = config::config().security.jwt_secret.as_str();
    if secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }
    Ok(secret)
}

fn sign(claims: &Claims) -> Result<String, AuthError> {
    let key = EncodingKey::from_secret(secret()?.as_bytes());
    encode(&Header::default(), claims, &key).map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

/// Issue an access + refresh token pair for the given user.
pub fn issue_token_pair(
    user_id: Uuid,
    company_id: Uuid,
    email: &str,
    role: Role,
) -> Result<TokenPair, AuthError> {
    let access = Claims::new(user_id, company_id, email.to_string(), role, TokenKind::Access);
    let refresh = Claims::new(user_id, company_id, email.to_string(), role, TokenKind::Refresh);
    let expires_in = access.exp - access.iat;

    Ok(TokenPair {
        access_token: sign(&access)?,
        refresh_token: sign(&refresh)?,
        expires_in,
    })
}

/// Verify signature, expiry and payload shape; the caller states which token
/// kind it expects.
pub fn verify_token(token: &str, expected_kind: TokenKind) -> Result<Claims, AuthError> {
    let key = DecodingKey::from_secret(secret()?.as_bytes());
    let claims = decode::<Claims>(token, &key, &Validation::default())
        .map_err(|_| AuthError::InvalidToken)?
        .claims;

    if claims.kind != expected_kind {
        return Err(AuthError::WrongTokenKind);
    }
    Ok(claims)
}

/// Argon2id PHC-format password hash.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Crypto(e.to_string()))
}

/// Returns Ok(true) on match, Ok(false) on mismatch, Err on malformed hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = argon2::PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}

/// Stable fingerprint for storing refresh tokens at rest.
pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pair() -> TokenPair {
        issue_token_pair(Uuid::new_v4(), Uuid::new_v4(), "kim@acme.test", Role::Manager).unwrap()
    }

    #[test]
    fn token_roundtrip_preserves_identity() {
        let company_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let pair =
            issue_token_pair(user_id, company_id, "kim@acme.test", Role::Admin).unwrap();

        let claims = verify_token(&pair.access_token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.company_id, Some(company_id));
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn refresh_token_rejected_as_access() {
        let pair = sample_pair();
        let err = verify_token(&pair.refresh_token, TokenKind::Access).unwrap_err();
        assert!(matches!(err, AuthError::WrongTokenKind));
    }

    #[test]
    fn structurally_different_payload_rejected() {
        // Same secret, different shape: an extra field must not decode
        let key = EncodingKey::from_secret(secret().unwrap().as_bytes());
        let forged = serde_json::json!({
            "sub": Uuid::new_v4(),
            "company_id": Uuid::new_v4(),
            "email": "x@y.z",
            "role": "ADMIN",
            "kind": "access",
            "iat": Utc::now().timestamp(),
            "exp": Utc::now().timestamp() + 600,
            "is_superuser": true,
        });
        let token = encode(&Header::default(), &forged, &key).unwrap();
        assert!(matches!(
            verify_token(&token, TokenKind::Access),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn password_roundtrip() {
        let hash = hash_password("hunter2!").unwrap();
        assert!(verify_password("hunter2!", &hash).unwrap());
        assert!(!verify_password("hunter3!", &hash).unwrap());
    }

    #[test]
    fn fingerprint_is_stable_and_token_specific() {
        let pair = sample_pair();
        assert_eq!(
            token_fingerprint(&pair.refresh_token),
            token_fingerprint(&pair.refresh_token)
        );
        assert_ne!(
            token_fingerprint(&pair.access_token),
            token_fingerprint(&pair.refresh_token)
        );
    }
}
