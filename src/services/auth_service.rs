use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{
    hash_password, issue_token_pair, token_fingerprint, verify_password, verify_token, TokenKind,
    TokenPair,
};
use crate::database::manager::DatabaseManager;
use crate::database::models::{Company, User};
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct AuthenticatedUser {
    pub user: User,
    pub tokens: TokenPair,
}

/// Credential flows. These run before the tenant gate, so every query here
/// is deliberately explicit about its scope: login resolves the user by
/// globally-unique email, refresh by the token's own subject.
pub struct AuthService {
    pool: PgPool,
}

impl AuthService {
    pub async fn new() -> Result<Self, ApiError> {
        Ok(Self {
            pool: DatabaseManager::pool().await?,
        })
    }

    /// Company + first admin registration, one atomic unit.
    pub async fn register_company(
        &self,
        company_name: &str,
        business_number: &str,
        admin_email: &str,
        admin_name: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, ApiError> {
        if password.len() < 8 {
            return Err(ApiError::invalid_input(
                "Password must be at least 8 characters",
            ));
        }

        let password_hash = hash_password(password)?;
        let mut tx = self.pool.begin().await.map_err(ApiError::from)?;

        // Duplicate business number or email surfaces as Conflict via the
        // unique constraints
        let company = sqlx::query_as::<_, Company>(
            "INSERT INTO companies (name, business_number) VALUES ($1, $2) RETURNING *",
        )
        .bind(company_name)
        .bind(business_number)
        .fetch_one(&mut *tx)
        .await
        .map_err(ApiError::from)?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (company_id, email, name, role, password_hash)
            VALUES ($1, $2, $3, 'ADMIN', $4)
            RETURNING *
            "#,
        )
        .bind(company.id)
        .bind(admin_email)
        .bind(admin_name)
        .bind(&password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(ApiError::from)?;

        let tokens = issue_token_pair(user.id, company.id, &user.email, user.role)?;
        let fingerprint = token_fingerprint(&tokens.refresh_token);

        sqlx::query("UPDATE users SET refresh_token_hash = $1 WHERE id = $2")
            .bind(&fingerprint)
            .bind(user.id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::from)?;

        tx.commit().await.map_err(ApiError::from)?;

        Ok(AuthenticatedUser { user, tokens })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthenticatedUser, ApiError> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::from)?;

        // Same answer for unknown email and wrong password
        let user = user.ok_or_else(|| ApiError::unauthenticated("Invalid credentials"))?;
        if !verify_password(password, &user.password_hash)? {
            return Err(ApiError::unauthenticated("Invalid credentials"));
        }
        if !user.is_active {
            return Err(ApiError::forbidden("User is not active"));
        }

        let tokens = issue_token_pair(user.id, user.company_id, &user.email, user.role)?;
        self.store_refresh(user.id, &tokens.refresh_token).await?;

        Ok(AuthenticatedUser { user, tokens })
    }

    /// Rotate the refresh token: the presented token must verify and match
    /// the stored fingerprint, then a fresh pair replaces it.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let claims = verify_token(refresh_token, TokenKind::Refresh)?;

        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(claims.sub)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::from)?;

        let user = user.ok_or_else(|| ApiError::unauthenticated("Invalid refresh token"))?;
        if !user.is_active {
            return Err(ApiError::forbidden("User is not active"));
        }

        let presented = token_fingerprint(refresh_token);
        if user.refresh_token_hash.as_deref() != Some(presented.as_str()) {
            // Stale or revoked token; force a fresh login
            return Err(ApiError::unauthenticated("Invalid refresh token"));
        }

        let tokens = issue_token_pair(user.id, user.company_id, &user.email, user.role)?;
        self.store_refresh(user.id, &tokens.refresh_token).await?;
        Ok(tokens)
    }

    /// Drop the stored refresh fingerprint so the current refresh token dies.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), ApiError> {
        sqlx::query("UPDATE users SET refresh_token_hash = NULL WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::from)?;
        Ok(())
    }

    async fn store_refresh(&self, user_id: Uuid, refresh_token: &str) -> Result<(), ApiError> {
        sqlx::query("UPDATE users SET refresh_token_hash = $1 WHERE id = $2")
            .bind(token_fingerprint(refresh_token))
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::from)?;
        Ok(())
    }
}

/// Sanity checks over role semantics live here with the service that issues
/// role-bearing tokens.
#[cfg(test)]
mod tests {
    use crate::database::models::Role;

    #[test]
    fn admin_outranks_everyone() {
        assert!(Role::Admin > Role::Manager);
        assert!(Role::Manager > Role::User);
    }
}
