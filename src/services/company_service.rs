use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{hash_password, verify_password};
use crate::database::manager::DatabaseManager;
use crate::database::models::Company;
use crate::error::ApiError;
use crate::tenant::TenantContext;

pub struct CompanyService {
    pool: PgPool,
}

impl CompanyService {
    pub async fn new() -> Result<Self, ApiError> {
        Ok(Self {
            pool: DatabaseManager::pool().await?,
        })
    }

    fn company_id() -> Result<Uuid, ApiError> {
        TenantContext::current()
            .map(|ctx| ctx.company_id)
            .ok_or_else(|| ApiError::internal("Request context unavailable"))
    }

    pub async fn get(&self) -> Result<Company, ApiError> {
        let company_id = Self::company_id()?;
        let company: Option<Company> = sqlx::query_as("SELECT * FROM companies WHERE id = $1")
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::from)?;
        company.ok_or_else(|| ApiError::not_found("Company not found"))
    }

    /// Admin profile update: company rename and password change commit as
    /// one unit; a reader never observes the rename without the password
    /// change or vice versa.
    pub async fn update_profile(
        &self,
        admin_id: Uuid,
        new_name: Option<&str>,
        current_password: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<Company, ApiError> {
        let company_id = Self::company_id()?;

        if new_name.is_none() && new_password.is_none() {
            return Err(ApiError::invalid_input("Nothing to update"));
        }

        if let Some(new_password) = new_password {
            if new_password.len() < 8 {
                return Err(ApiError::invalid_input(
                    "Password must be at least 8 characters",
                ));
            }
            let current = current_password.ok_or_else(|| {
                ApiError::invalid_input("Current password is required to set a new one")
            })?;
            let stored: Option<String> =
                sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
                    .bind(admin_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(ApiError::from)?;
            let stored = stored.ok_or_else(|| ApiError::not_found("User not found"))?;
            if !verify_password(current, &stored)? {
                return Err(ApiError::forbidden("Current password is incorrect"));
            }
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::from)?;

        if let Some(name) = new_name {
            if name.trim().is_empty() {
                return Err(ApiError::invalid_input("Company name must not be empty"));
            }
            sqlx::query("UPDATE companies SET name = $1, updated_at = now() WHERE id = $2")
                .bind(name)
                .bind(company_id)
                .execute(&mut *tx)
                .await
                .map_err(ApiError::from)?;
        }

        if let Some(new_password) = new_password {
            let password_hash = hash_password(new_password)?;
            sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
                .bind(&password_hash)
                .bind(admin_id)
                .execute(&mut *tx)
                .await
                .map_err(ApiError::from)?;
        }

        tx.commit().await.map_err(ApiError::from)?;
        self.get().await
    }
}
