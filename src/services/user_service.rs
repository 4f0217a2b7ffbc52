use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::hash_password;
use crate::database::manager::DatabaseManager;
use crate::database::models::{Role, User};
use crate::database::ScopedRepository;
use crate::error::ApiError;
use crate::external::mailer;
use crate::filter::FilterData;

/// Company-member administration. Everything here runs inside the tenant
/// gate, so the scoped repository confines reads and writes to the caller's
/// company automatically.
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub async fn new() -> Result<Self, ApiError> {
        Ok(Self {
            pool: DatabaseManager::pool().await?,
        })
    }

    fn repo(&self) -> ScopedRepository<User> {
        ScopedRepository::new("users", self.pool.clone())
    }

    /// Create a member with a temporary password and mail them an
    /// invitation. Mail failure does not fail the creation.
    pub async fn invite(
        &self,
        email: &str,
        name: &str,
        role: Role,
        temp_password: &str,
    ) -> Result<User, ApiError> {
        if temp_password.len() < 8 {
            return Err(ApiError::invalid_input(
                "Temporary password must be at least 8 characters",
            ));
        }
        let password_hash = hash_password(temp_password)?;

        // company_id is stamped by the scoped layer
        let user = self
            .repo()
            .insert(json!({
                "email": email,
                "name": name,
                "role": role.as_str(),
                "password_hash": password_hash,
            }))
            .await?;

        let subject = "You have been invited to your company snack store";
        let html = format!(
            "<p>Hello {}, an account was created for you. Sign in with your temporary password and change it.</p>",
            name
        );
        if let Err(e) = mailer().send(email, subject, &html).await {
            tracing::warn!("invitation mail to {} failed: {}", email, e);
        }

        Ok(user)
    }

    pub async fn list(&self, page: i64, limit: i64) -> Result<(Vec<User>, i64), ApiError> {
        let repo = self.repo();
        let items = repo
            .select_any(FilterData {
                where_clause: None,
                order: Some(json!({ "created_at": "asc" })),
                limit: Some(limit),
                offset: Some((page - 1) * limit),
            })
            .await?;
        let total = repo.count(FilterData::default()).await?;
        Ok((items, total))
    }

    pub async fn get(&self, user_id: Uuid) -> Result<User, ApiError> {
        Ok(self
            .repo()
            .select_404(FilterData::where_only(json!({ "id": user_id })))
            .await?)
    }

    /// Change a member's role. Admins cannot demote themselves, which keeps
    /// every company with at least one admin reachable from the UI.
    pub async fn change_role(
        &self,
        acting_admin: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<User, ApiError> {
        if acting_admin == user_id {
            return Err(ApiError::forbidden("You cannot change your own role"));
        }

        let updated = self
            .repo()
            .update_where(
                FilterData::where_only(json!({ "id": user_id })),
                json!({ "role": role.as_str() }),
            )
            .await?;
        if updated == 0 {
            return Err(ApiError::not_found("User not found"));
        }
        self.get(user_id).await
    }

    pub async fn set_active(
        &self,
        acting_admin: Uuid,
        user_id: Uuid,
        is_active: bool,
    ) -> Result<User, ApiError> {
        if acting_admin == user_id {
            return Err(ApiError::forbidden("You cannot deactivate yourself"));
        }

        let updated = self
            .repo()
            .update_where(
                FilterData::where_only(json!({ "id": user_id })),
                json!({ "is_active": is_active }),
            )
            .await?;
        if updated == 0 {
            return Err(ApiError::not_found("User not found"));
        }
        self.get(user_id).await
    }
}
