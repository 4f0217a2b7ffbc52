use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{Notification, NotificationTarget};
use crate::database::ScopedRepository;
use crate::filter::FilterData;
use crate::notify::{registry, NotificationEvent};

/// Durable-first notification fan-out.
///
/// Every event is persisted per recipient before any live delivery is
/// attempted; a recipient who is offline simply finds the record (and their
/// unread count) on the next fetch. The live push is purely an optimization
/// and its failure is never surfaced to the caller.
pub struct NotificationService {
    pool: PgPool,
}

impl NotificationService {
    pub async fn new() -> Result<Self, DatabaseError> {
        Ok(Self {
            pool: DatabaseManager::pool().await?,
        })
    }

    fn repo(&self) -> ScopedRepository<Notification> {
        ScopedRepository::new("notifications", self.pool.clone())
    }

    /// Persist first, then push to the recipient's live connection if any.
    pub async fn create_and_push(
        &self,
        receiver_id: Uuid,
        content: &str,
        target_type: NotificationTarget,
        target_id: Option<Uuid>,
    ) -> Result<Notification, DatabaseError> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (receiver_id, content, target_type, target_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(receiver_id)
        .bind(content)
        .bind(target_type)
        .bind(target_id)
        .fetch_one(&self.pool)
        .await?;

        let delivered = registry().push(
            receiver_id,
            NotificationEvent {
                id: notification.id,
                content: notification.content.clone(),
                target_type: notification.target_type,
                target_id: notification.target_id,
                created_at: notification.created_at,
            },
        );
        if !delivered {
            tracing::debug!("no live delivery for receiver {}", receiver_id);
        }

        Ok(notification)
    }

    /// Fan one event out to many recipients. Recipients are independent:
    /// one failed write is logged and does not abort the rest.
    pub async fn fan_out(
        &self,
        receiver_ids: &[Uuid],
        content: &str,
        target_type: NotificationTarget,
        target_id: Option<Uuid>,
    ) -> usize {
        let mut delivered = 0;
        for &receiver_id in receiver_ids {
            match self
                .create_and_push(receiver_id, content, target_type, target_id)
                .await
            {
                Ok(_) => delivered += 1,
                Err(e) => {
                    tracing::warn!("notification to {} failed: {}", receiver_id, e);
                }
            }
        }
        delivered
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Notification>, i64), DatabaseError> {
        let filter = FilterData {
            where_clause: Some(serde_json::json!({ "receiver_id": user_id })),
            order: Some(serde_json::json!({ "created_at": "desc" })),
            limit: Some(limit),
            offset: Some((page - 1) * limit),
        };
        let count_filter =
            FilterData::where_only(serde_json::json!({ "receiver_id": user_id }));

        let repo = self.repo();
        let items = repo.select_any(filter).await?;
        let total = repo.count(count_filter).await?;
        Ok((items, total))
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64, DatabaseError> {
        self.repo()
            .count(FilterData::where_only(serde_json::json!({
                "receiver_id": user_id,
                "is_read": false,
            })))
            .await
    }

    /// Mark one notification read; only the owner's rows are reachable.
    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<(), DatabaseError> {
        let updated =
            sqlx::query("UPDATE notifications SET is_read = true WHERE id = $1 AND receiver_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await?
                .rows_affected();

        if updated == 0 {
            return Err(DatabaseError::NotFound("Notification not found".to_string()));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, DatabaseError> {
        Ok(
            sqlx::query("UPDATE notifications SET is_read = true WHERE receiver_id = $1 AND is_read = false")
                .bind(user_id)
                .execute(&self.pool)
                .await?
                .rows_affected(),
        )
    }

    /// Retention sweep for old read notifications, used by the cleanup job.
    pub async fn purge_read_older_than_days(&self, days: i64) -> Result<u64, DatabaseError> {
        Ok(sqlx::query(
            "DELETE FROM notifications WHERE is_read = true AND created_at < now() - ($1 || ' days')::interval",
        )
        .bind(days.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected())
    }
}
