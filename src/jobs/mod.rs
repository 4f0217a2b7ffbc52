//! In-process scheduled jobs.
//!
//! These run with no tenant context on purpose: seeding operates across all
//! companies at once through the data access layer's unscoped path. Failures
//! are logged and the loop continues; a scheduler must never take the
//! process down.

use chrono::{Datelike, TimeZone, Utc};

use crate::services::budget_service::BudgetService;
use crate::services::notification_service::NotificationService;

const NOTIFICATION_RETENTION_DAYS: i64 = 90;

/// Seed the current month at startup (covers restarts that missed the
/// boundary), then once at every month boundary.
pub fn spawn_monthly_budget_seeder() {
    tokio::spawn(async {
        seed_now().await;

        loop {
            let sleep_for = until_next_month_boundary();
            tokio::time::sleep(sleep_for).await;
            seed_now().await;
            cleanup_notifications().await;
        }
    });
}

async fn seed_now() {
    let now = Utc::now();
    let (year, month) = (now.year(), now.month() as i32);

    match BudgetService::new().await {
        Ok(budgets) => match budgets.seed_monthly(year, month).await {
            Ok(seeded) => {
                tracing::info!("budget seeding {}-{:02}: {} companies seeded", year, month, seeded)
            }
            Err(e) => tracing::error!("budget seeding {}-{:02} failed: {}", year, month, e),
        },
        Err(e) => tracing::error!("budget seeder could not reach database: {}", e),
    }
}

async fn cleanup_notifications() {
    match NotificationService::new().await {
        Ok(notifications) => {
            match notifications
                .purge_read_older_than_days(NOTIFICATION_RETENTION_DAYS)
                .await
            {
                Ok(purged) => tracing::info!("notification cleanup: {} rows purged", purged),
                Err(e) => tracing::error!("notification cleanup failed: {}", e),
            }
        }
        Err(e) => tracing::error!("notification cleanup could not reach database: {}", e),
    }
}

/// Duration until shortly after the next month starts. The few-minutes
/// offset keeps the job clear of midnight bursts from other systems.
fn until_next_month_boundary() -> std::time::Duration {
    let now = Utc::now();
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let next = Utc
        .with_ymd_and_hms(year, month, 1, 0, 5, 0)
        .single()
        .unwrap_or(now);

    (next - now)
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_sleep_is_positive_and_bounded() {
        let d = until_next_month_boundary();
        assert!(d > std::time::Duration::ZERO);
        // Never more than ~32 days
        assert!(d < std::time::Duration::from_secs(32 * 24 * 3600));
    }
}
