//! Live-connection registry for notification push.
//!
//! Holds at most one active channel per user. Delivery through here is an
//! optimization only: the durable notification row is always written first,
//! and a failed push never fails the caller.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config;
use crate::database::models::NotificationTarget;

/// Payload delivered over a live connection; mirrors the persisted row.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub content: String,
    pub target_type: NotificationTarget,
    pub target_id: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub struct NotificationRegistry {
    channels: DashMap<Uuid, mpsc::Sender<NotificationEvent>>,
}

impl NotificationRegistry {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Open a live channel for `user_id`.
    ///
    /// A user holds at most one connection: registering while one is active
    /// drops the stale sender, which ends the old receiver's stream and
    /// prevents duplicate delivery.
    pub fn register(&self, user_id: Uuid) -> mpsc::Receiver<NotificationEvent> {
        let (tx, rx) = mpsc::channel(config::config().notify.channel_capacity);
        if self.channels.insert(user_id, tx).is_some() {
            tracing::debug!("replaced stale live connection for user {}", user_id);
        }
        rx
    }

    /// Drop the user's channel if its receiver is gone. Called when the
    /// connection is confirmed closed; the closed-check keeps a teardown of
    /// an old connection from evicting a newer one.
    pub fn unregister(&self, user_id: Uuid) {
        self.channels.remove_if(&user_id, |_, tx| tx.is_closed());
    }

    /// Best-effort delivery. Returns whether the event reached a live
    /// channel; a dead channel is evicted on the way out.
    pub fn push(&self, user_id: Uuid, event: NotificationEvent) -> bool {
        // Clone the sender out of the map guard before sending; holding the
        // shard guard across a removal would deadlock.
        let tx = match self.channels.get(&user_id) {
            Some(entry) => entry.value().clone(),
            None => return false,
        };

        match tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.channels.remove_if(&user_id, |_, tx| tx.is_closed());
                false
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Receiver alive but not draining; drop the event, keep the channel
                tracing::debug!("live channel full for user {}, dropping event", user_id);
                false
            }
        }
    }

    pub fn is_connected(&self, user_id: Uuid) -> bool {
        self.channels
            .get(&user_id)
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    pub fn connection_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for NotificationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static REGISTRY: Lazy<NotificationRegistry> = Lazy::new(NotificationRegistry::new);

pub fn registry() -> &'static NotificationRegistry {
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NotificationTarget;

    fn event(content: &str) -> NotificationEvent {
        NotificationEvent {
            id: Uuid::new_v4(),
            content: content.to_string(),
            target_type: NotificationTarget::System,
            target_id: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn push_reaches_registered_receiver() {
        let registry = NotificationRegistry::new();
        let user = Uuid::new_v4();
        let mut rx = registry.register(user);

        assert!(registry.push(user, event("hello")));
        assert_eq!(rx.recv().await.unwrap().content, "hello");
    }

    #[tokio::test]
    async fn push_to_offline_user_is_inert() {
        let registry = NotificationRegistry::new();
        assert!(!registry.push(Uuid::new_v4(), event("nobody home")));
    }

    #[tokio::test]
    async fn second_registration_closes_the_stale_connection() {
        let registry = NotificationRegistry::new();
        let user = Uuid::new_v4();

        let mut first = registry.register(user);
        let mut second = registry.register(user);

        // The stale receiver's sender was dropped: its stream ends
        assert!(first.recv().await.is_none());

        assert!(registry.push(user, event("to the new connection")));
        assert_eq!(second.recv().await.unwrap().content, "to the new connection");
        assert_eq!(registry.connection_count(), 1);
    }

    #[tokio::test]
    async fn failed_send_evicts_the_dead_channel() {
        let registry = NotificationRegistry::new();
        let user = Uuid::new_v4();

        let rx = registry.register(user);
        drop(rx);

        assert!(!registry.push(user, event("gone")));
        assert_eq!(registry.connection_count(), 0);
        assert!(!registry.is_connected(user));
    }

    #[tokio::test]
    async fn unregister_spares_a_newer_connection() {
        let registry = NotificationRegistry::new();
        let user = Uuid::new_v4();

        let old = registry.register(user);
        drop(old);
        let _fresh = registry.register(user);

        // Teardown of the old connection must not evict the fresh one
        registry.unregister(user);
        assert!(registry.is_connected(user));
    }
}
