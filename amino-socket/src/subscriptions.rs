//! Subscription registry.
//!
//! Tracks which (community, topic) pairs the client is subscribed to. The
//! registry is the source of truth replayed into every new connection; a
//! subscription is only removed by an explicit unsubscribe or shutdown,
//! never by a reconnect. Mutations arrive from application calls and from
//! replay, so the set is serialized behind a mutex.

use std::collections::HashSet;

use tokio::sync::Mutex;
use tracing::debug;

/// A live-layer topic subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subscription {
    /// Community the topic lives in (0 = global scope).
    pub community_id: u64,
    /// Topic name within the community.
    pub topic: String,
}

impl Subscription {
    /// Build a subscription.
    pub fn new(community_id: u64, topic: &str) -> Self {
        Self {
            community_id,
            topic: topic.to_string(),
        }
    }
}

/// Task-safe set of active subscriptions.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    set: Mutex<HashSet<Subscription>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription. Returns false if it was already present
    /// (subscribing twice is a no-op).
    pub async fn subscribe(&self, community_id: u64, topic: &str) -> bool {
        let added = self
            .set
            .lock()
            .await
            .insert(Subscription::new(community_id, topic));
        if added {
            debug!("subscribed to {topic} in community {community_id}");
        }
        added
    }

    /// Remove a subscription. Returns false if it was not present.
    pub async fn unsubscribe(&self, community_id: u64, topic: &str) -> bool {
        let removed = self
            .set
            .lock()
            .await
            .remove(&Subscription::new(community_id, topic));
        if removed {
            debug!("unsubscribed from {topic} in community {community_id}");
        }
        removed
    }

    /// Whether a subscription is active.
    pub async fn contains(&self, community_id: u64, topic: &str) -> bool {
        self.set
            .lock()
            .await
            .contains(&Subscription::new(community_id, topic))
    }

    /// Snapshot of the current set for replay, in a stable order.
    pub async fn snapshot(&self) -> Vec<Subscription> {
        let mut subs: Vec<_> = self.set.lock().await.iter().cloned().collect();
        subs.sort();
        subs
    }

    /// Number of active subscriptions.
    pub async fn len(&self) -> usize {
        self.set.lock().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.set.lock().await.is_empty()
    }

    /// Drop every subscription (client shutdown).
    pub async fn clear(&self) {
        self.set.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_idempotent() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.subscribe(1, "online-members").await);
        assert!(!registry.subscribe(1, "online-members").await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe(1, "online-members").await;
        assert!(registry.unsubscribe(1, "online-members").await);
        assert!(!registry.unsubscribe(1, "online-members").await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_matches_call_history() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe(2, "users-start-typing-at").await;
        registry.subscribe(1, "online-members").await;
        registry.subscribe(2, "users-start-typing-at").await;
        registry.subscribe(1, "users-end-typing-at").await;
        registry.unsubscribe(1, "users-end-typing-at").await;

        let snapshot = registry.snapshot().await;
        assert_eq!(
            snapshot,
            vec![
                Subscription::new(1, "online-members"),
                Subscription::new(2, "users-start-typing-at"),
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_mutation() {
        let registry = std::sync::Arc::new(SubscriptionRegistry::new());
        let mut handles = Vec::new();
        for i in 0..16u64 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.subscribe(i % 4, "topic").await;
                registry.subscribe(i % 4, "other").await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(registry.len().await, 8);
    }

    #[tokio::test]
    async fn test_clear() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe(1, "a").await;
        registry.subscribe(2, "b").await;
        registry.clear().await;
        assert!(registry.is_empty().await);
    }
}
