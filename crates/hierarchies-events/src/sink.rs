//! Audit sinks
//!
//! Audit delivery is best-effort: callers log and drop sink errors rather than
//! failing the command that produced the event.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::info;

use crate::types::AuditEvent;

/// Audit sink error types.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Failed to deliver event
    #[error("Failed to deliver audit event: {0}")]
    DeliveryError(String),

    /// Channel closed
    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;

/// Destination for audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record an event.
    async fn log_event(&self, event: AuditEvent) -> AuditResult<()>;
}

/// Subscription handle for receiving audit events.
///
/// Dropping the handle ends the subscription.
pub struct AuditSubscription {
    /// Topic pattern
    pub topic: String,
    /// Event receiver
    pub receiver: broadcast::Receiver<AuditEvent>,
}

impl AuditSubscription {
    /// Receive the next event.
    pub async fn recv(&mut self) -> AuditResult<AuditEvent> {
        self.receiver
            .recv()
            .await
            .map_err(|_| AuditError::ChannelClosed)
    }
}

/// Audit bus statistics.
#[derive(Debug, Clone, Default)]
pub struct AuditStats {
    /// Total events published
    pub events_published: u64,
    /// Events delivered to at least one subscriber
    pub events_delivered: u64,
    /// Live subscription handles
    pub active_subscriptions: usize,
}

/// In-memory audit bus.
///
/// Fans events out to subscribers whose topic pattern matches
/// `{tenant}.{event_type}`. Events with no subscriber are dropped.
pub struct MemoryAuditBus {
    /// Topic subscribers
    subscribers: Arc<RwLock<HashMap<String, broadcast::Sender<AuditEvent>>>>,
    /// Statistics
    stats: Arc<RwLock<AuditStats>>,
    /// Channel capacity
    channel_capacity: usize,
}

impl std::fmt::Debug for MemoryAuditBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAuditBus")
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl MemoryAuditBus {
    /// Create a new in-memory audit bus.
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create with custom channel capacity. A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(AuditStats::default())),
            channel_capacity: capacity.max(1),
        }
    }

    /// Subscribe to a topic pattern.
    ///
    /// Patterns support wildcards:
    /// - `*` matches any single segment
    /// - `#` matches zero or more segments
    ///
    /// Examples:
    /// - `42.tier.*` matches tier changes of tenant 42
    /// - `*.transition.#` matches transition outcomes of every tenant
    pub async fn subscribe(&self, topic: &str) -> AuditSubscription {
        let receiver = {
            let mut subscribers = self.subscribers.write().await;
            subscribers.retain(|_, sender| sender.receiver_count() > 0);
            match subscribers.get(topic) {
                Some(sender) => sender.subscribe(),
                None => {
                    let (sender, receiver) = broadcast::channel(self.channel_capacity);
                    subscribers.insert(topic.to_string(), sender);
                    receiver
                }
            }
        };

        AuditSubscription {
            topic: topic.to_string(),
            receiver,
        }
    }

    /// Get bus statistics.
    pub async fn stats(&self) -> AuditStats {
        let active_subscriptions = self
            .subscribers
            .read()
            .await
            .values()
            .map(|sender| sender.receiver_count())
            .sum();
        AuditStats {
            active_subscriptions,
            ..self.stats.read().await.clone()
        }
    }

    /// Check if a topic matches a pattern.
    fn topic_matches(pattern: &str, topic: &str) -> bool {
        let pattern_parts: Vec<&str> = pattern.split('.').collect();
        let topic_parts: Vec<&str> = topic.split('.').collect();
        Self::segments_match(&pattern_parts, &topic_parts)
    }

    fn segments_match(pattern: &[&str], topic: &[&str]) -> bool {
        match (pattern.first(), topic.first()) {
            (None, None) => true,
            (Some(&"#"), _) => {
                // Zero segments, or consume one and stay on `#`
                Self::segments_match(&pattern[1..], topic)
                    || (!topic.is_empty() && Self::segments_match(pattern, &topic[1..]))
            }
            (Some(&"*"), Some(_)) => Self::segments_match(&pattern[1..], &topic[1..]),
            (Some(segment), Some(part)) if segment == part => {
                Self::segments_match(&pattern[1..], &topic[1..])
            }
            _ => false,
        }
    }
}

impl Default for MemoryAuditBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditBus {
    async fn log_event(&self, event: AuditEvent) -> AuditResult<()> {
        let topic = event.topic();
        let mut delivered = false;
        let mut abandoned = false;

        {
            let subscribers = self.subscribers.read().await;
            for (pattern, sender) in subscribers.iter() {
                if sender.receiver_count() == 0 {
                    abandoned = true;
                } else if Self::topic_matches(pattern, &topic)
                    && sender.send(event.clone()).is_ok()
                {
                    delivered = true;
                }
            }
        }

        if abandoned {
            self.subscribers
                .write()
                .await
                .retain(|_, sender| sender.receiver_count() > 0);
        }

        let mut stats = self.stats.write().await;
        stats.events_published += 1;
        if delivered {
            stats.events_delivered += 1;
        }
        Ok(())
    }
}

/// Audit sink that writes events to the `tracing` pipeline.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn log_event(&self, event: AuditEvent) -> AuditResult<()> {
        info!(
            target: "hierarchies::audit",
            tenant = %event.tenant,
            event_type = %event.event_type,
            actor = ?event.actor.map(|a| a.get()),
            channel = ?event.channel.map(|c| c.get()),
            "{}",
            event.message
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HierarchyEvent;
    use hierarchies_core::{RoleId, TenantId, UserId};
    use std::time::Duration;

    fn removed(tenant: u64) -> AuditEvent {
        HierarchyEvent::TierRemoved {
            hierarchy: "Guild".to_string(),
            role: RoleId(101),
        }
        .to_event(TenantId(tenant), UserId(1))
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = MemoryAuditBus::new();
        let mut sub = bus.subscribe("7.tier.*").await;

        bus.log_event(removed(7)).await.unwrap();

        let received = tokio::time::timeout(Duration::from_millis(100), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_type, "tier.removed");
        assert_eq!(received.tenant, TenantId(7));
    }

    #[tokio::test]
    async fn test_other_tenants_not_delivered() {
        let bus = MemoryAuditBus::new();
        let mut sub = bus.subscribe("7.#").await;

        bus.log_event(removed(8)).await.unwrap();

        let received = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await;
        assert!(received.is_err());
    }

    #[test]
    fn test_topic_matching() {
        assert!(MemoryAuditBus::topic_matches("7.tier.added", "7.tier.added"));
        assert!(MemoryAuditBus::topic_matches("7.tier.*", "7.tier.added"));
        assert!(MemoryAuditBus::topic_matches("*.tier.added", "7.tier.added"));
        assert!(MemoryAuditBus::topic_matches("7.#", "7.tier.added"));
        assert!(MemoryAuditBus::topic_matches("#", "7.tier.added"));
        assert!(MemoryAuditBus::topic_matches("*.#.added", "7.tier.added"));
        assert!(MemoryAuditBus::topic_matches("7.tier.added.#", "7.tier.added"));

        assert!(!MemoryAuditBus::topic_matches("7.tier.removed", "7.tier.added"));
        assert!(!MemoryAuditBus::topic_matches("8.*.*", "7.tier.added"));
        assert!(!MemoryAuditBus::topic_matches("7.*", "7.tier.added"));
    }

    #[tokio::test]
    async fn test_stats() {
        let bus = MemoryAuditBus::new();
        assert_eq!(bus.stats().await.events_published, 0);

        let _sub = bus.subscribe("*.tier.*").await;
        bus.log_event(removed(1)).await.unwrap();
        bus.log_event(
            HierarchyEvent::LockCleared { was_locked: true }.to_event(TenantId(1), UserId(1)),
        )
        .await
        .unwrap();

        let stats = bus.stats().await;
        assert_eq!(stats.active_subscriptions, 1);
        assert_eq!(stats.events_published, 2);
        assert_eq!(stats.events_delivered, 1);
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let bus = MemoryAuditBus::new();
        let first = bus.subscribe("7.#").await;
        let second = bus.subscribe("7.#").await;
        let _other = bus.subscribe("8.#").await;
        assert_eq!(bus.stats().await.active_subscriptions, 3);

        drop(first);
        assert_eq!(bus.stats().await.active_subscriptions, 2);

        drop(second);
        bus.log_event(removed(7)).await.unwrap();

        let stats = bus.stats().await;
        assert_eq!(stats.active_subscriptions, 1);
        assert_eq!(stats.events_delivered, 0);
        assert!(!bus.subscribers.read().await.contains_key("7.#"));
    }

    #[tokio::test]
    async fn test_zero_capacity_is_raised() {
        let bus = MemoryAuditBus::with_capacity(0);
        let mut sub = bus.subscribe("#").await;

        bus.log_event(removed(1)).await.unwrap();
        let received = tokio::time::timeout(Duration::from_millis(100), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_type, "tier.removed");
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_events() {
        let sink = TracingAuditSink;
        assert!(sink.log_event(removed(1)).await.is_ok());
    }
}
