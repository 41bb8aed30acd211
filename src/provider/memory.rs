//! In-memory message provider
//!
//! Single-process topic bus for testing and embedded use. Messages are
//! fanned out to every live subscription whose subject pattern matches;
//! there is no persistence and no delivery across process boundaries.

use crate::error::Result;
use crate::provider::{MessageProvider, Subscription};
use crate::types::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Configuration for the in-memory provider
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Per-subscription mailbox capacity
    ///
    /// When a subscriber's mailbox is full, new messages are dropped for
    /// that subscriber with a warning.
    pub max_pending: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { max_pending: 1024 }
    }
}

type SenderTable = Arc<RwLock<HashMap<String, Vec<(u64, mpsc::Sender<Message>)>>>>;

/// In-memory message provider
///
/// Subjects match exactly, or by prefix with a trailing `.>` wildcard
/// (`audit.>` matches `audit.query` and `audit.query.eu`).
pub struct MemoryProvider {
    config: MemoryConfig,
    senders: SenderTable,
    next_sub_id: AtomicU64,
}

impl MemoryProvider {
    /// Create a provider with the given configuration
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            senders: Arc::new(RwLock::new(HashMap::new())),
            next_sub_id: AtomicU64::new(0),
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

#[async_trait]
impl MessageProvider for MemoryProvider {
    async fn publish(&self, msg: Message) -> Result<()> {
        let mut senders = self.senders.write().await;
        let mut delivered = 0usize;

        for (pattern, subs) in senders.iter_mut() {
            if !subject_matches(pattern, &msg.subject) {
                continue;
            }

            subs.retain(|(id, tx)| match tx.try_send(msg.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        subject = %msg.subject,
                        subscription = id,
                        "Mailbox full, dropping message for subscriber"
                    );
                    true
                }
                // Receiver gone, prune the registration
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
        }

        tracing::debug!(
            msg_id = %msg.id,
            subject = %msg.subject,
            delivered,
            "Message published"
        );

        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<Box<dyn Subscription>> {
        let (tx, rx) = mpsc::channel(self.config.max_pending);
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut senders = self.senders.write().await;
            senders.entry(subject.to_string()).or_default().push((id, tx));
        }

        tracing::debug!(subject, subscription = id, "Subscription created");

        Ok(Box::new(MemorySubscription {
            id,
            subject: subject.to_string(),
            rx,
            senders: self.senders.clone(),
        }))
    }

    fn new_reply_subject(&self) -> String {
        format!("_reply.{}", uuid::Uuid::new_v4())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Subscription handle backed by an mpsc mailbox
pub struct MemorySubscription {
    id: u64,
    subject: String,
    rx: mpsc::Receiver<Message>,
    senders: SenderTable,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next(&mut self) -> Result<Option<Message>> {
        Ok(self.rx.recv().await)
    }

    async fn try_next(&mut self) -> Result<Option<Message>> {
        match self.rx.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Ok(None),
        }
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        let mut senders = self.senders.write().await;
        if let Some(subs) = senders.get_mut(&self.subject) {
            subs.retain(|(id, _)| *id != self.id);
            if subs.is_empty() {
                senders.remove(&self.subject);
            }
        }
        self.rx.close();

        tracing::debug!(subject = %self.subject, subscription = self.id, "Unsubscribed");
        Ok(())
    }
}

fn subject_matches(pattern: &str, subject: &str) -> bool {
    if pattern == ">" {
        return true;
    }
    match pattern.strip_suffix(".>") {
        Some(prefix) => subject
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.')),
        None => pattern == subject,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_matching() {
        assert!(subject_matches("audit.query", "audit.query"));
        assert!(!subject_matches("audit.query", "audit.query.eu"));
        assert!(subject_matches("audit.>", "audit.query"));
        assert!(subject_matches("audit.>", "audit.query.eu"));
        assert!(!subject_matches("audit.>", "audit"));
        assert!(!subject_matches("audit.>", "auditing.query"));
        assert!(subject_matches(">", "anything.at.all"));
    }

    #[tokio::test]
    async fn test_publish_subscribe_roundtrip() {
        let provider = MemoryProvider::default();
        let mut sub = provider.subscribe("audit.query").await.unwrap();

        let msg = Message::new("audit.query", "{}").with_reply_to("_reply.x");
        provider.publish(msg.clone()).await.unwrap();

        let received = sub.next().await.unwrap().unwrap();
        assert_eq!(received.id, msg.id);
        assert_eq!(received.reply_to.as_deref(), Some("_reply.x"));
    }

    #[tokio::test]
    async fn test_wildcard_subscription() {
        let provider = MemoryProvider::default();
        let mut sub = provider.subscribe("audit.>").await.unwrap();

        provider
            .publish(Message::new("audit.query.eu", "{}"))
            .await
            .unwrap();
        provider
            .publish(Message::new("billing.query", "{}"))
            .await
            .unwrap();

        let received = sub.next().await.unwrap().unwrap();
        assert_eq!(received.subject, "audit.query.eu");
        assert!(sub.try_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_try_next_before_and_after_delivery() {
        let provider = MemoryProvider::default();
        let mut sub = provider.subscribe("audit.query").await.unwrap();

        assert!(sub.try_next().await.unwrap().is_none());

        provider
            .publish(Message::new("audit.query", "{}"))
            .await
            .unwrap();

        assert!(sub.try_next().await.unwrap().is_some());
        assert!(sub.try_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let provider = MemoryProvider::default();
        let mut sub = provider.subscribe("audit.query").await.unwrap();

        sub.unsubscribe().await.unwrap();
        provider
            .publish(Message::new("audit.query", "{}"))
            .await
            .unwrap();

        assert!(sub.try_next().await.unwrap().is_none());
        assert!(sub.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned_on_publish() {
        let provider = MemoryProvider::default();
        let sub = provider.subscribe("audit.query").await.unwrap();
        drop(sub);

        provider
            .publish(Message::new("audit.query", "{}"))
            .await
            .unwrap();

        let senders = provider.senders.read().await;
        assert!(senders
            .get("audit.query")
            .map_or(true, |subs| subs.is_empty()));
    }

    #[tokio::test]
    async fn test_full_mailbox_drops_message() {
        let provider = MemoryProvider::new(MemoryConfig { max_pending: 2 });
        let mut sub = provider.subscribe("audit.query").await.unwrap();

        for _ in 0..5 {
            provider
                .publish(Message::new("audit.query", "{}"))
                .await
                .unwrap();
        }

        let mut received = 0;
        while sub.try_next().await.unwrap().is_some() {
            received += 1;
        }
        assert_eq!(received, 2);
    }

    #[tokio::test]
    async fn test_independent_subscriptions_each_receive() {
        let provider = MemoryProvider::default();
        let mut a = provider.subscribe("audit.query").await.unwrap();
        let mut b = provider.subscribe("audit.query").await.unwrap();

        provider
            .publish(Message::new("audit.query", "{}"))
            .await
            .unwrap();

        assert!(a.next().await.unwrap().is_some());
        assert!(b.next().await.unwrap().is_some());
    }

    #[test]
    fn test_reply_subjects_are_unique() {
        let provider = MemoryProvider::default();
        let a = provider.new_reply_subject();
        let b = provider.new_reply_subject();

        assert!(a.starts_with("_reply."));
        assert_ne!(a, b);
    }
}
