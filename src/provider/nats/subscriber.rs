//! NATS subscription handle

use super::client::{HEADER_CORRELATION_ID, HEADER_MESSAGE_ID};
use super::config::NatsConfig;
use crate::error::{AuditError, Result};
use crate::provider::Subscription;
use crate::types::Message;
use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;

/// Subscription handle over a core NATS subscriber
pub struct NatsSubscription {
    subscriber: async_nats::Subscriber,
    subject: String,
    config: Arc<NatsConfig>,
}

impl NatsSubscription {
    pub(crate) fn new(
        subscriber: async_nats::Subscriber,
        subject: String,
        config: Arc<NatsConfig>,
    ) -> Self {
        Self {
            subscriber,
            subject,
            config,
        }
    }
}

#[async_trait]
impl Subscription for NatsSubscription {
    async fn next(&mut self) -> Result<Option<Message>> {
        Ok(self
            .subscriber
            .next()
            .await
            .map(|m| to_message(m, &self.config)))
    }

    async fn try_next(&mut self) -> Result<Option<Message>> {
        match self.subscriber.next().now_or_never() {
            Some(Some(m)) => Ok(Some(to_message(m, &self.config))),
            // Stream ended or nothing buffered yet
            Some(None) | None => Ok(None),
        }
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        self.subscriber
            .unsubscribe()
            .await
            .map_err(|e| AuditError::Subscribe {
                subject: self.subject.clone(),
                reason: format!("unsubscribe failed: {}", e),
            })?;

        tracing::debug!(subject = %self.subject, "Unsubscribed");
        Ok(())
    }
}

/// Map a wire message back onto the provider-agnostic envelope
///
/// Subjects come back with the configured prefix stripped so the rest of
/// the crate only ever sees unprefixed addresses.
fn to_message(m: async_nats::Message, config: &NatsConfig) -> Message {
    let (id, correlation_id) = match m.headers {
        Some(ref headers) => (
            headers
                .get(HEADER_MESSAGE_ID)
                .map(|v| v.as_str().to_string()),
            headers
                .get(HEADER_CORRELATION_ID)
                .map(|v| v.as_str().to_string()),
        ),
        None => (None, None),
    };

    Message {
        // Foreign publishers may not set our id header
        id: id.unwrap_or_else(|| format!("msg-{}", uuid::Uuid::new_v4())),
        subject: strip_prefix(config, &m.subject),
        reply_to: m.reply.as_ref().map(|r| strip_prefix(config, r)),
        correlation_id,
        payload: m.payload,
    }
}

fn strip_prefix(config: &NatsConfig, subject: &str) -> String {
    if config.subject_prefix.is_empty() {
        return subject.to_string();
    }
    subject
        .strip_prefix(&format!("{}.", config.subject_prefix))
        .unwrap_or(subject)
        .to_string()
}
