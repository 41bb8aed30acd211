//! Audit query requester
//!
//! Issues a query by publishing a filter to the shared query subject with a
//! fresh, single-use reply channel, then collects the answer in one of
//! three modes: blocking with timeout, non-blocking poll, or async
//! callback.

use crate::error::{AuditError, Result};
use crate::provider::{MessageProvider, Subscription};
use crate::types::{AuditQueryFilter, AuditRecord, Message, QueryResult, QUERY_SUBJECT};
use std::sync::Arc;
use std::time::Duration;

/// Client side of the audit query protocol
///
/// Each call allocates its own reply channel; concurrent requests share
/// nothing but the provider, so replies can never cross between them.
pub struct AuditQueryClient {
    provider: Arc<dyn MessageProvider>,
    subject: String,
}

impl AuditQueryClient {
    /// Create a client publishing to the default query subject
    pub fn new(provider: Arc<dyn MessageProvider>) -> Self {
        Self::with_subject(provider, QUERY_SUBJECT)
    }

    /// Create a client publishing to a custom query subject
    pub fn with_subject(provider: Arc<dyn MessageProvider>, subject: impl Into<String>) -> Self {
        Self {
            provider,
            subject: subject.into(),
        }
    }

    /// Query and block the calling task until a reply arrives or `timeout`
    /// elapses
    ///
    /// A timeout is not an error: the result is simply empty. Transport
    /// failures (subscribe, publish, malformed reply) surface as `Err`.
    pub async fn query(
        &self,
        filter: &AuditQueryFilter,
        timeout: Duration,
    ) -> Result<Vec<AuditRecord>> {
        let mut pending = self.send(filter).await?;

        let outcome = tokio::time::timeout(timeout, pending.sub.next()).await;
        let result = match outcome {
            Err(_elapsed) => {
                pending.transition(QueryState::TimedOut);
                Ok(Vec::new())
            }
            Ok(received) => pending.settle(received),
        };

        pending.dispose().await;
        result
    }

    /// Query and immediately poll for an already-available reply
    ///
    /// Returns an empty collection when no reply has arrived yet.
    pub async fn query_nowait(&self, filter: &AuditQueryFilter) -> Result<Vec<AuditRecord>> {
        let mut pending = self.send(filter).await?;

        let received = pending.sub.try_next().await;
        let result = match received {
            Ok(None) => {
                // Nothing buffered yet; give up on this request entirely
                pending.transition(QueryState::TimedOut);
                Ok(Vec::new())
            }
            other => pending.settle(other),
        };

        pending.dispose().await;
        result
    }

    /// Query and deliver the outcome through a callback
    ///
    /// The callback runs on a background task and is invoked exactly once:
    /// `Ok(records)` when a reply arrives (an empty result is `Ok`),
    /// `Err(..)` when the reply channel fails or the reply is malformed.
    /// Failures during publish or listener registration are returned
    /// directly and the callback is never invoked. There is no timeout;
    /// the listener stays registered until first delivery, then the reply
    /// channel is torn down.
    pub async fn query_async<F>(&self, filter: &AuditQueryFilter, callback: F) -> Result<()>
    where
        F: FnOnce(Result<Vec<AuditRecord>>) + Send + 'static,
    {
        let mut pending = self.send(filter).await?;

        tokio::spawn(async move {
            let received = pending.sub.next().await;
            let outcome = pending.settle(received);
            pending.dispose().await;
            callback(outcome);
        });

        Ok(())
    }

    /// Publish a filter with a fresh reply channel
    ///
    /// Subscribes before publishing so a fast responder cannot win the
    /// race against listener registration.
    async fn send(&self, filter: &AuditQueryFilter) -> Result<PendingQuery> {
        let reply_subject = self.provider.new_reply_subject();
        let sub = self.provider.subscribe(&reply_subject).await?;

        let payload = serde_json::to_vec(filter)?;
        let msg = Message::new(&self.subject, payload).with_reply_to(&reply_subject);

        let mut pending = PendingQuery {
            request_id: msg.id.clone(),
            reply_subject,
            sub,
            state: QueryState::Created,
        };

        match self.provider.publish(msg).await {
            Ok(()) => {
                pending.transition(QueryState::Sent);
                Ok(pending)
            }
            Err(e) => {
                pending.transition(QueryState::Failed);
                pending.dispose().await;
                Err(e)
            }
        }
    }
}

/// Per-request lifecycle
///
/// CREATED moves to SENT on publish; SENT ends in exactly one of
/// FULFILLED, TIMED_OUT, or FAILED. No retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryState {
    Created,
    Sent,
    Fulfilled,
    TimedOut,
    Failed,
}

/// One in-flight request and its single-use reply channel
struct PendingQuery {
    request_id: String,
    reply_subject: String,
    sub: Box<dyn Subscription>,
    state: QueryState,
}

impl PendingQuery {
    fn transition(&mut self, next: QueryState) {
        tracing::debug!(
            request_id = %self.request_id,
            from = ?self.state,
            to = ?next,
            "Query state"
        );
        self.state = next;
    }

    /// Resolve a delivery outcome into records, updating the state machine
    fn settle(&mut self, received: Result<Option<Message>>) -> Result<Vec<AuditRecord>> {
        let outcome = match received {
            Ok(Some(reply)) => self.decode(&reply),
            Ok(None) => Err(AuditError::Subscribe {
                subject: self.reply_subject.clone(),
                reason: "reply channel closed before delivery".to_string(),
            }),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(records) => {
                self.transition(QueryState::Fulfilled);
                Ok(records)
            }
            Err(e) => {
                self.transition(QueryState::Failed);
                Err(e)
            }
        }
    }

    /// Decode a reply, verifying the correlation id when present
    fn decode(&self, reply: &Message) -> Result<Vec<AuditRecord>> {
        if let Some(ref correlation_id) = reply.correlation_id {
            if correlation_id != &self.request_id {
                return Err(AuditError::Subscribe {
                    subject: self.reply_subject.clone(),
                    reason: format!(
                        "correlation mismatch: expected {}, got {}",
                        self.request_id, correlation_id
                    ),
                });
            }
        }

        let result: QueryResult = serde_json::from_slice(&reply.payload)?;
        Ok(result.records)
    }

    /// Tear down the reply channel; it is never reused
    async fn dispose(&mut self) {
        if let Err(e) = self.sub.unsubscribe().await {
            tracing::warn!(
                subject = %self.reply_subject,
                error = %e,
                "Failed to dispose reply channel"
            );
        }
    }
}
