//! Audit query responder
//!
//! Listens on the well-known query subject and answers each filter message
//! with the matching records, published to the request's reply channel.

use crate::error::{AuditError, Result};
use crate::provider::MessageProvider;
use crate::store::AuditStore;
use crate::types::{AuditQueryFilter, Message, QueryResult, QUERY_SUBJECT};
use std::sync::Arc;

/// Query-side service: consumes filters, replies with results
///
/// Every well-formed request produces exactly one reply, tagged with a
/// correlation id equal to the request message's id. Failures never
/// propagate out of the serve loop: a request that cannot be answered is
/// logged and dropped, and the requester observes a timeout.
pub struct AuditQueryResponder<S> {
    provider: Arc<dyn MessageProvider>,
    store: Arc<S>,
    subject: String,
}

impl<S: AuditStore + 'static> AuditQueryResponder<S> {
    /// Create a responder on the default query subject
    pub fn new(provider: Arc<dyn MessageProvider>, store: Arc<S>) -> Self {
        Self::with_subject(provider, store, QUERY_SUBJECT)
    }

    /// Create a responder on a custom query subject
    pub fn with_subject(
        provider: Arc<dyn MessageProvider>,
        store: Arc<S>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            store,
            subject: subject.into(),
        }
    }

    /// Subscribe and answer queries until the subscription closes
    ///
    /// Each message is handled on its own task, so a slow search never
    /// blocks delivery of the next request.
    pub async fn serve(self) -> Result<()> {
        let mut sub = self.provider.subscribe(&self.subject).await?;

        tracing::info!(
            subject = %self.subject,
            provider = self.provider.name(),
            "Audit query responder listening"
        );

        while let Some(msg) = sub.next().await? {
            let provider = self.provider.clone();
            let store = self.store.clone();

            tokio::spawn(async move {
                let request_id = msg.id.clone();
                if let Err(e) = handle_query(provider, store, msg).await {
                    tracing::warn!(
                        request_id = %request_id,
                        error = %e,
                        "Query handling failed, no reply sent"
                    );
                }
            });
        }

        tracing::info!(subject = %self.subject, "Audit query responder stopped");
        Ok(())
    }

    /// Run the serve loop on a background task
    pub fn spawn(self) -> ResponderHandle {
        ResponderHandle {
            task: tokio::spawn(self.serve()),
        }
    }
}

/// Handle to a background responder task
pub struct ResponderHandle {
    task: tokio::task::JoinHandle<Result<()>>,
}

impl ResponderHandle {
    /// Stop the responder
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Whether the serve loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the serve loop to exit
    ///
    /// An aborted responder joins cleanly.
    pub async fn join(self) -> Result<()> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(AuditError::Provider(format!(
                "responder task failed: {}",
                e
            ))),
        }
    }
}

async fn handle_query<S: AuditStore>(
    provider: Arc<dyn MessageProvider>,
    store: Arc<S>,
    msg: Message,
) -> Result<()> {
    let reply_to = match msg.reply_to {
        Some(ref reply_to) => reply_to.clone(),
        None => {
            // Nowhere to answer; contained, not an error of the loop
            tracing::warn!(request_id = %msg.id, "Query message carries no reply channel");
            return Ok(());
        }
    };

    let filter: AuditQueryFilter = serde_json::from_slice(&msg.payload)?;
    let records = store.find_matching(&filter).await?;
    let count = records.len();

    let payload = serde_json::to_vec(&QueryResult::new(records))?;
    let reply = Message::new(reply_to, payload).with_correlation_id(msg.id.clone());

    provider.publish(reply).await?;

    tracing::debug!(request_id = %msg.id, records = count, "Query answered");
    Ok(())
}
