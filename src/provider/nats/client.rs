//! NATS client — connect, publish, subscribe, inbox allocation
//!
//! Uses core NATS pub/sub rather than JetStream: reply channels are
//! ephemeral and single-use, so no stream persistence is involved.

use super::config::NatsConfig;
use super::subscriber::NatsSubscription;
use crate::error::{AuditError, Result};
use crate::types::Message;
use std::sync::Arc;
use std::time::Duration;

/// Header carrying the publisher-assigned message id
pub(crate) const HEADER_MESSAGE_ID: &str = "Message-Id";

/// Header carrying the correlation id on replies
pub(crate) const HEADER_CORRELATION_ID: &str = "Correlation-Id";

/// Low-level NATS client
///
/// Manages the connection and maps the provider-agnostic `Message`
/// envelope onto NATS subjects, reply subjects, and headers.
pub struct NatsClient {
    client: async_nats::Client,
    config: Arc<NatsConfig>,
}

impl NatsClient {
    /// Connect to NATS
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        let connect_opts = build_connect_options(&config);

        let client = connect_opts
            .connect(&config.url)
            .await
            .map_err(|e| AuditError::Connection(format!("{}: {}", config.url, e)))?;

        tracing::info!(url = %config.url, "Connected to NATS");

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// Publish a message, mapping envelope fields to NATS headers
    pub async fn publish(&self, msg: Message) -> Result<()> {
        let subject = self.config.build_subject(&msg.subject);

        let mut headers = async_nats::HeaderMap::new();
        headers.insert(HEADER_MESSAGE_ID, msg.id.as_str());
        if let Some(ref correlation_id) = msg.correlation_id {
            headers.insert(HEADER_CORRELATION_ID, correlation_id.as_str());
        }

        let published = match msg.reply_to {
            Some(ref reply_to) => {
                self.client
                    .publish_with_reply_and_headers(
                        subject.clone(),
                        self.config.build_subject(reply_to),
                        headers,
                        msg.payload.clone(),
                    )
                    .await
            }
            None => {
                self.client
                    .publish_with_headers(subject.clone(), headers, msg.payload.clone())
                    .await
            }
        };

        published.map_err(|e| AuditError::Publish {
            subject: subject.clone(),
            reason: e.to_string(),
        })?;

        // Push buffered writes out so replies are not delayed
        self.client
            .flush()
            .await
            .map_err(|e| AuditError::Publish {
                subject: subject.clone(),
                reason: format!("flush failed: {}", e),
            })?;

        tracing::debug!(
            msg_id = %msg.id,
            subject = %subject,
            reply_to = ?msg.reply_to,
            "Message published"
        );

        Ok(())
    }

    /// Subscribe to a subject
    pub async fn subscribe(&self, subject: &str) -> Result<NatsSubscription> {
        let full_subject = self.config.build_subject(subject);

        let subscriber = self
            .client
            .subscribe(full_subject.clone())
            .await
            .map_err(|e| AuditError::Subscribe {
                subject: full_subject.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(subject = %full_subject, "Subscription created");

        Ok(NatsSubscription::new(subscriber, full_subject, self.config.clone()))
    }

    /// Allocate a unique inbox subject for a temporary reply channel
    pub fn new_inbox(&self) -> String {
        self.client.new_inbox()
    }

    /// Whether the connection is currently up
    pub fn is_connected(&self) -> bool {
        self.client.connection_state() == async_nats::connection::State::Connected
    }

    /// Get the underlying NATS client
    pub fn nats_client(&self) -> &async_nats::Client {
        &self.client
    }

    /// Get the configuration
    pub fn config(&self) -> &NatsConfig {
        &self.config
    }
}

/// Build NATS connect options from config
fn build_connect_options(config: &NatsConfig) -> async_nats::ConnectOptions {
    let mut opts = async_nats::ConnectOptions::new()
        .connection_timeout(Duration::from_secs(config.connect_timeout_secs))
        .request_timeout(Some(Duration::from_secs(config.request_timeout_secs)));

    if let Some(ref token) = config.token {
        opts = opts.token(token.clone());
    }

    opts
}
