//! NATS message provider
//!
//! Implements `MessageProvider` over core NATS pub/sub. Replies travel on
//! single-use inbox subjects, so no JetStream persistence is needed.

mod client;
mod config;
mod subscriber;

pub use client::NatsClient;
pub use config::NatsConfig;
pub use subscriber::NatsSubscription;

use crate::error::Result;
use crate::provider::{MessageProvider, Subscription};
use crate::types::Message;
use async_trait::async_trait;

/// NATS message provider
///
/// Wraps `NatsClient` and implements the `MessageProvider` trait.
pub struct NatsProvider {
    client: NatsClient,
}

impl NatsProvider {
    /// Connect to NATS
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        let client = NatsClient::connect(config).await?;
        Ok(Self { client })
    }

    /// Get the underlying NATS client for advanced usage
    pub fn client(&self) -> &NatsClient {
        &self.client
    }
}

#[async_trait]
impl MessageProvider for NatsProvider {
    async fn publish(&self, msg: Message) -> Result<()> {
        self.client.publish(msg).await
    }

    async fn subscribe(&self, subject: &str) -> Result<Box<dyn Subscription>> {
        let sub = self.client.subscribe(subject).await?;
        Ok(Box::new(sub))
    }

    fn new_reply_subject(&self) -> String {
        self.client.new_inbox()
    }

    fn name(&self) -> &str {
        "nats"
    }

    async fn health(&self) -> Result<bool> {
        Ok(self.client.is_connected())
    }
}
