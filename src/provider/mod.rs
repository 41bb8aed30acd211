//! Message provider trait — the core abstraction for messaging backends
//!
//! All messaging backends (NATS, in-memory, etc.) implement
//! `MessageProvider` to provide a uniform API for publish, subscribe, and
//! temporary reply-channel allocation.

use crate::error::Result;
use crate::types::Message;
use async_trait::async_trait;

pub mod memory;
pub mod nats;

/// Core trait for messaging backends
///
/// Implementations handle the transport-specific details of publishing and
/// subscribing. The requester and responder perform all messaging through a
/// provider.
#[async_trait]
pub trait MessageProvider: Send + Sync {
    /// Publish a message to its subject
    async fn publish(&self, msg: Message) -> Result<()>;

    /// Subscribe to a subject
    ///
    /// Returns a `Subscription` handle for receiving messages.
    async fn subscribe(&self, subject: &str) -> Result<Box<dyn Subscription>>;

    /// Allocate a unique subject for a temporary reply channel
    ///
    /// Each request subscribes to a fresh reply subject; the address is
    /// never reused.
    fn new_reply_subject(&self) -> String;

    /// Provider name (e.g., "nats", "memory")
    fn name(&self) -> &str;

    /// Health check — returns true if the provider is operational
    ///
    /// Default implementation reports healthy; providers with a real
    /// connection should override.
    async fn health(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Async subscription handle for receiving messages
///
/// Provider-agnostic interface for consuming messages from any backend.
/// Reply-channel subscriptions are single-use: unsubscribe after the first
/// delivery.
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Await the next message
    ///
    /// Returns `Ok(None)` once the channel is closed.
    async fn next(&mut self) -> Result<Option<Message>>;

    /// Poll for an already-delivered message without waiting
    ///
    /// Returns `Ok(None)` when nothing is buffered yet.
    async fn try_next(&mut self) -> Result<Option<Message>>;

    /// Tear the subscription down
    ///
    /// Buffered messages are discarded and no further deliveries occur.
    async fn unsubscribe(&mut self) -> Result<()>;
}
