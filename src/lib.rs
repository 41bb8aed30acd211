//! # audit-relay
//!
//! Asynchronous audit record query over pluggable request/reply messaging.
//!
//! ## Overview
//!
//! `audit-relay` retrieves audit records matching a filter from a remote
//! store without a direct synchronous call: a requester publishes the
//! filter to a shared subject with a fresh, single-use reply channel, and a
//! responder answers on that channel with the matching records. Swap
//! backends (NATS, in-memory) without changing application code.
//!
//! ## Quick Start
//!
//! ```rust
//! use audit_relay::{AuditQueryClient, AuditQueryFilter, MemoryProvider};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> audit_relay::Result<()> {
//! let provider = Arc::new(MemoryProvider::default());
//! let client = AuditQueryClient::new(provider);
//!
//! // Blocks up to one second; a timeout yields an empty result
//! let filter = AuditQueryFilter::new().with_module("login").with_initiator(5);
//! let records = client.query(&filter, Duration::from_secs(1)).await?;
//!
//! println!("{} matching records", records.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Providers
//!
//! - **memory** — In-process provider for testing and single-process use
//! - **nats** — Core NATS pub/sub with inbox-based reply channels
//!
//! ## Architecture
//!
//! - **MessageProvider** trait — transport abstraction all backends implement
//! - **AuditQueryClient** — blocking, non-blocking, and callback query modes
//! - **AuditQueryResponder** — answers filters from an `AuditStore`
//! - **AuditStore** trait — the record backend the responder searches

pub mod error;
pub mod provider;
pub mod requester;
pub mod responder;
pub mod store;
pub mod types;

// Re-export core types
pub use error::{AuditError, Result};
pub use provider::{MessageProvider, Subscription};
pub use requester::AuditQueryClient;
pub use responder::{AuditQueryResponder, ResponderHandle};
pub use store::{AuditStore, MemoryAuditStore};
pub use types::{
    AuditQueryFilter, AuditRecord, Change, Flow, Header, Message, QueryResult, SortField,
    QUERY_SUBJECT,
};

// Re-export providers for convenience
pub use provider::memory::{MemoryConfig, MemoryProvider};
pub use provider::nats::{NatsClient, NatsConfig, NatsProvider, NatsSubscription};
