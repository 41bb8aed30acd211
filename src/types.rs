//! Core types for the audit query protocol
//!
//! All types use camelCase JSON serialization for wire compatibility.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known subject the responder listens on for query requests
pub const QUERY_SUBJECT: &str = "audit.query";

/// One audited operation
///
/// Records are created by the auditing side, persisted by an
/// [`AuditStore`](crate::store::AuditStore), and returned as query results.
/// The identifier is assigned once at creation; `stored_at` is assigned
/// once, by the store, at persistence time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Unique record identifier (aud-<uuid>)
    pub id: String,

    /// Numeric id of the actor that triggered the operation
    pub initiator: i64,

    /// Module the operation belongs to (e.g., "login", "billing")
    pub module: String,

    /// Operation key within the module (e.g., "user.create")
    pub operation_key: String,

    /// Free-text description of the operation
    pub description: String,

    /// Correlation id of the originating request (UUID)
    pub request_id: String,

    /// UTC timestamp assigned by the store at persistence time
    ///
    /// `None` until the record has been saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<DateTime<Utc>>,

    /// Ordered execution traces recorded for this operation
    #[serde(default)]
    pub flows: Vec<Flow>,
}

impl AuditRecord {
    /// Create a new record with auto-generated id and request correlation id
    pub fn new(
        initiator: i64,
        module: impl Into<String>,
        operation_key: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("aud-{}", uuid::Uuid::new_v4()),
            initiator,
            module: module.into(),
            operation_key: operation_key.into(),
            description: description.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
            stored_at: None,
            flows: Vec::new(),
        }
    }

    /// Append an execution trace
    pub fn with_flow(mut self, flow: Flow) -> Self {
        self.flows.push(flow);
        self
    }
}

/// One execution trace within an audit record
///
/// Owned exclusively by its parent record; created and destroyed with it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    /// Error text, if this trace ended in a failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Key/value annotations captured along the trace
    #[serde(default)]
    pub headers: Vec<Header>,

    /// Value changes captured along the trace
    #[serde(default)]
    pub changes: Vec<Change>,
}

impl Flow {
    /// Create an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the error text
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Add a key/value annotation
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Add a recorded value change
    pub fn with_change(
        mut self,
        key: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        self.changes.push(Change {
            key: key.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
        });
        self
    }
}

/// Key/value annotation on a flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub key: String,
    pub value: String,
}

/// Recorded value change on a flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub key: String,
    pub old_value: String,
    pub new_value: String,
}

/// Sort order for query results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    /// Order by `stored_at`
    #[default]
    ByDate,
    /// Order by initiator id
    ByInitiator,
    /// Order by module name
    ByModule,
}

/// Search criteria for audit records — the query request payload
///
/// All present fields are AND-combined; absent fields impose no constraint.
/// Immutable once constructed: build it up with the `with_*` methods and
/// send it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQueryFilter {
    /// Match records with this initiator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator: Option<i64>,

    /// Match records with exactly this module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,

    /// Match records with exactly this operation key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_key: Option<String>,

    /// Case-insensitive substring match against the description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Case-insensitive substring match against any flow's error text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Inclusive lower bound on `stored_at`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,

    /// Inclusive upper bound on `stored_at`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,

    /// Result ordering
    #[serde(default)]
    pub sort: SortField,

    /// Number of matching records to skip
    #[serde(default)]
    pub offset: usize,

    /// Maximum number of records to return (`None` = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
}

impl AuditQueryFilter {
    /// Create an unconstrained filter (matches every record)
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain to a single initiator
    pub fn with_initiator(mut self, initiator: i64) -> Self {
        self.initiator = Some(initiator);
        self
    }

    /// Constrain to a single module
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Constrain to a single operation key
    pub fn with_operation_key(mut self, operation_key: impl Into<String>) -> Self {
        self.operation_key = Some(operation_key.into());
        self
    }

    /// Require the description to contain this text (case-insensitive)
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Require some flow error to contain this text (case-insensitive)
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Constrain `stored_at` to `[from, to]`, both bounds inclusive
    ///
    /// Either side may also be set on its own via [`with_from`](Self::with_from)
    /// or [`with_to`](Self::with_to) for an open-ended range.
    pub fn with_time_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Set the inclusive lower time bound
    pub fn with_from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Set the inclusive upper time bound
    pub fn with_to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    /// Set the result ordering
    pub fn sorted_by(mut self, sort: SortField) -> Self {
        self.sort = sort;
        self
    }

    /// Apply pagination: skip `offset` records, return at most `page_size`
    pub fn paged(mut self, offset: usize, page_size: usize) -> Self {
        self.offset = offset;
        self.page_size = Some(page_size);
        self
    }

    /// Test whether a single record satisfies every present constraint
    ///
    /// Records without a `stored_at` never satisfy a time bound.
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(initiator) = self.initiator {
            if record.initiator != initiator {
                return false;
            }
        }

        if let Some(ref module) = self.module {
            if &record.module != module {
                return false;
            }
        }

        if let Some(ref operation_key) = self.operation_key {
            if &record.operation_key != operation_key {
                return false;
            }
        }

        if let Some(ref needle) = self.description {
            if !contains_ignore_case(&record.description, needle) {
                return false;
            }
        }

        if let Some(ref needle) = self.error {
            let hit = record.flows.iter().any(|flow| {
                flow.error
                    .as_deref()
                    .is_some_and(|error| contains_ignore_case(error, needle))
            });
            if !hit {
                return false;
            }
        }

        if self.from.is_some() || self.to.is_some() {
            let stored_at = match record.stored_at {
                Some(stored_at) => stored_at,
                None => return false,
            };
            if let Some(from) = self.from {
                if stored_at < from {
                    return false;
                }
            }
            if let Some(to) = self.to {
                if stored_at > to {
                    return false;
                }
            }
        }

        true
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Result of one query — the reply payload
///
/// An empty result is a normal reply, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Matching records, already sorted and paginated
    pub records: Vec<AuditRecord>,
}

impl QueryResult {
    /// Wrap a set of matching records
    pub fn new(records: Vec<AuditRecord>) -> Self {
        Self { records }
    }
}

/// Provider-agnostic message envelope
///
/// Providers map this onto their native wire format: the payload carries a
/// JSON body (filter or result), `reply_to` names the temporary reply
/// channel of a request, and `correlation_id` on a reply echoes the request
/// message's `id`.
#[derive(Debug, Clone)]
pub struct Message {
    /// Unique message identifier (msg-<uuid>)
    pub id: String,

    /// Subject this message is addressed to
    pub subject: String,

    /// Reply channel for a request message
    pub reply_to: Option<String>,

    /// Request message id echoed back on a reply
    pub correlation_id: Option<String>,

    /// JSON body
    pub payload: Bytes,
}

impl Message {
    /// Create a message with an auto-generated id
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            id: format!("msg-{}", uuid::Uuid::new_v4()),
            subject: subject.into(),
            reply_to: None,
            correlation_id: None,
            payload: payload.into(),
        }
    }

    /// Set the reply channel address
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Set the correlation id
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}
