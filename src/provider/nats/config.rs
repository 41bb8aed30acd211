//! NATS provider configuration

use serde::{Deserialize, Serialize};

/// Configuration for the NATS provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,

    /// Optional auth token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Request timeout in seconds (flush deadline for publishes)
    pub request_timeout_secs: u64,

    /// Prefix prepended to every subject (empty = none)
    ///
    /// Lets several deployments share one NATS cluster without
    /// cross-talk (e.g., prefix "staging" turns `audit.query` into
    /// `staging.audit.query`).
    #[serde(default)]
    pub subject_prefix: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
            token: None,
            connect_timeout_secs: 5,
            request_timeout_secs: 10,
            subject_prefix: String::new(),
        }
    }
}

impl NatsConfig {
    /// Apply the configured prefix to a subject
    pub fn build_subject(&self, subject: &str) -> String {
        if self.subject_prefix.is_empty() {
            subject.to_string()
        } else {
            format!("{}.{}", self.subject_prefix, subject)
        }
    }
}
