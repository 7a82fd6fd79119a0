//! Stored permission nodes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::query::{ContextSet, QueryOptions};

/// A single permission assignment held for a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Permission key, e.g. `group.admin` or `plugin.*`
    pub key: String,

    /// Granted (`true`) or explicitly negated (`false`)
    pub value: bool,

    /// Contexts the node is limited to (empty = everywhere)
    #[serde(default, skip_serializing_if = "ContextSet::is_empty")]
    pub contexts: ContextSet,

    /// Expiry for temporary nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Node {
    /// Create a permanent, context-free node
    pub fn new(key: impl Into<String>, value: bool) -> Self {
        Self {
            key: key.into(),
            value,
            contexts: ContextSet::new(),
            expiry: None,
        }
    }

    /// Limit the node to the given contexts
    pub fn with_contexts(mut self, contexts: ContextSet) -> Self {
        self.contexts = contexts;
        self
    }

    /// Make the node temporary
    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Check if the node is temporary
    pub fn is_temporary(&self) -> bool {
        self.expiry.is_some()
    }

    /// Check if a temporary node has run out
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.map(|expiry| expiry <= now).unwrap_or(false)
    }

    /// Check if the node takes part in a query under `options`
    pub fn applies_in(&self, options: &QueryOptions) -> bool {
        options.satisfies(&self.contexts)
    }

    /// Whether two nodes occupy the same slot (same key and contexts)
    pub fn same_slot(&self, other: &Node) -> bool {
        self.key == other.key && self.contexts == other.contexts
    }
}
