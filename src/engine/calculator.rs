//! Permission calculation
//!
//! `PermissionData` is the flattened view of a user's nodes under one set of
//! query options. Lookups run through the processors in order:
//! - `direct`: exact key match
//! - `wildcard`: `a.b.*`, then `a.*`, then `*`

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::node::Node;
use super::query::QueryOptions;
use crate::core::Tristate;

/// Name of the exact-match processor
pub const DIRECT_PROCESSOR: &str = "direct";

/// Name of the wildcard processor
pub const WILDCARD_PROCESSOR: &str = "wildcard";

/// Why a check produced its result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultCause {
    /// Console bypass, always true
    Monitored,
    /// Emergency shutdown is active
    Shutdown,
    /// Permission data could not be loaded
    Error { message: String },
    /// A processor matched a stored node
    Processor { processor: String, matched: String },
    /// No stored node applied
    NoMatch,
}

/// A tristate together with the trail that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TristateResult {
    pub result: Tristate,
    pub cause: ResultCause,
}

impl TristateResult {
    /// Result for a check that was answered without looking at data
    pub fn monitored(result: Tristate) -> Self {
        Self {
            result,
            cause: ResultCause::Monitored,
        }
    }

    /// Deny caused by the emergency shutdown flag
    pub fn shutdown() -> Self {
        Self {
            result: Tristate::False,
            cause: ResultCause::Shutdown,
        }
    }

    /// Degraded result when data could not be determined
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            result: Tristate::Undefined,
            cause: ResultCause::Error {
                message: message.into(),
            },
        }
    }

    /// No applicable rule
    pub fn undefined() -> Self {
        Self {
            result: Tristate::Undefined,
            cause: ResultCause::NoMatch,
        }
    }

    fn matched(processor: &str, key: &str, value: bool) -> Self {
        Self {
            result: Tristate::from_bool(value),
            cause: ResultCause::Processor {
                processor: processor.to_string(),
                matched: key.to_string(),
            },
        }
    }

    pub fn result(&self) -> Tristate {
        self.result
    }

    /// Check if this result came from the degraded path
    pub fn is_error(&self) -> bool {
        matches!(self.cause, ResultCause::Error { .. })
    }
}

impl std::fmt::Display for TristateResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            ResultCause::Monitored => write!(f, "{} (console)", self.result),
            ResultCause::Shutdown => write!(f, "{} (service shutting down)", self.result),
            ResultCause::Error { message } => write!(f, "{} (error: {})", self.result, message),
            ResultCause::Processor { processor, matched } => {
                write!(f, "{} ({}: {})", self.result, processor, matched)
            }
            ResultCause::NoMatch => write!(f, "{}", self.result),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Resolved {
    value: bool,
    specificity: usize,
}

/// Flattened permissions of one user under one set of query options
#[derive(Debug, Clone)]
pub struct PermissionData {
    options: QueryOptions,
    permissions: HashMap<String, Resolved>,
}

impl PermissionData {
    /// Build the permission map from stored nodes
    ///
    /// Expired and non-applicable nodes are skipped. When several nodes share
    /// a key, the one with more contexts wins; on a tie, `false` wins.
    pub fn from_nodes(nodes: &[Node], options: &QueryOptions, now: DateTime<Utc>) -> Self {
        let mut permissions: HashMap<String, Resolved> = HashMap::new();

        for node in nodes {
            if node.has_expired(now) || !node.applies_in(options) {
                continue;
            }

            let candidate = Resolved {
                value: node.value,
                specificity: node.contexts.len(),
            };

            permissions
                .entry(node.key.clone())
                .and_modify(|current| {
                    let more_specific = candidate.specificity > current.specificity;
                    let negates_tie =
                        candidate.specificity == current.specificity && !candidate.value;
                    if more_specific || negates_tie {
                        *current = candidate;
                    }
                })
                .or_insert(candidate);
        }

        Self {
            options: options.clone(),
            permissions,
        }
    }

    /// Evaluate a node against this data
    pub fn check_permission(&self, node: &str) -> TristateResult {
        if let Some(resolved) = self.permissions.get(node) {
            return TristateResult::matched(DIRECT_PROCESSOR, node, resolved.value);
        }

        for candidate in wildcard_candidates(node) {
            if let Some(resolved) = self.permissions.get(&candidate) {
                return TristateResult::matched(WILDCARD_PROCESSOR, &candidate, resolved.value);
            }
        }

        TristateResult::undefined()
    }

    /// The options this data was computed for
    pub fn query_options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}

/// Wildcards that cover `node`, most specific first
fn wildcard_candidates(node: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    let mut prefix = node;

    while let Some(idx) = prefix.rfind('.') {
        prefix = &prefix[..idx];
        candidates.push(format!("{}.*", prefix));
    }

    if node != "*" {
        candidates.push("*".to_string());
    }
    candidates
}
