//! Context resolution for senders

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use super::query::{ContextSet, QueryOptions};
use crate::sender::Sender;

/// Context key describing which kind of sender is asking
pub const PLATFORM_CONTEXT_KEY: &str = "platform";

/// Resolves the query options a sender's checks are evaluated under
pub trait ContextManager: Send + Sync {
    /// Current query options for the sender
    ///
    /// Must return equal options for the same sender as long as the ambient
    /// state does not change.
    fn query_options(&self, sender: &Sender) -> QueryOptions;
}

/// Context manager driven by configuration plus per-user overrides
///
/// Every sender gets the configured static contexts and a
/// `platform=console|user` pair. Operators can attach extra contexts to a
/// user, e.g. the channel or group a command was issued in.
#[derive(Debug, Default)]
pub struct StaticContextManager {
    static_contexts: ContextSet,
    overrides: RwLock<HashMap<Uuid, ContextSet>>,
}

impl StaticContextManager {
    /// Create a manager with no static contexts
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager applying `static_contexts` to every sender
    pub fn with_static_contexts(static_contexts: ContextSet) -> Self {
        Self {
            static_contexts,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the extra contexts of a user
    ///
    /// The resulting query options get their own cache slot, so cached data
    /// needs no invalidation.
    pub fn set_contexts(&self, uuid: Uuid, contexts: ContextSet) {
        let mut overrides = self.overrides.write().unwrap_or_else(|e| e.into_inner());
        if contexts.is_empty() {
            overrides.remove(&uuid);
        } else {
            overrides.insert(uuid, contexts);
        }
    }

    /// Extra contexts currently attached to a user
    pub fn contexts_for(&self, uuid: &Uuid) -> ContextSet {
        let overrides = self.overrides.read().unwrap_or_else(|e| e.into_inner());
        overrides.get(uuid).cloned().unwrap_or_default()
    }

    pub fn static_contexts(&self) -> &ContextSet {
        &self.static_contexts
    }
}

impl ContextManager for StaticContextManager {
    fn query_options(&self, sender: &Sender) -> QueryOptions {
        let mut contexts = self.static_contexts.clone();

        let platform = if sender.is_console() { "console" } else { "user" };
        contexts.add(PLATFORM_CONTEXT_KEY, platform);
        contexts.add_all(&self.contexts_for(&sender.unique_id()));

        QueryOptions::contextual(contexts)
    }
}
