//! Bridge bootstrap
//!
//! Wires the store, user manager, context manager, verbose log and resolver
//! together from a [`BridgeConfig`].

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::BridgeConfig;
use crate::core::{BridgeError, BridgeResult};
use crate::engine::{JsonStore, PermissionStore, StaticContextManager, UserManager};
use crate::housekeeping::{spawn_housekeeping, HousekeepingHandle};
use crate::permissions::{PermissionResolver, TrustList};
use crate::sender::user_uuid;
use crate::verbose::{VerboseEvent, VerboseLog};

/// A fully wired permission bridge
pub struct Bridge {
    config: BridgeConfig,
    resolver: PermissionResolver,
    contexts: Arc<StaticContextManager>,
    verbose: Arc<VerboseLog>,
}

impl Bridge {
    /// Build a bridge over the JSON store named in the config
    pub fn from_config(config: BridgeConfig) -> BridgeResult<(Self, UnboundedReceiver<VerboseEvent>)> {
        let store = Arc::new(JsonStore::new(&config.storage_path));
        Self::with_store(config, store)
    }

    /// Build a bridge over an arbitrary store
    pub fn with_store(
        config: BridgeConfig,
        store: Arc<dyn PermissionStore>,
    ) -> BridgeResult<(Self, UnboundedReceiver<VerboseEvent>)> {
        config.validate()?;

        let users = Arc::new(UserManager::with_load_timeout(store.clone(), config.load_timeout()));
        let contexts = Arc::new(StaticContextManager::with_static_contexts(
            config.static_contexts.clone(),
        ));

        let (verbose, events) = VerboseLog::new();
        verbose.set_enabled(config.verbose.enabled);
        verbose
            .set_filter(config.verbose.filter.as_deref())
            .map_err(|e| BridgeError::invalid_config(e.to_string()))?;
        let verbose = Arc::new(verbose);

        let trust = Arc::new(TrustList::with_trusted(
            config.trusted_users.iter().map(|id| user_uuid(*id)),
        ));

        let resolver = PermissionResolver::new(users, contexts.clone(), verbose.clone())
            .with_trust(trust);

        tracing::info!(
            store = store.name(),
            trusted = config.trusted_users.len(),
            static_contexts = %config.static_contexts,
            "Permission bridge ready"
        );

        Ok((
            Self {
                config,
                resolver,
                contexts,
                verbose,
            },
            events,
        ))
    }

    /// Start the periodic housekeeping tasks
    pub fn start_housekeeping(&self) -> HousekeepingHandle {
        spawn_housekeeping(
            self.resolver.users().clone(),
            self.config.expire_interval(),
            self.config.cache_housekeeping_interval(),
        )
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn contexts(&self) -> &Arc<StaticContextManager> {
        &self.contexts
    }

    pub fn verbose(&self) -> &Arc<VerboseLog> {
        &self.verbose
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Tristate;
    use crate::engine::MemoryStore;
    use crate::sender::Sender;

    #[tokio::test]
    async fn test_bridge_applies_config() {
        let config = BridgeConfig::new()
            .with_trusted_user(5)
            .with_static_context("server", "main");
        let (bridge, mut events) = Bridge::with_store(config, Arc::new(MemoryStore::new())).unwrap();

        let trusted = Sender::user(5);
        assert!(bridge.resolver().trust().is_trusted(&trusted.unique_id()));
        assert!(bridge.resolver().has_permission(&trusted, "anything").await);

        let check = events.recv().await.unwrap();
        let check = check.as_permission_check().unwrap();
        assert!(check.query_options.contexts().contains("server", "main"));
        assert_eq!(check.result.result(), Tristate::Undefined);
    }

    #[test]
    fn test_bridge_rejects_invalid_config() {
        let config = BridgeConfig::new().with_load_timeout(0);
        assert!(Bridge::with_store(config, Arc::new(MemoryStore::new())).is_err());
    }

    #[tokio::test]
    async fn test_emergency_switch_reaches_checks() {
        let store = Arc::new(MemoryStore::new());
        let user = Sender::user(8);
        store
            .save_user(user.unique_id(), &[crate::engine::Node::new("chat.send", true)])
            .await
            .unwrap();
        let (bridge, _events) = Bridge::with_store(BridgeConfig::new(), store).unwrap();

        assert!(bridge.resolver().has_permission(&user, "chat.send").await);

        bridge.resolver().emergency().set_shutdown(true);
        assert!(!bridge.resolver().has_permission(&user, "chat.send").await);

        bridge.resolver().emergency().set_shutdown(false);
        assert!(bridge.resolver().has_permission(&user, "chat.send").await);
    }
}
