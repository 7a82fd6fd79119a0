//! Permission resolution pipeline
//!
//! For every check the resolver:
//! 1. registers the node in the known-nodes registry
//! 2. lets the console through unconditionally
//! 3. denies everyone else while emergency shutdown is active
//! 4. otherwise evaluates the node against the user's cached data
//!
//! Each step that answers the check also emits exactly one verbose record.

use std::sync::Arc;

use uuid::Uuid;

use super::emergency::EmergencyOptions;
use super::registry::PermissionRegistry;
use super::trust::TrustList;
use crate::core::Tristate;
use crate::engine::{ContextManager, QueryOptions, TristateResult, UserManager};
use crate::sender::Sender;
use crate::verbose::{CheckOrigin, VerboseCheckTarget, VerboseHandler};

/// Answers permission checks for host senders
///
/// Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct PermissionResolver {
    users: Arc<UserManager>,
    contexts: Arc<dyn ContextManager>,
    verbose: Arc<dyn VerboseHandler>,
    registry: Arc<PermissionRegistry>,
    emergency: Arc<EmergencyOptions>,
    trust: Arc<TrustList>,
}

impl PermissionResolver {
    /// Create a resolver with a fresh registry, emergency switch and trust list
    pub fn new(
        users: Arc<UserManager>,
        contexts: Arc<dyn ContextManager>,
        verbose: Arc<dyn VerboseHandler>,
    ) -> Self {
        Self {
            users,
            contexts,
            verbose,
            registry: Arc::new(PermissionRegistry::new()),
            emergency: Arc::new(EmergencyOptions::new()),
            trust: Arc::new(TrustList::new()),
        }
    }

    /// Share an existing trust list
    pub fn with_trust(mut self, trust: Arc<TrustList>) -> Self {
        self.trust = trust;
        self
    }

    /// Resolve the tristate value of `node` for `sender`
    pub async fn permission_value(&self, sender: &Sender, node: &str) -> Tristate {
        self.registry.offer(node);

        if sender.is_console() {
            self.verbose.offer_permission_check_event(
                CheckOrigin::Internal,
                VerboseCheckTarget::internal("console"),
                &QueryOptions::non_contextual(),
                node,
                &TristateResult::monitored(Tristate::True),
            );
            return Tristate::True;
        }

        if self.emergency.is_shutdown() {
            self.verbose.offer_permission_check_event(
                CheckOrigin::Internal,
                VerboseCheckTarget::of(sender),
                &QueryOptions::non_contextual(),
                node,
                &TristateResult::shutdown(),
            );
            return Tristate::False;
        }

        self.check_cached(sender, node).await
    }

    async fn check_cached(&self, sender: &Sender, node: &str) -> Tristate {
        let uuid = sender.unique_id();
        let user = self.users.get_or_make(uuid);
        let options = self.contexts.query_options(sender);

        let result = match user.cached_data().permission_data(&options).await {
            Ok(data) => data.check_permission(node),
            Err(e) => {
                tracing::error!(
                    user = %uuid,
                    sender = %sender,
                    node,
                    error = %e,
                    "Could not load permission data, treating as undefined"
                );
                TristateResult::error(e.to_string())
            }
        };

        self.verbose.offer_permission_check_event(
            CheckOrigin::PlatformApiHasPermission,
            VerboseCheckTarget::of(sender),
            &options,
            node,
            &result,
        );

        result.result()
    }

    /// Boolean gate for privileged commands
    ///
    /// Passes when the node resolves to `True`, or when the sender is on the
    /// trust list. The trust override only affects this boolean; the tristate
    /// and its verbose record are produced exactly as in `permission_value`.
    pub async fn has_permission(&self, sender: &Sender, node: &str) -> bool {
        if self.permission_value(sender, node).await == Tristate::True {
            return true;
        }

        if !self.trust.is_trusted(&sender.unique_id()) {
            return false;
        }

        tracing::warn!(sender = %sender, node, "Permission granted through trust list");
        self.verbose
            .offer_trust_bypass(VerboseCheckTarget::of(sender), node);
        true
    }

    pub fn is_console(&self, sender: &Sender) -> bool {
        sender.is_console()
    }

    pub fn name(&self, sender: &Sender) -> String {
        sender.name()
    }

    pub fn unique_id(&self, sender: &Sender) -> Uuid {
        sender.unique_id()
    }

    pub fn users(&self) -> &Arc<UserManager> {
        &self.users
    }

    pub fn registry(&self) -> &Arc<PermissionRegistry> {
        &self.registry
    }

    pub fn emergency(&self) -> &Arc<EmergencyOptions> {
        &self.emergency
    }

    pub fn trust(&self) -> &Arc<TrustList> {
        &self.trust
    }
}

impl std::fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResolver")
            .field("users", &self.users)
            .field("known_nodes", &self.registry.len())
            .field("shutdown", &self.emergency.is_shutdown())
            .finish()
    }
}
