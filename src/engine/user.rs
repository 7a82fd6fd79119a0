//! Users and the user manager
//!
//! `UserManager::get_or_make` hands out exactly one `User` per identity for
//! as long as that user stays loaded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::cache::CachedData;
use super::node::Node;
use super::query::ContextSet;
use super::storage::PermissionStore;
use crate::core::BridgeResult;

/// Default bound on a single store load
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// A loaded user
///
/// Node edits are read-modify-write on the stored list and are serialized
/// per user.
pub struct User {
    uuid: Uuid,
    store: Arc<dyn PermissionStore>,
    cached_data: CachedData,
    edit_lock: Mutex<()>,
    touched: AtomicBool,
}

impl User {
    fn new(uuid: Uuid, store: Arc<dyn PermissionStore>, load_timeout: Duration) -> Self {
        Self {
            uuid,
            cached_data: CachedData::new(uuid, store.clone(), load_timeout),
            store,
            edit_lock: Mutex::new(()),
            touched: AtomicBool::new(true),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn cached_data(&self) -> &CachedData {
        &self.cached_data
    }

    /// Current stored nodes
    pub async fn nodes(&self) -> BridgeResult<Arc<Vec<Node>>> {
        self.cached_data.nodes().await
    }

    /// Set a node, replacing any node with the same key and contexts
    pub async fn set_node(&self, node: Node) -> BridgeResult<()> {
        let _edit = self.edit_lock.lock().await;
        let mut nodes = self.nodes().await?.as_ref().clone();
        nodes.retain(|existing| !existing.same_slot(&node));

        tracing::info!(user = %self.uuid, key = %node.key, value = node.value, contexts = %node.contexts, "Setting node");
        nodes.push(node);

        self.persist(nodes).await
    }

    /// Remove the node with the given key and contexts
    ///
    /// Returns whether anything was removed.
    pub async fn unset_node(&self, key: &str, contexts: &ContextSet) -> BridgeResult<bool> {
        let _edit = self.edit_lock.lock().await;
        let current = self.nodes().await?;
        let nodes: Vec<Node> = current
            .iter()
            .filter(|node| !(node.key == key && &node.contexts == contexts))
            .cloned()
            .collect();

        if nodes.len() == current.len() {
            return Ok(false);
        }

        tracing::info!(user = %self.uuid, key = %key, contexts = %contexts, "Unsetting node");
        self.persist(nodes).await?;
        Ok(true)
    }

    /// Drop expired temporary nodes from the loaded data
    ///
    /// Users whose nodes were never loaded are left alone. Returns whether
    /// anything expired.
    pub async fn expire_temporary(&self, now: DateTime<Utc>) -> BridgeResult<bool> {
        let _edit = self.edit_lock.lock().await;
        let Some(current) = self.cached_data.loaded_nodes() else {
            return Ok(false);
        };

        if !current.iter().any(|node| node.has_expired(now)) {
            return Ok(false);
        }

        let nodes: Vec<Node> = current
            .iter()
            .filter(|node| !node.has_expired(now))
            .cloned()
            .collect();

        tracing::info!(
            user = %self.uuid,
            expired = current.len() - nodes.len(),
            "Expiring temporary nodes"
        );
        self.persist(nodes).await?;
        Ok(true)
    }

    /// Save `nodes` and drop the cache. Callers hold the edit lock.
    async fn persist(&self, nodes: Vec<Node>) -> BridgeResult<()> {
        self.store.save_user(self.uuid, &nodes).await?;
        self.cached_data.invalidate();
        Ok(())
    }

    fn touch(&self) {
        self.touched.store(true, Ordering::SeqCst);
    }

    /// Clear the access mark, returning whether it was set
    fn take_touched(&self) -> bool {
        self.touched.swap(false, Ordering::SeqCst)
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("uuid", &self.uuid)
            .field("cached_data", &self.cached_data)
            .finish()
    }
}

/// Registry of loaded users
pub struct UserManager {
    users: RwLock<HashMap<Uuid, Arc<User>>>,
    store: Arc<dyn PermissionStore>,
    load_timeout: Duration,
}

impl UserManager {
    /// Create a manager over a store with the default load timeout
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self::with_load_timeout(store, DEFAULT_LOAD_TIMEOUT)
    }

    /// Create a manager with a custom bound on store loads
    pub fn with_load_timeout(store: Arc<dyn PermissionStore>, load_timeout: Duration) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            store,
            load_timeout,
        }
    }

    /// Get the user for `uuid`, creating an empty record on first use
    pub fn get_or_make(&self, uuid: Uuid) -> Arc<User> {
        {
            let users = self.users.read().unwrap_or_else(|e| e.into_inner());
            if let Some(user) = users.get(&uuid) {
                user.touch();
                return user.clone();
            }
        }

        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        let user = users.entry(uuid).or_insert_with(|| {
            tracing::debug!(user = %uuid, "Creating user record");
            Arc::new(User::new(uuid, self.store.clone(), self.load_timeout))
        });
        user.touch();
        user.clone()
    }

    /// Get a loaded user without creating one
    pub fn get(&self, uuid: &Uuid) -> Option<Arc<User>> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        users.get(uuid).cloned()
    }

    /// Snapshot of all loaded users
    pub fn loaded(&self) -> Vec<Arc<User>> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        users.values().cloned().collect()
    }

    /// Number of loaded users
    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if no users are loaded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invalidate one user's cached data
    pub fn invalidate(&self, uuid: &Uuid) {
        if let Some(user) = self.get(uuid) {
            user.cached_data().invalidate();
        }
    }

    /// Invalidate every loaded user's cached data
    pub fn invalidate_all(&self) {
        for user in self.loaded() {
            user.cached_data().invalidate();
        }
        tracing::info!("Invalidated all cached permission data");
    }

    /// Unload users that were not accessed since the previous sweep
    ///
    /// Returns the number of users unloaded.
    pub fn sweep_idle(&self) -> usize {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        let before = users.len();
        users.retain(|_, user| user.take_touched());
        before - users.len()
    }

    pub fn store(&self) -> &Arc<dyn PermissionStore> {
        &self.store
    }
}

impl std::fmt::Debug for UserManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserManager")
            .field("loaded", &self.len())
            .field("store", &self.store.name())
            .finish()
    }
}
