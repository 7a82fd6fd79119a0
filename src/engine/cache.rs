//! Per-user cached permission data
//!
//! Two single-flight layers sit behind every lookup:
//! - the user's stored nodes, loaded once from the store
//! - one `PermissionData` per distinct `QueryOptions`
//!
//! Concurrent callers for the same key await the same `OnceCell`, so the
//! store is hit once and the data is computed once. Failed loads leave the
//! cell empty and the next caller retries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::calculator::PermissionData;
use super::node::Node;
use super::query::QueryOptions;
use super::storage::PermissionStore;
use crate::core::{BridgeError, BridgeResult};

type NodesCell = Arc<OnceCell<Arc<Vec<Node>>>>;
type DataCell = Arc<OnceCell<Arc<PermissionData>>>;

/// Cached permission data for a single user
pub struct CachedData {
    uuid: Uuid,
    store: Arc<dyn PermissionStore>,
    load_timeout: Duration,
    nodes: Mutex<NodesCell>,
    permissions: Mutex<HashMap<QueryOptions, DataCell>>,
    computations: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CachedData {
    pub fn new(uuid: Uuid, store: Arc<dyn PermissionStore>, load_timeout: Duration) -> Self {
        Self {
            uuid,
            store,
            load_timeout,
            nodes: Mutex::new(Arc::new(OnceCell::new())),
            permissions: Mutex::new(HashMap::new()),
            computations: AtomicU64::new(0),
        }
    }

    /// Get or compute the permission data for `options`
    pub async fn permission_data(&self, options: &QueryOptions) -> BridgeResult<Arc<PermissionData>> {
        let cell = {
            let mut permissions = lock(&self.permissions);
            permissions.entry(options.clone()).or_default().clone()
        };

        let data = cell
            .get_or_try_init(|| async {
                let nodes = self.nodes().await?;
                self.computations.fetch_add(1, Ordering::SeqCst);

                let data = PermissionData::from_nodes(&nodes, options, Utc::now());
                tracing::debug!(
                    user = %self.uuid,
                    options = %options,
                    entries = data.len(),
                    "Computed permission data"
                );
                Ok::<_, BridgeError>(Arc::new(data))
            })
            .await?;

        Ok(data.clone())
    }

    /// Get or load the user's stored nodes
    pub async fn nodes(&self) -> BridgeResult<Arc<Vec<Node>>> {
        let cell = lock(&self.nodes).clone();

        let nodes = cell
            .get_or_try_init(|| async {
                let loaded = tokio::time::timeout(self.load_timeout, self.store.load_user(self.uuid))
                    .await
                    .map_err(|_| BridgeError::LoadTimeout {
                        uuid: self.uuid,
                        after: self.load_timeout,
                    })??;

                tracing::debug!(user = %self.uuid, nodes = loaded.len(), "Loaded stored nodes");
                Ok::<_, BridgeError>(Arc::new(loaded))
            })
            .await?;

        Ok(nodes.clone())
    }

    /// Nodes already loaded, without touching the store
    pub fn loaded_nodes(&self) -> Option<Arc<Vec<Node>>> {
        lock(&self.nodes).get().cloned()
    }

    /// Drop every cached value; the next lookup reloads from the store
    pub fn invalidate(&self) {
        *lock(&self.nodes) = Arc::new(OnceCell::new());
        lock(&self.permissions).clear();
    }

    /// Number of query options with a cache slot
    pub fn cached_option_count(&self) -> usize {
        lock(&self.permissions).len()
    }

    /// Number of completed permission data computations
    pub fn computation_count(&self) -> u64 {
        self.computations.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for CachedData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedData")
            .field("uuid", &self.uuid)
            .field("store", &self.store.name())
            .field("cached_options", &self.cached_option_count())
            .finish()
    }
}
