//! Permission storage backends
//!
//! The bridge only needs to load and save a user's nodes; anything richer
//! (groups, tracks, messaging) stays in the permission engine proper.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::node::Node;
use crate::core::{BridgeError, BridgeResult};

/// Default file name for the JSON store
const USERS_FILE: &str = "users.json";

/// Suffix of the file a save writes before renaming it into place
const TEMP_SUFFIX: &str = ".tmp";

/// Backend holding users' stored nodes
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Name of the backend, for logs
    fn name(&self) -> &str;

    /// Load a user's nodes. Unknown users have no nodes.
    async fn load_user(&self, uuid: Uuid) -> BridgeResult<Vec<Node>>;

    /// Replace a user's nodes
    async fn save_user(&self, uuid: Uuid, nodes: &[Node]) -> BridgeResult<()>;

    /// All users with stored data
    async fn all_users(&self) -> BridgeResult<Vec<Uuid>>;
}

/// In-memory store, for tests and ephemeral consoles
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, Vec<Node>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load_user(&self, uuid: Uuid) -> BridgeResult<Vec<Node>> {
        let users = self.users.read().await;
        Ok(users.get(&uuid).cloned().unwrap_or_default())
    }

    async fn save_user(&self, uuid: Uuid, nodes: &[Node]) -> BridgeResult<()> {
        let mut users = self.users.write().await;
        if nodes.is_empty() {
            users.remove(&uuid);
        } else {
            users.insert(uuid, nodes.to_vec());
        }
        Ok(())
    }

    async fn all_users(&self) -> BridgeResult<Vec<Uuid>> {
        Ok(self.users.read().await.keys().copied().collect())
    }
}

/// Store backed by a single JSON file mapping UUID to nodes
///
/// Every save rewrites the whole file through a sibling temp file and a
/// rename, so readers always see a complete file. Saves are serialized
/// through a mutex. File I/O runs on the blocking pool.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

fn read_all(path: &Path) -> BridgeResult<BTreeMap<Uuid, Vec<Node>>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let users = serde_json::from_reader(reader)?;
    Ok(users)
}

fn write_all(path: &Path, users: &BTreeMap<Uuid, Vec<Node>>) -> BridgeResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(TEMP_SUFFIX);
    let temp_path = PathBuf::from(temp_name);

    let file = File::create(&temp_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, users)?;
    writer.flush()?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

impl JsonStore {
    /// Create a store at the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a store using `users.json` inside a directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(USERS_FILE))
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn blocking<T, F>(&self, op: F) -> BridgeResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> BridgeResult<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || op(&path))
            .await
            .map_err(|e| BridgeError::storage(format!("store task failed: {}", e)))?
    }
}

#[async_trait]
impl PermissionStore for JsonStore {
    fn name(&self) -> &str {
        "json"
    }

    async fn load_user(&self, uuid: Uuid) -> BridgeResult<Vec<Node>> {
        let users = self.blocking(read_all).await?;
        Ok(users.get(&uuid).cloned().unwrap_or_default())
    }

    async fn save_user(&self, uuid: Uuid, nodes: &[Node]) -> BridgeResult<()> {
        let _guard = self.write_lock.lock().await;

        let nodes = nodes.to_vec();
        let count = nodes.len();
        self.blocking(move |path| {
            let mut users = read_all(path)?;
            if nodes.is_empty() {
                users.remove(&uuid);
            } else {
                users.insert(uuid, nodes);
            }
            write_all(path, &users)
        })
        .await?;

        tracing::debug!(user = %uuid, nodes = count, path = ?self.path, "Saved user");
        Ok(())
    }

    async fn all_users(&self) -> BridgeResult<Vec<Uuid>> {
        let users = self.blocking(read_all).await?;
        Ok(users.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        let uuid = Uuid::new_v4();

        assert!(store.load_user(uuid).await.unwrap().is_empty());

        store.save_user(uuid, &[Node::new("a.b", true)]).await.unwrap();
        assert_eq!(store.load_user(uuid).await.unwrap(), vec![Node::new("a.b", true)]);
        assert_eq!(store.all_users().await.unwrap(), vec![uuid]);

        store.save_user(uuid, &[]).await.unwrap();
        assert!(store.all_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_store_persists_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let uuid = Uuid::new_v4();

        let store = JsonStore::in_dir(temp_dir.path().join("data"));
        store
            .save_user(uuid, &[Node::new("group.admin", true)])
            .await
            .unwrap();

        let reopened = JsonStore::in_dir(temp_dir.path().join("data"));
        let nodes = reopened.load_user(uuid).await.unwrap();
        assert_eq!(nodes, vec![Node::new("group.admin", true)]);
        assert_eq!(reopened.all_users().await.unwrap(), vec![uuid]);
    }

    #[tokio::test]
    async fn test_json_store_rejects_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(USERS_FILE);
        fs::write(&path, "not json").unwrap();

        let store = JsonStore::new(&path);
        let err = store.load_user(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, BridgeError::Serialization(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_json_store_loads_during_saves() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(JsonStore::in_dir(temp_dir.path()));

        let reader = Uuid::new_v4();
        let stored: Vec<Node> = (0..200).map(|i| Node::new(format!("node.{}", i), true)).collect();
        store.save_user(reader, &stored).await.unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..100 {
                    store
                        .save_user(Uuid::new_v4(), &[Node::new(format!("other.{}", i), true)])
                        .await
                        .unwrap();
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            readers.push(tokio::spawn(async move {
                let mut failures = 0;
                for _ in 0..100 {
                    match store.load_user(reader).await {
                        Ok(nodes) => assert_eq!(nodes.len(), 200),
                        Err(_) => failures += 1,
                    }
                }
                failures
            }));
        }

        writer.await.unwrap();
        for handle in readers {
            assert_eq!(handle.await.unwrap(), 0);
        }
        assert_eq!(store.all_users().await.unwrap().len(), 101);
        assert!(!temp_dir.path().join(format!("{}{}", USERS_FILE, TEMP_SUFFIX)).exists());
    }
}
