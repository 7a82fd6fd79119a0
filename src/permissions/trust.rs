//! Trusted-sender allow list

use std::collections::HashSet;
use std::sync::RwLock;

use uuid::Uuid;

/// Operator-managed override list, independent of stored permissions
///
/// A trusted sender passes every `has_permission` gate, including during an
/// emergency shutdown.
#[derive(Debug, Default)]
pub struct TrustList {
    trusted: RwLock<HashSet<Uuid>>,
}

impl TrustList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with initial trusted identities
    pub fn with_trusted(trusted: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            trusted: RwLock::new(trusted.into_iter().collect()),
        }
    }

    /// Trust an identity. Returns false if it was already trusted.
    pub fn add(&self, uuid: Uuid) -> bool {
        let added = self
            .trusted
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(uuid);
        if added {
            tracing::warn!(user = %uuid, "Added to trust list");
        }
        added
    }

    /// Stop trusting an identity. Returns false if it was not trusted.
    pub fn remove(&self, uuid: &Uuid) -> bool {
        let removed = self
            .trusted
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(uuid);
        if removed {
            tracing::info!(user = %uuid, "Removed from trust list");
        }
        removed
    }

    pub fn is_trusted(&self, uuid: &Uuid) -> bool {
        self.trusted
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(uuid)
    }

    /// All trusted identities, sorted
    pub fn list(&self) -> Vec<Uuid> {
        let mut list: Vec<Uuid> = self
            .trusted
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .copied()
            .collect();
        list.sort();
        list
    }
}
