//! Known-nodes registry
//!
//! Every node string that is ever checked ends up here. Only used for
//! listing and tab completion; it never influences a check.

use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct PermissionRegistry {
    nodes: RwLock<BTreeSet<String>>,
}

impl PermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node. Offering the same node again is a no-op.
    pub fn offer(&self, node: &str) {
        {
            let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
            if nodes.contains(node) {
                return;
            }
        }

        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        if nodes.insert(node.to_string()) {
            tracing::trace!(node, "Registered permission node");
        }
    }

    pub fn contains(&self, node: &str) -> bool {
        self.nodes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(node)
    }

    pub fn len(&self) -> usize {
        self.nodes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All known nodes, sorted
    pub fn nodes(&self) -> Vec<String> {
        self.nodes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Known nodes starting with `prefix`, sorted
    pub fn complete(&self, prefix: &str) -> Vec<String> {
        let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        nodes
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|node| node.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_offer_is_idempotent() {
        let registry = PermissionRegistry::new();
        for _ in 0..5 {
            registry.offer("group.admin");
        }
        assert_eq!(registry.len(), 1);

        for node in ["a", "b", "c", "a"] {
            registry.offer(node);
        }
        assert_eq!(registry.len(), 4);
        assert!(registry.contains("b"));
    }

    #[test]
    fn test_concurrent_offers_are_not_lost() {
        let registry = Arc::new(PermissionRegistry::new());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        // Half the nodes are shared between threads
                        registry.offer(&format!("node.{}", i));
                        registry.offer(&format!("thread{}.node.{}", t, i));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 100 + 4 * 100);
    }

    #[test]
    fn test_complete() {
        let registry = PermissionRegistry::new();
        for node in ["group.admin", "group.ban", "chat.send", "group"] {
            registry.offer(node);
        }

        assert_eq!(registry.complete("group."), vec!["group.admin", "group.ban"]);
        assert_eq!(registry.complete("").len(), 4);
        assert!(registry.complete("zzz").is_empty());
    }
}
