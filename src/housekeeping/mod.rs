//! Periodic housekeeping tasks
//!
//! - **Expire temporary**: drops expired temporary nodes from loaded users
//! - **Cache housekeeping**: unloads users not touched since the last sweep
//!
//! Both run as tokio tasks on the shared runtime and can be stopped with
//! [`HousekeepingHandle::shutdown`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::UserManager;

/// Handle to the running housekeeping tasks
#[derive(Debug)]
pub struct HousekeepingHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl HousekeepingHandle {
    /// Stop all tasks
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
        tracing::debug!("Housekeeping tasks stopped");
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

/// Expire temporary nodes of every loaded user once
///
/// Returns the number of users that had nodes expire. Failures are logged
/// and the user is retried on the next run.
pub async fn expire_temporary_nodes(users: &UserManager) -> usize {
    let now = Utc::now();
    let mut expired = 0;

    for user in users.loaded() {
        match user.expire_temporary(now).await {
            Ok(true) => expired += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(user = %user.uuid(), error = %e, "Failed to expire temporary nodes");
            }
        }
    }
    expired
}

/// Unload idle users once. Returns the number unloaded.
pub fn sweep_idle_users(users: &UserManager) -> usize {
    let unloaded = users.sweep_idle();
    if unloaded > 0 {
        tracing::debug!(unloaded, remaining = users.len(), "Unloaded idle users");
    }
    unloaded
}

/// Start both housekeeping tasks
pub fn spawn_housekeeping(
    users: Arc<UserManager>,
    expire_interval: Duration,
    cache_interval: Duration,
) -> HousekeepingHandle {
    let expire_users = users.clone();
    let expire_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(expire_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            expire_temporary_nodes(&expire_users).await;
        }
    });

    let cache_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cache_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so fresh users survive
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_idle_users(&users);
        }
    });

    tracing::info!(
        expire_every = ?expire_interval,
        sweep_every = ?cache_interval,
        "Housekeeping tasks started"
    );

    HousekeepingHandle {
        tasks: vec![expire_task, cache_task],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Tristate;
    use crate::engine::{MemoryStore, Node, QueryOptions};
    use chrono::Duration as ChronoDuration;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_expire_temporary_nodes() {
        let users = UserManager::new(Arc::new(MemoryStore::new()));
        let user = users.get_or_make(Uuid::new_v4());
        user.set_node(Node::new("vip", true).with_expiry(Utc::now() - ChronoDuration::seconds(1)))
            .await
            .unwrap();
        user.nodes().await.unwrap();

        assert_eq!(expire_temporary_nodes(&users).await, 1);
        assert_eq!(expire_temporary_nodes(&users).await, 0);

        let data = user
            .cached_data()
            .permission_data(&QueryOptions::non_contextual())
            .await
            .unwrap();
        assert_eq!(data.check_permission("vip").result(), Tristate::Undefined);
        assert!(user.nodes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spawned_tasks_run_and_stop() {
        let users = Arc::new(UserManager::new(Arc::new(MemoryStore::new())));
        users.get_or_make(Uuid::new_v4());

        let handle = spawn_housekeeping(
            users.clone(),
            Duration::from_millis(10),
            Duration::from_millis(20),
        );
        assert_eq!(handle.task_count(), 2);

        // Two sweeps without access unload the user
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(users.is_empty());

        handle.shutdown();
    }
}
