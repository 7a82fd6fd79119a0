//! Verbose handler - where audit events go

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use chrono::Utc;
use regex::Regex;
use tokio::sync::mpsc;

use super::event::{
    CheckOrigin, PermissionCheckEvent, TrustBypassEvent, VerboseCheckTarget, VerboseEvent,
};
use crate::engine::{QueryOptions, TristateResult};

/// Tracing target for audit output
pub const VERBOSE_TARGET: &str = "perm_bridge::verbose";

/// Sink for permission audit events
pub trait VerboseHandler: Send + Sync {
    /// Record one permission check
    fn offer_permission_check_event(
        &self,
        origin: CheckOrigin,
        target: VerboseCheckTarget,
        query_options: &QueryOptions,
        node: &str,
        result: &TristateResult,
    );

    /// Record a `has_permission` that passed only through the trust list
    fn offer_trust_bypass(&self, target: VerboseCheckTarget, node: &str);
}

/// Channel-backed verbose handler
///
/// Events are pushed onto an unbounded channel so offering never blocks a
/// permission check. The receiving end is usually drained by
/// [`process_verbose_events`].
pub struct VerboseLog {
    sender: mpsc::UnboundedSender<VerboseEvent>,
    enabled: AtomicBool,
    closed: AtomicBool,
    filter: RwLock<Option<Regex>>,
}

impl VerboseLog {
    /// Create an enabled verbose log and the receiver for its events
    pub fn new() -> (Self, mpsc::UnboundedReceiver<VerboseEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                enabled: AtomicBool::new(true),
                closed: AtomicBool::new(false),
                filter: RwLock::new(None),
            },
            receiver,
        )
    }

    /// Turn recording on or off
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "Verbose recording toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Only record events whose node matches `pattern` (`None` = record all)
    pub fn set_filter(&self, pattern: Option<&str>) -> Result<(), regex::Error> {
        let compiled = pattern.map(Regex::new).transpose()?;
        *self.filter.write().unwrap_or_else(|e| e.into_inner()) = compiled;
        Ok(())
    }

    fn accepts(&self, node: &str) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let filter = self.filter.read().unwrap_or_else(|e| e.into_inner());
        filter.as_ref().map(|re| re.is_match(node)).unwrap_or(true)
    }

    fn push(&self, event: VerboseEvent) {
        if self.sender.send(event).is_err() && !self.closed.swap(true, Ordering::SeqCst) {
            tracing::error!("Verbose event receiver dropped, audit events are discarded");
        }
    }
}

impl VerboseHandler for VerboseLog {
    fn offer_permission_check_event(
        &self,
        origin: CheckOrigin,
        target: VerboseCheckTarget,
        query_options: &QueryOptions,
        node: &str,
        result: &TristateResult,
    ) {
        if !self.accepts(node) {
            return;
        }

        self.push(VerboseEvent::PermissionCheck(PermissionCheckEvent {
            timestamp: Utc::now(),
            origin,
            target,
            query_options: query_options.clone(),
            node: node.to_string(),
            result: result.clone(),
        }));
    }

    fn offer_trust_bypass(&self, target: VerboseCheckTarget, node: &str) {
        if !self.accepts(node) {
            return;
        }

        self.push(VerboseEvent::TrustBypass(TrustBypassEvent {
            timestamp: Utc::now(),
            target,
            node: node.to_string(),
        }));
    }
}

impl std::fmt::Debug for VerboseLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerboseLog")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Background task writing verbose events to the log
pub async fn process_verbose_events(mut receiver: mpsc::UnboundedReceiver<VerboseEvent>) {
    while let Some(event) = receiver.recv().await {
        match event {
            VerboseEvent::PermissionCheck(event) => {
                tracing::info!(
                    target: VERBOSE_TARGET,
                    origin = %event.origin,
                    target_name = %event.target,
                    context = %event.query_options,
                    node = %event.node,
                    result = %event.result,
                    "permission check"
                );
            }
            VerboseEvent::TrustBypass(event) => {
                tracing::warn!(
                    target: VERBOSE_TARGET,
                    target_name = %event.target,
                    node = %event.node,
                    "trust bypass"
                );
            }
        }
    }
    tracing::debug!("Verbose event channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Tristate;

    fn offer(log: &VerboseLog, node: &str) {
        log.offer_permission_check_event(
            CheckOrigin::PlatformApiHasPermission,
            VerboseCheckTarget::platform("user:1"),
            &QueryOptions::non_contextual(),
            node,
            &TristateResult::undefined(),
        );
    }

    #[tokio::test]
    async fn test_events_reach_receiver() {
        let (log, mut receiver) = VerboseLog::new();
        offer(&log, "group.admin");

        let event = receiver.recv().await.unwrap();
        let check = event.as_permission_check().unwrap();
        assert_eq!(check.node, "group.admin");
        assert_eq!(check.origin, CheckOrigin::PlatformApiHasPermission);
        assert_eq!(check.result.result(), Tristate::Undefined);
    }

    #[test]
    fn test_disabled_log_drops_events() {
        let (log, mut receiver) = VerboseLog::new();
        log.set_enabled(false);
        offer(&log, "group.admin");
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_filter() {
        let (log, mut receiver) = VerboseLog::new();
        log.set_filter(Some("^group\\.")).unwrap();

        offer(&log, "chat.send");
        offer(&log, "group.admin");
        log.offer_trust_bypass(VerboseCheckTarget::platform("user:1"), "chat.send");

        assert_eq!(receiver.try_recv().unwrap().node(), "group.admin");
        assert!(receiver.try_recv().is_err());

        assert!(log.set_filter(Some("(")).is_err());
        log.set_filter(None).unwrap();
        offer(&log, "chat.send");
        assert!(receiver.try_recv().is_ok());
    }

    #[test]
    fn test_dropped_receiver_is_reported_once() {
        let (log, receiver) = VerboseLog::new();
        drop(receiver);

        assert!(!log.closed.load(Ordering::SeqCst));
        offer(&log, "group.admin");
        assert!(log.closed.load(Ordering::SeqCst));

        // Later offers are dropped quietly
        offer(&log, "group.admin");
        log.offer_trust_bypass(VerboseCheckTarget::platform("user:1"), "chat.send");
        assert!(log.closed.load(Ordering::SeqCst));
    }
}
