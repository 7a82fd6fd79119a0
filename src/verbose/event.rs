//! Verbose audit events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{QueryOptions, TristateResult};
use crate::sender::Sender;

/// What triggered a permission check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOrigin {
    /// Answered by the bridge itself (console bypass, emergency shutdown)
    Internal,
    /// A host-side `has_permission` gate
    PlatformApiHasPermission,
}

impl std::fmt::Display for CheckOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckOrigin::Internal => write!(f, "internal"),
            CheckOrigin::PlatformApiHasPermission => write!(f, "platform_api_has_permission"),
        }
    }
}

/// Whose permission was checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VerboseCheckTarget {
    /// An internal pseudo-subject such as the console
    Internal { name: String },
    /// A platform subject
    Platform { platform: String, name: String },
}

/// Platform name used for user targets
pub const PLATFORM_NAME: &str = "console-host";

impl VerboseCheckTarget {
    pub fn internal(name: impl Into<String>) -> Self {
        VerboseCheckTarget::Internal { name: name.into() }
    }

    pub fn platform(name: impl Into<String>) -> Self {
        VerboseCheckTarget::Platform {
            platform: PLATFORM_NAME.to_string(),
            name: name.into(),
        }
    }

    /// Target describing a sender
    pub fn of(sender: &Sender) -> Self {
        match sender {
            Sender::Console => Self::internal("console"),
            Sender::User { .. } => Self::platform(sender.identity_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            VerboseCheckTarget::Internal { name } | VerboseCheckTarget::Platform { name, .. } => name,
        }
    }
}

impl std::fmt::Display for VerboseCheckTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerboseCheckTarget::Internal { name } => write!(f, "{}", name),
            VerboseCheckTarget::Platform { platform, name } => write!(f, "{}/{}", platform, name),
        }
    }
}

/// One resolved permission check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionCheckEvent {
    pub timestamp: DateTime<Utc>,
    pub origin: CheckOrigin,
    pub target: VerboseCheckTarget,
    pub query_options: QueryOptions,
    pub node: String,
    pub result: TristateResult,
}

/// A `has_permission` answer that only passed because the sender is trusted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustBypassEvent {
    pub timestamp: DateTime<Utc>,
    pub target: VerboseCheckTarget,
    pub node: String,
}

/// Anything the verbose handler records
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VerboseEvent {
    PermissionCheck(PermissionCheckEvent),
    TrustBypass(TrustBypassEvent),
}

impl VerboseEvent {
    /// Node the event is about
    pub fn node(&self) -> &str {
        match self {
            VerboseEvent::PermissionCheck(event) => &event.node,
            VerboseEvent::TrustBypass(event) => &event.node,
        }
    }

    pub fn as_permission_check(&self) -> Option<&PermissionCheckEvent> {
        match self {
            VerboseEvent::PermissionCheck(event) => Some(event),
            VerboseEvent::TrustBypass(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_of_sender() {
        assert_eq!(
            VerboseCheckTarget::of(&Sender::Console),
            VerboseCheckTarget::internal("console")
        );

        let target = VerboseCheckTarget::of(&Sender::user(99));
        assert_eq!(target.name(), "user:99");
        assert_eq!(target.to_string(), "console-host/user:99");
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = VerboseEvent::TrustBypass(TrustBypassEvent {
            timestamp: Utc::now(),
            target: VerboseCheckTarget::platform("user:1"),
            node: "group.admin".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "trust_bypass");
        assert_eq!(json["target"]["type"], "platform");
        assert_eq!(event.node(), "group.admin");
        assert!(event.as_permission_check().is_none());
    }
}
