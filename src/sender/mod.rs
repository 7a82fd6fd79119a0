//! Host senders
//!
//! Every command invocation on the console host comes from either the
//! console itself or a chat user. The host boundary classifies the sender
//! once into a [`Sender`], and the rest of the bridge works with that.

mod identity;

pub use identity::{user_id_from_uuid, user_uuid, CONSOLE_NAME, CONSOLE_UUID};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A command sender as seen by the permission bridge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sender {
    /// The host console. Always fully permitted.
    Console,
    /// A chat user, identified by their numeric account id
    User {
        id: i64,
        /// Display name reported by the host, if any
        #[serde(default)]
        name: Option<String>,
    },
}

impl Sender {
    /// Create a user sender with no display name
    pub fn user(id: i64) -> Self {
        Sender::User { id, name: None }
    }

    /// Create a user sender with a display name
    pub fn named_user(id: i64, name: impl Into<String>) -> Self {
        Sender::User {
            id,
            name: Some(name.into()),
        }
    }

    /// Check if this is the console sender
    pub fn is_console(&self) -> bool {
        matches!(self, Sender::Console)
    }

    /// Stable identity of this sender
    pub fn unique_id(&self) -> Uuid {
        match self {
            Sender::Console => CONSOLE_UUID,
            Sender::User { id, .. } => user_uuid(*id),
        }
    }

    /// Name used by the permission engine (the account id for users)
    pub fn name(&self) -> String {
        match self {
            Sender::Console => CONSOLE_NAME.to_string(),
            Sender::User { id, .. } => id.to_string(),
        }
    }

    /// Human readable label for operator output
    pub fn display_name(&self) -> String {
        match self {
            Sender::Console => CONSOLE_NAME.to_string(),
            Sender::User {
                id,
                name: Some(name),
            } => format!("{} ({})", name, id),
            Sender::User { id, name: None } => id.to_string(),
        }
    }

    /// Permittee id string, e.g. `console` or `user:12345`
    pub fn identity_string(&self) -> String {
        match self {
            Sender::Console => "console".to_string(),
            Sender::User { id, .. } => format!("user:{}", id),
        }
    }

    /// Parse an operator-supplied sender reference
    ///
    /// Accepts `console` or a numeric account id.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.eq_ignore_ascii_case("console") {
            return Some(Sender::Console);
        }
        input.parse::<i64>().ok().map(Sender::user)
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identity_string())
    }
}
