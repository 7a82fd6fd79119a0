//! Bridge error types

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur inside the permission bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The permission store failed to load or save data
    #[error("Storage error: {0}")]
    Storage(String),

    /// Loading a user's stored nodes took too long
    #[error("Timed out loading user {uuid} after {after:?}")]
    LoadTimeout { uuid: Uuid, after: Duration },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operator command could not be parsed
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        BridgeError::Storage(msg.into())
    }

    /// Create a configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        BridgeError::InvalidConfig(msg.into())
    }

    /// Create a command parse error
    pub fn invalid_command(msg: impl Into<String>) -> Self {
        BridgeError::InvalidCommand(msg.into())
    }
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::storage("disk on fire");
        assert_eq!(err.to_string(), "Storage error: disk on fire");

        let err = BridgeError::LoadTimeout {
            uuid: Uuid::nil(),
            after: Duration::from_secs(5),
        };
        assert_eq!(
            err.to_string(),
            "Timed out loading user 00000000-0000-0000-0000-000000000000 after 5s"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let bridge_err: BridgeError = io_err.into();
        assert!(matches!(bridge_err, BridgeError::Io(_)));
    }
}
