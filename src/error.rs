use crate::room::RoomId;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Remote service unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Remote service rejected the request: {0}")]
    RemoteRejected(String),

    #[error("Room {0} has no state yet")]
    NotInitialized(RoomId),

    #[error("Room {0} was removed before the response arrived")]
    RoomRemoved(RoomId),

    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

impl BridgeError {
    /// Whether the next poll may reasonably succeed without any change on our side.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BridgeError::RemoteUnavailable("timeout".into()).is_transient());
        assert!(!BridgeError::RemoteRejected("out of range".into()).is_transient());
        assert!(!BridgeError::NotInitialized(RoomId::from("r1")).is_transient());
        assert!(!BridgeError::RoomRemoved(RoomId::from("r1")).is_transient());
    }

    #[test]
    fn test_display_names_room() {
        let err = BridgeError::NotInitialized(RoomId::from("living"));
        assert_eq!(err.to_string(), "Room living has no state yet");
    }
}
