//! Room identity and state snapshots.
//!
//! A room is one remotely controlled thermostat zone. Its state is only ever
//! known as a whole snapshot taken from a single remote response.

mod state;

pub use state::RoomState;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable identifier of a room as assigned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
