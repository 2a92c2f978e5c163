//! Last-known state of a single room.

use crate::error::{BridgeError, Result};
use crate::room::{RoomId, RoomState};
use parking_lot::RwLock;

struct Slot {
    state: Option<RoomState>,
    closed: bool,
}

/// Single-slot cache holding the last complete snapshot of one room.
///
/// There is no per-field update: every write replaces the whole snapshot.
/// Once closed (room torn down) the cache refuses further writes, so a remote
/// response that lands after teardown is dropped instead of resurrecting state.
pub struct StateCache {
    room: RoomId,
    slot: RwLock<Slot>,
}

impl StateCache {
    /// Create an empty cache; reads fail with `NotInitialized` until the first write.
    pub fn new(room: RoomId) -> Self {
        Self {
            room,
            slot: RwLock::new(Slot {
                state: None,
                closed: false,
            }),
        }
    }

    /// Create a cache seeded with a snapshot obtained from the remote service.
    pub fn seeded(state: RoomState) -> Self {
        Self {
            room: state.id.clone(),
            slot: RwLock::new(Slot {
                state: Some(state),
                closed: false,
            }),
        }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Overwrite the held snapshot.
    pub fn replace(&self, state: RoomState) -> Result<()> {
        let mut slot = self.slot.write();
        if slot.closed {
            return Err(BridgeError::RoomRemoved(self.room.clone()));
        }
        slot.state = Some(state);
        Ok(())
    }

    /// Current snapshot.
    pub fn read(&self) -> Result<RoomState> {
        self.slot
            .read()
            .state
            .clone()
            .ok_or_else(|| BridgeError::NotInitialized(self.room.clone()))
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.read().state.is_some()
    }

    /// Refuse all further writes. The last snapshot stays readable.
    pub fn close(&self) {
        self.slot.write().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.slot.read().closed
    }
}
