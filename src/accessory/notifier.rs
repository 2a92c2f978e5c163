//! Change notifier for live control-surface updates.
//!
//! When a room snapshot is pushed, the accessory wakes whoever renders it so
//! the new values show up immediately instead of on the next refresh.

use crate::room::RoomId;
use std::sync::Arc;
use tokio::sync::Notify;

/// Wakes a subscriber when an accessory's values changed.
///
/// Wakeups coalesce: several pushes before the subscriber gets to run
/// produce a single wakeup, after which it reads the latest snapshot.
#[derive(Clone)]
pub struct StateNotifier {
    signal: Arc<Notify>,
    room: RoomId,
}

impl StateNotifier {
    /// Create a notifier for `room` that wakes `signal`.
    pub fn new(signal: Arc<Notify>, room: RoomId) -> Self {
        Self { signal, room }
    }

    /// Room this notifier reports for.
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Signal that this room's data changed. Never blocks.
    pub fn notify(&self) {
        self.signal.notify_one();
    }
}
