//! Push channel from the sync engine to the host control surface.

use crate::room::RoomState;

/// Receives every snapshot the engine applies to its cache.
///
/// Called from the scheduler's task as well as from whichever task issued a
/// `set_target`, so implementations must be cheap and must not block. Calls
/// for one room never overlap and arrive in the same order the cache was
/// written.
pub trait ConsumerBinding: Send + Sync + 'static {
    fn on_state_changed(&self, state: &RoomState);
}

/// Binding that discards every update.
pub struct NoopBinding;

impl ConsumerBinding for NoopBinding {
    fn on_state_changed(&self, _state: &RoomState) {}
}
