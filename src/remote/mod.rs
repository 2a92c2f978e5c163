//! Remote room service clients.
//!
//! The sync engine only depends on [`RemoteDeviceClient`]; how requests reach
//! the service is up to the implementation:
//! - `simulation`: in-memory rooms for development and tests
//! - `mqtt`: request/response over an MQTT broker

pub mod mqtt;
pub mod simulation;

pub use mqtt::MqttRoomClient;
pub use simulation::SimulatedRoomClient;

use crate::error::Result;
use crate::room::{RoomId, RoomState};
use async_trait::async_trait;

/// Capability to read and change a room on the remote service.
///
/// One client is shared by every room in the process, so implementations must
/// tolerate concurrent calls for distinct rooms. Any timeout policy lives here;
/// callers never add their own.
#[async_trait]
pub trait RemoteDeviceClient: Send + Sync + 'static {
    /// Current state of `room`.
    ///
    /// Fails with `RemoteUnavailable` on transport problems and
    /// `RemoteRejected` when the service refuses the request.
    async fn fetch(&self, room: &RoomId) -> Result<RoomState>;

    /// Request a new setpoint and return the state the device ended up in.
    ///
    /// The returned `target_temperature` is authoritative and may differ from
    /// the requested value when the device clamps or rounds it.
    async fn mutate(&self, room: &RoomId, target_temperature: f64) -> Result<RoomState>;
}
