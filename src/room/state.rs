use super::RoomId;
use serde::{Deserialize, Serialize};

/// Snapshot of one room exactly as reported by the remote service.
///
/// Field names on the wire follow the remote API (`set-point-c` and friends).
/// Snapshots are never assembled locally from parts of different responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomState {
    pub id: RoomId,
    #[serde(rename = "name")]
    pub display_name: String,
    /// Ambient temperature in degrees Celsius
    #[serde(rename = "current-temperature-c")]
    pub current_temperature: f64,
    /// Setpoint currently requested of the device, degrees Celsius
    #[serde(rename = "set-point-c")]
    pub target_temperature: f64,
    /// Relative humidity in percent
    #[serde(rename = "current-humidity")]
    pub current_humidity: f64,
}

impl RoomState {
    pub fn new(
        id: impl Into<RoomId>,
        display_name: impl Into<String>,
        current_temperature: f64,
        target_temperature: f64,
        current_humidity: f64,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            current_temperature,
            target_temperature,
            current_humidity,
        }
    }
}
