//! Static accessory metadata shown by the control surface.

use crate::room::RoomId;

/// Manufacturer reported for every room accessory.
pub const MANUFACTURER: &str = "Flair";

/// Model reported for every room accessory.
pub const MODEL: &str = "Room";

/// Identification block of one room accessory.
///
/// The serial number is the remote room id, so it stays stable across
/// restarts and renames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInfo {
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub serial_number: String,
}

impl AccessoryInfo {
    pub fn for_room(room: &RoomId) -> Self {
        Self {
            manufacturer: MANUFACTURER,
            model: MODEL,
            serial_number: room.to_string(),
        }
    }
}
