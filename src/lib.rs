//! Room Sync Bridge library.
//!
//! Keeps remotely controlled thermostat rooms in sync with a local control
//! surface: rooms are polled on a jittered schedule, cached as whole
//! snapshots, and setpoint changes are written through to the remote service
//! with the device's answer becoming the new cached state.

pub mod accessory;
pub mod config;
pub mod error;
pub mod platform;
pub mod remote;
pub mod room;
pub mod sync;

pub use error::{BridgeError, Result};
pub use platform::{RoomEntity, RoomPlatform};
pub use room::{RoomId, RoomState};
