//! Thermostat accessory exposed to the control surface.
//!
//! The accessory is the binding end of a room: it receives every snapshot the
//! sync engine applies, keeps the values the control surface displays, and
//! adapts the engine's async get/set calls to completion-callback handlers at
//! the edge.

pub mod info;
pub mod notifier;

pub use info::AccessoryInfo;
pub use notifier::StateNotifier;

use crate::error::Result;
use crate::room::{RoomId, RoomState};
use crate::sync::{ConsumerBinding, SyncEngine};
use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use strum::{Display, FromRepr};

/// Heating/cooling mode requested of the thermostat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, Display)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum TargetHeatingCoolingState {
    Off = 0,
    Heat = 1,
    Cool = 2,
    Auto = 3,
}

/// Heating/cooling mode the thermostat reports as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, Display)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum CurrentHeatingCoolingState {
    Off = 0,
    Heat = 1,
    Cool = 2,
}

/// Thermostat accessory for one room.
///
/// Rooms are always driven by the remote schedule, so the accessory reports a
/// fixed `Auto` target mode and `Cool` current mode alongside the readings.
pub struct ThermostatAccessory {
    info: AccessoryInfo,
    snapshot: RwLock<Option<RoomState>>,
    last_updated: RwLock<Option<DateTime<Utc>>>,
    version: AtomicU32,
    /// Set once the control surface subscribes via `set_notifier()`.
    notifier: RwLock<Option<StateNotifier>>,
}

impl ThermostatAccessory {
    pub fn new(room: &RoomId) -> Self {
        Self {
            info: AccessoryInfo::for_room(room),
            snapshot: RwLock::new(None),
            last_updated: RwLock::new(None),
            version: AtomicU32::new(0),
            notifier: RwLock::new(None),
        }
    }

    pub fn info(&self) -> &AccessoryInfo {
        &self.info
    }

    /// Last pushed snapshot, if any.
    pub fn snapshot(&self) -> Option<RoomState> {
        self.snapshot.read().clone()
    }

    pub fn display_name(&self) -> Option<String> {
        self.snapshot.read().as_ref().map(|s| s.display_name.clone())
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.snapshot.read().as_ref().map(|s| s.current_temperature)
    }

    pub fn target_temperature(&self) -> Option<f64> {
        self.snapshot.read().as_ref().map(|s| s.target_temperature)
    }

    pub fn current_humidity(&self) -> Option<f64> {
        self.snapshot.read().as_ref().map(|s| s.current_humidity)
    }

    pub fn target_heating_cooling_state(&self) -> TargetHeatingCoolingState {
        TargetHeatingCoolingState::Auto
    }

    pub fn current_heating_cooling_state(&self) -> CurrentHeatingCoolingState {
        CurrentHeatingCoolingState::Cool
    }

    /// When the last snapshot was pushed.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        *self.last_updated.read()
    }

    /// Incremented on every push, including pushes that repeat the same values.
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn set_notifier(&self, notifier: StateNotifier) {
        *self.notifier.write() = Some(notifier);
    }

    /// Serve a "get target temperature" request from the control surface.
    ///
    /// Hosts that expect a completion callback pass it as `done`; the engine
    /// itself stays callback-free.
    pub async fn handle_get_target<F>(engine: &SyncEngine, done: F)
    where
        F: FnOnce(Result<f64>),
    {
        done(engine.get_target().await);
    }

    /// Serve a "set target temperature" request from the control surface.
    ///
    /// `done` receives the setpoint the device accepted, not the requested one.
    pub async fn handle_set_target<F>(engine: &SyncEngine, requested: f64, done: F)
    where
        F: FnOnce(Result<f64>),
    {
        done(engine.set_target(requested).await);
    }
}

impl ConsumerBinding for ThermostatAccessory {
    fn on_state_changed(&self, state: &RoomState) {
        *self.snapshot.write() = Some(state.clone());
        *self.last_updated.write() = Some(Utc::now());
        self.version.fetch_add(1, Ordering::SeqCst);

        if let Some(notifier) = self.notifier.read().as_ref() {
            notifier.notify();
        }

        debug!(
            "[Accessory] Pushed updated state for {}: {:.1}°C",
            state.display_name, state.current_temperature
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::SimulatedRoomClient;
    use crate::remote::simulation::SimulatedFailure;
    use crate::sync::StateCache;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[test]
    fn test_info_uses_room_id_as_serial() {
        let accessory = ThermostatAccessory::new(&RoomId::from("abc-123"));
        let info = accessory.info();
        assert_eq!(info.manufacturer, "Flair");
        assert_eq!(info.model, "Room");
        assert_eq!(info.serial_number, "abc-123");
    }

    #[test]
    fn test_push_exposes_exact_values() {
        let accessory = ThermostatAccessory::new(&RoomId::from("r1"));
        assert_eq!(accessory.current_temperature(), None);

        accessory.on_state_changed(&RoomState::new("r1", "Bedroom", 21.5, 20.0, 45.0));

        assert_eq!(accessory.display_name().as_deref(), Some("Bedroom"));
        assert_eq!(accessory.current_temperature(), Some(21.5));
        assert_eq!(accessory.target_temperature(), Some(20.0));
        assert_eq!(accessory.current_humidity(), Some(45.0));
        assert_eq!(
            accessory.target_heating_cooling_state(),
            TargetHeatingCoolingState::Auto
        );
        assert_eq!(
            accessory.current_heating_cooling_state(),
            CurrentHeatingCoolingState::Cool
        );
        assert!(accessory.last_updated().is_some());
    }

    #[test]
    fn test_every_push_increments_version() {
        let accessory = ThermostatAccessory::new(&RoomId::from("r1"));
        let state = RoomState::new("r1", "Bedroom", 21.5, 20.0, 45.0);

        accessory.on_state_changed(&state);
        accessory.on_state_changed(&state);
        assert_eq!(accessory.version(), 2);
    }

    #[test]
    fn test_state_enum_reprs() {
        assert_eq!(
            TargetHeatingCoolingState::from_repr(3),
            Some(TargetHeatingCoolingState::Auto)
        );
        assert_eq!(CurrentHeatingCoolingState::Cool as u8, 2);
        assert_eq!(TargetHeatingCoolingState::Auto.to_string(), "auto");
    }

    #[tokio::test]
    async fn test_notifier_wakes_subscriber() {
        let room = RoomId::from("r1");
        let accessory = ThermostatAccessory::new(&room);
        let signal = Arc::new(Notify::new());
        accessory.set_notifier(StateNotifier::new(signal.clone(), room));

        accessory.on_state_changed(&RoomState::new("r1", "Bedroom", 21.5, 20.0, 45.0));

        tokio::time::timeout(Duration::from_secs(1), signal.notified())
            .await
            .expect("notifier should have fired");
    }

    #[tokio::test]
    async fn test_callback_handlers_report_outcome() {
        let room = RoomId::from("r1");
        let client = Arc::new(
            SimulatedRoomClient::new()
                .with_room(RoomState::new("r1", "Bedroom", 21.5, 20.0, 45.0))
                .with_setpoint_limits(19.5, 30.0),
        );
        let accessory = Arc::new(ThermostatAccessory::new(&room));
        let engine = SyncEngine::new(client.clone(), StateCache::new(room), accessory.clone());

        let mut got = None;
        ThermostatAccessory::handle_set_target(&engine, 19.0, |r| got = Some(r)).await;
        assert_eq!(got.unwrap().unwrap(), 19.5);
        assert_eq!(accessory.target_temperature(), Some(19.5));

        client.fail_next(SimulatedFailure::Unavailable);
        let mut got = None;
        ThermostatAccessory::handle_get_target(&engine, |r| got = Some(r)).await;
        assert!(got.unwrap().is_err());
        assert_eq!(accessory.target_temperature(), Some(19.5));
    }
}
