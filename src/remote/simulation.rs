//! In-memory room service for development and testing.
//!
//! Behaves like the real service where it matters to the sync engine:
//! setpoints are clamped and rounded by the "device", and the ambient
//! temperature slowly follows the setpoint between reads.

use super::RemoteDeviceClient;
use crate::error::{BridgeError, Result};
use crate::room::{RoomId, RoomState};
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Failure the simulated service should produce on an upcoming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedFailure {
    Unavailable,
    Rejected,
}

/// Simulated remote room service.
pub struct SimulatedRoomClient {
    rooms: Mutex<HashMap<RoomId, RoomState>>,
    failures: Mutex<VecDeque<SimulatedFailure>>,
    min_setpoint: f64,
    max_setpoint: f64,
    /// Degrees the ambient temperature moves toward the setpoint per fetch
    drift: f64,
    latency: Duration,
    fetches: AtomicUsize,
    mutations: AtomicUsize,
}

impl SimulatedRoomClient {
    /// Setpoint step the simulated device rounds to, in degrees Celsius.
    pub const SETPOINT_STEP: f64 = 0.5;

    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            failures: Mutex::new(VecDeque::new()),
            min_setpoint: 10.0,
            max_setpoint: 32.0,
            drift: 0.0,
            latency: Duration::ZERO,
            fetches: AtomicUsize::new(0),
            mutations: AtomicUsize::new(0),
        }
    }

    /// Add a room to the simulated service.
    pub fn with_room(self, state: RoomState) -> Self {
        self.rooms.lock().insert(state.id.clone(), state);
        self
    }

    /// Range the device clamps requested setpoints into.
    pub fn with_setpoint_limits(mut self, min: f64, max: f64) -> Self {
        self.min_setpoint = min;
        self.max_setpoint = max;
        self
    }

    pub fn with_drift(mut self, degrees_per_fetch: f64) -> Self {
        self.drift = degrees_per_fetch;
        self
    }

    /// Delay every call by `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make the next not-yet-failed call fail with `failure`.
    pub fn fail_next(&self, failure: SimulatedFailure) {
        self.failures.lock().push_back(failure);
    }

    /// Change a room behind the bridge's back, as a wall thermostat would.
    pub fn set_remote_state(&self, state: RoomState) {
        self.rooms.lock().insert(state.id.clone(), state);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn mutate_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn take_failure(&self, room: &RoomId) -> Result<()> {
        match self.failures.lock().pop_front() {
            None => Ok(()),
            Some(SimulatedFailure::Unavailable) => Err(BridgeError::RemoteUnavailable(format!(
                "simulated outage while contacting room {}",
                room
            ))),
            Some(SimulatedFailure::Rejected) => Err(BridgeError::RemoteRejected(format!(
                "simulated refusal for room {}",
                room
            ))),
        }
    }

    fn device_setpoint(&self, requested: f64) -> f64 {
        let clamped = requested.clamp(self.min_setpoint, self.max_setpoint);
        (clamped / Self::SETPOINT_STEP).round() * Self::SETPOINT_STEP
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for SimulatedRoomClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteDeviceClient for SimulatedRoomClient {
    async fn fetch(&self, room: &RoomId) -> Result<RoomState> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.take_failure(room)?;

        let mut rooms = self.rooms.lock();
        let state = rooms
            .get_mut(room)
            .ok_or_else(|| BridgeError::RemoteRejected(format!("unknown room {}", room)))?;

        if self.drift > 0.0 {
            let gap = state.target_temperature - state.current_temperature;
            state.current_temperature += gap.clamp(-self.drift, self.drift);
        }

        debug!(
            "[Sim] {} reads {:.1}°C (target {:.1}°C, {:.0}%)",
            state.display_name,
            state.current_temperature,
            state.target_temperature,
            state.current_humidity
        );
        Ok(state.clone())
    }

    async fn mutate(&self, room: &RoomId, target_temperature: f64) -> Result<RoomState> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.take_failure(room)?;

        if !target_temperature.is_finite() {
            return Err(BridgeError::RemoteRejected(format!(
                "setpoint {} is not a number",
                target_temperature
            )));
        }

        let setpoint = self.device_setpoint(target_temperature);
        let mut rooms = self.rooms.lock();
        let state = rooms
            .get_mut(room)
            .ok_or_else(|| BridgeError::RemoteRejected(format!("unknown room {}", room)))?;
        state.target_temperature = setpoint;

        info!(
            "[Sim] {} setpoint {:.1}°C requested, device accepted {:.1}°C",
            state.display_name, target_temperature, setpoint
        );
        Ok(state.clone())
    }
}
