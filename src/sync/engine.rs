//! Reconciliation between the remote room service and the local cache.

use super::binding::ConsumerBinding;
use super::cache::StateCache;
use crate::error::{BridgeError, Result};
use crate::remote::RemoteDeviceClient;
use crate::room::{RoomId, RoomState};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// Keeps one room's cache and binding in step with the remote service.
///
/// Remote calls are the only await points. Concurrent polls and writes race
/// freely up to the moment their responses arrive; from there on each
/// response is applied whole, under a lock, so the cache and the binding
/// always end up showing the same single response: whichever arrived last.
pub struct SyncEngine {
    room: RoomId,
    client: Arc<dyn RemoteDeviceClient>,
    cache: StateCache,
    binding: Arc<dyn ConsumerBinding>,
    apply_lock: Mutex<()>,
}

impl SyncEngine {
    pub fn new(
        client: Arc<dyn RemoteDeviceClient>,
        cache: StateCache,
        binding: Arc<dyn ConsumerBinding>,
    ) -> Self {
        Self {
            room: cache.room().clone(),
            client,
            cache,
            binding,
            apply_lock: Mutex::new(()),
        }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Read access to the cache.
    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    /// Last applied snapshot, without contacting the remote service.
    pub fn current(&self) -> Result<RoomState> {
        self.cache.read()
    }

    /// Fetch fresh state, store it and push it to the binding.
    ///
    /// On failure the cache keeps its previous value.
    pub async fn poll(&self) -> Result<RoomState> {
        let state = self.client.fetch(&self.room).await.inspect_err(|e| {
            if e.is_transient() {
                warn!("[Sync] Failed to fetch room {}: {}", self.room, e);
            } else {
                error!("[Sync] Room {} fetch refused: {}", self.room, e);
            }
        })?;
        self.apply(state)
    }

    /// Target temperature straight from the remote service.
    ///
    /// Always polls rather than answering from the cache, so a read doubles as
    /// a freshness check for the control surface.
    pub async fn get_target(&self) -> Result<f64> {
        Ok(self.poll().await?.target_temperature)
    }

    /// Ask the device for a new setpoint and return the one it accepted.
    pub async fn set_target(&self, requested: f64) -> Result<f64> {
        let state = self
            .client
            .mutate(&self.room, requested)
            .await
            .inspect_err(|e| {
                if e.is_transient() {
                    warn!(
                        "[Sync] Failed to set room {} to {:.1}°C: {}",
                        self.room, requested, e
                    );
                } else {
                    error!(
                        "[Sync] Room {} refused setpoint {:.1}°C: {}",
                        self.room, requested, e
                    );
                }
            })?;

        let state = self.apply(state)?;
        info!(
            "[Sync] {} setpoint {:.1}°C requested, device reports {:.1}°C",
            state.display_name, requested, state.target_temperature
        );
        Ok(state.target_temperature)
    }

    /// Stop accepting responses. Calls still in flight complete, but their
    /// results are dropped and reported as `RoomRemoved`.
    pub fn close(&self) {
        let _ordered = self.apply_lock.lock();
        self.cache.close();
    }

    fn apply(&self, state: RoomState) -> Result<RoomState> {
        let _ordered = self.apply_lock.lock();

        if let Err(e) = self.cache.replace(state.clone()) {
            if matches!(e, BridgeError::RoomRemoved(_)) {
                debug!("[Sync] Dropping late response for removed room {}", self.room);
            }
            return Err(e);
        }
        self.binding.on_state_changed(&state);

        debug!(
            "[Sync] Pushed {}: {:.1}°C now, {:.1}°C target, {:.0}% humidity",
            state.display_name,
            state.current_temperature,
            state.target_temperature,
            state.current_humidity
        );
        Ok(state)
    }
}
